//! Footprint download endpoint.
//!
//! Vectorizes the current scene into GeoJSON polygons, grouped by category,
//! exact value or validity. Tracing runs on the blocking pool.

use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

use super::{error_response, run_blocking};
use crate::error::Result;
use crate::logging::generate_request_id;
use crate::state::AppState;
use crate::vectorize::GroupBy;

#[derive(Debug, Deserialize)]
pub struct FootprintQuery {
    pub group: Option<String>,
}

fn build_footprint(state: &AppState, params: &FootprintQuery) -> Result<(usize, String)> {
    let group = match params.group.as_deref() {
        Some(group) => group.parse::<GroupBy>()?,
        None => state.config.render.footprint_group,
    };
    let collection = state.scene().footprint(group)?;
    Ok((collection.features.len(), serde_json::to_string(&collection)?))
}

/// Handle GET /footprint.geojson requests
pub async fn footprint_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<FootprintQuery>,
) -> Response {
    let request_id = generate_request_id();
    let start_time = Instant::now();

    let group = params.group.clone();
    let tracer = Arc::clone(&state);
    let result = run_blocking("Footprint", move || build_footprint(&tracer, &params)).await;

    match result {
        Ok((features, body)) => {
            info!(
                endpoint = "/footprint.geojson",
                request_id = %request_id,
                features = features,
                duration_ms = start_time.elapsed().as_millis() as u64,
                "Footprint generated"
            );
            (
                StatusCode::OK,
                [
                    (header::CONTENT_TYPE, "application/geo+json"),
                    (
                        header::CONTENT_DISPOSITION,
                        "attachment; filename=\"footprint.geojson\"",
                    ),
                ],
                body,
            )
                .into_response()
        }
        Err(error) => error_response(
            &error,
            "/footprint.geojson",
            &request_id,
            Some(&format!("group={:?}", group)),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{get, test_state};
    use axum::http::StatusCode;
    use geojson::GeoJson;

    fn feature_count(body: &[u8]) -> usize {
        let text = std::str::from_utf8(body).unwrap();
        match text.parse::<GeoJson>().unwrap() {
            GeoJson::FeatureCollection(collection) => collection.features.len(),
            other => panic!("Expected a feature collection, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_footprint_by_category() {
        let (status, body) = get(test_state(), "/footprint.geojson").await;
        assert_eq!(status, StatusCode::OK);
        // Extreme, moderate and non-drought cells; the no-data cell is skipped
        assert_eq!(feature_count(&body), 3);
    }

    #[tokio::test]
    async fn test_footprint_by_validity() {
        let (status, body) = get(test_state(), "/footprint.geojson?group=validity").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(feature_count(&body), 1);
    }

    #[tokio::test]
    async fn test_footprint_unknown_group() {
        let (status, _) = get(test_state(), "/footprint.geojson?group=county").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
