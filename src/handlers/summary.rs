//! Scene summary endpoint handler.

use axum::{extract::State, Json};
use std::sync::Arc;

use crate::state::{AppState, SceneReport};

/// Handle GET /summary requests
pub async fn summary_handler(State(state): State<Arc<AppState>>) -> Json<SceneReport> {
    Json(state.scene().report())
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{get, json, test_state};
    use axum::http::StatusCode;

    #[tokio::test]
    async fn test_summary() {
        let (status, body) = get(test_state(), "/summary").await;
        assert_eq!(status, StatusCode::OK);

        let report = json(&body);
        assert_eq!(report["source"], "test.tif");
        assert_eq!(report["rows"], 2);
        assert_eq!(report["cols"], 2);
        assert_eq!(report["range"]["min"], -2.5);
        assert_eq!(report["classification"]["valid_cells"], 3);
        assert_eq!(report["classification"]["nodata_cells"], 1);
    }
}
