//! Point query endpoint handler.
//!
//! Returns the raw value, normalized value and severity category of the cell
//! under a latitude/longitude.

use axum::{
    extract::{Query, State},
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::debug;

use super::error_response;
use crate::error::{DroughtMapError, Result};
use crate::logging::generate_request_id;
use crate::state::{AppState, PointSample};

/// Query parameters for point endpoint
#[derive(Debug, Deserialize)]
pub struct PointQuery {
    /// Latitude in degrees
    pub lat: Option<String>,
    /// Longitude in degrees
    pub lon: Option<String>,
}

fn parse_coordinate(name: &str, value: Option<&str>) -> Result<f64> {
    let value = value.ok_or_else(|| DroughtMapError::InvalidParameter {
        param: name.to_string(),
        message: "Parameter is required".to_string(),
    })?;

    match value.trim().parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(DroughtMapError::InvalidParameter {
            param: name.to_string(),
            message: format!("Expected a number, got '{}'", value),
        }),
    }
}

fn sample(state: &AppState, params: &PointQuery) -> Result<PointSample> {
    let lat = parse_coordinate("lat", params.lat.as_deref())?;
    let lon = parse_coordinate("lon", params.lon.as_deref())?;
    state.scene().point(lat, lon)
}

/// Handle GET /point requests
pub async fn point_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<PointQuery>,
) -> Response {
    let request_id = generate_request_id();
    debug!(
        endpoint = "/point",
        request_id = %request_id,
        lat = ?params.lat,
        lon = ?params.lon,
        "Processing point request"
    );

    match sample(&state, &params) {
        Ok(sample) => Json(sample).into_response(),
        Err(error) => error_response(
            &error,
            "/point",
            &request_id,
            Some(&format!("lat={:?}, lon={:?}", params.lat, params.lon)),
        ),
    }
}
