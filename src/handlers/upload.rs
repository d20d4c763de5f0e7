//! Raster upload endpoint.
//!
//! `POST /upload` takes a GeoTIFF as the raw request body, builds a scene
//! from it and puts that scene on display. Decoding runs on the blocking
//! pool so large uploads do not stall the async workers.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use bytes::Bytes;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

use super::{error_response, run_blocking};
use crate::error::DroughtMapError;
use crate::logging::generate_request_id;
use crate::state::AppState;

/// Handle POST /upload requests
pub async fn upload_handler(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    let request_id = generate_request_id();
    let start_time = Instant::now();
    let size = body.len();

    debug!(
        endpoint = "/upload",
        request_id = %request_id,
        bytes = size,
        "Processing upload"
    );

    if body.is_empty() {
        let error = DroughtMapError::InvalidParameter {
            param: "body".to_string(),
            message: "Upload is empty; send a GeoTIFF as the request body".to_string(),
        };
        return error_response(&error, "/upload", &request_id, None);
    }

    let loader = Arc::clone(&state);
    let result = run_blocking("Upload", move || loader.load_upload(&body)).await;

    match result {
        Ok(scene) => {
            info!(
                endpoint = "/upload",
                request_id = %request_id,
                bytes = size,
                rows = scene.raster.shape().0,
                cols = scene.raster.shape().1,
                duration_ms = start_time.elapsed().as_millis() as u64,
                "Upload loaded"
            );
            (
                StatusCode::OK,
                Json(serde_json::json!({
                    "status": "loaded",
                    "request_id": request_id,
                    "summary": scene.report(),
                })),
            )
                .into_response()
        }
        Err(error) => error_response(
            &error,
            "/upload",
            &request_id,
            Some(&format!("bytes={}", size)),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{geotiff_bytes, get, json, send, test_state};
    use axum::body::Body;
    use axum::http::{Request, StatusCode};

    fn post(body: Vec<u8>) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/upload")
            .header("content-type", "image/tiff")
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn test_upload_replaces_scene() {
        let state = test_state();
        let tiff = geotiff_bytes(&[-2.5, -1.2, 0.3, -9999.0, -0.5, 1.5]);

        let (status, body) = send(state.clone(), post(tiff)).await;
        assert_eq!(status, StatusCode::OK);

        let response = json(&body);
        assert_eq!(response["status"], "loaded");
        assert_eq!(response["summary"]["source"], "upload");
        assert_eq!(response["summary"]["cols"], 3);

        // Later requests see the uploaded scene
        let (_, body) = get(state.clone(), "/summary").await;
        assert_eq!(json(&body)["rows"], 2);
        assert_eq!(json(&body)["cols"], 3);
        assert_eq!(state.cache.len(), 1);
    }

    #[tokio::test]
    async fn test_empty_upload() {
        let (status, body) = send(test_state(), post(Vec::new())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(json(&body)["error"].as_str().unwrap().contains("empty"));
    }

    #[tokio::test]
    async fn test_corrupt_upload_keeps_scene() {
        let state = test_state();
        let (status, _) = send(state.clone(), post(b"not a tiff".to_vec())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(state.scene().raster.source, "test.tif");
    }
}
