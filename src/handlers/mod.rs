//! HTTP request handlers for the droughtmap web UI.
//!
//! This module contains all the endpoint handlers for the web server and the
//! router that wires them together.

pub mod footprint;
pub mod heartbeat;
pub mod map;
pub mod point;
pub mod summary;
pub mod upload;

pub use footprint::footprint_handler;
pub use heartbeat::heartbeat_handler;
pub use map::{index_handler, legend_handler, overlay_handler};
pub use point::point_handler;
pub use summary::summary_handler;
pub use upload::upload_handler;

use axum::{
    extract::DefaultBodyLimit,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use crate::colormaps::get_colormap;
use crate::config::RenderConfig;
use crate::error::{DroughtMapError, Result};
use crate::logging::{create_http_trace_layer, log_request_error};
use crate::render::OverlayMode;
use crate::state::AppState;

/// Build the application router.
pub fn build_router(state: Arc<AppState>) -> Router {
    let upload_limit = state.config.server.max_upload_bytes;

    Router::new()
        .route("/", get(index_handler))
        .route("/overlay.png", get(overlay_handler))
        .route("/legend", get(legend_handler))
        .route("/summary", get(summary_handler))
        .route("/point", get(point_handler))
        .route("/footprint.geojson", get(footprint_handler))
        .route(
            "/upload",
            post(upload_handler).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route("/heartbeat", get(heartbeat_handler))
        .layer(create_http_trace_layer())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// HTTP status for an error.
pub(crate) fn status_for(error: &DroughtMapError) -> StatusCode {
    match error {
        DroughtMapError::OutsideRaster { .. } => StatusCode::NOT_FOUND,
        e if e.is_client_error() => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Log an error and turn it into a JSON error response.
pub(crate) fn error_response(
    error: &DroughtMapError,
    endpoint: &str,
    request_id: &str,
    params: Option<&str>,
) -> Response {
    log_request_error(error, endpoint, request_id, params);

    (
        status_for(error),
        Json(serde_json::json!({
            "error": error.to_string(),
            "request_id": request_id
        })),
    )
        .into_response()
}

/// Run CPU-bound work on the blocking pool.
pub(crate) async fn run_blocking<T, F>(task: &'static str, f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .unwrap_or_else(|e| {
            Err(DroughtMapError::Server {
                message: format!("{} task failed: {}", task, e),
            })
        })
}

/// Overlay mode and colormap from query parameters, falling back to config.
pub(crate) fn resolve_style(
    render: &RenderConfig,
    mode: Option<&str>,
    colormap: Option<&str>,
) -> Result<(OverlayMode, String)> {
    let mode = match mode {
        Some(mode) => mode.parse::<OverlayMode>()?,
        None => render.mode,
    };
    let colormap = colormap.unwrap_or(&render.colormap).to_lowercase();
    // Reject unknown names here rather than at render time
    get_colormap(&colormap)?;
    Ok((mode, colormap))
}

#[cfg(test)]
pub(crate) mod test_support {
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use ndarray::array;
    use std::sync::Arc;
    use tower::ServiceExt;

    use crate::cache::SceneCache;
    use crate::config::{Config, DataConfig};
    use crate::raster::{BoundingBox, RasterGrid};
    use crate::state::{AppState, Scene};

    pub fn test_state() -> Arc<AppState> {
        let raster = RasterGrid::new(
            "test.tif",
            array![[-2.5, -1.2], [0.3, -9999.0]],
            Some(-9999.0),
            BoundingBox::new(40.0, -100.0, 42.0, -98.0).unwrap(),
            Some("EPSG:4326".to_string()),
        );
        let scene = Arc::new(Scene::build(raster, &DataConfig::default()).unwrap());
        AppState::new_shared(Config::default(), scene, SceneCache::new(4), None)
    }

    /// Send a request through the router and collect status and body.
    pub async fn send(state: Arc<AppState>, request: Request<Body>) -> (StatusCode, Vec<u8>) {
        let response = super::build_router(state).oneshot(request).await.unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, body.to_vec())
    }

    pub async fn get(state: Arc<AppState>, uri: &str) -> (StatusCode, Vec<u8>) {
        send(
            state,
            Request::builder().uri(uri).body(Body::empty()).unwrap(),
        )
        .await
    }

    pub fn json(body: &[u8]) -> serde_json::Value {
        serde_json::from_slice(body).unwrap()
    }

    /// A 2x3 float GeoTIFF spanning 41.5..42N, 100..98.5W.
    pub fn geotiff_bytes(samples: &[f32; 6]) -> Vec<u8> {
        use crate::data_loader::{geotiff_tags::*, tag};
        use tiff::encoder::{colortype, TiffEncoder};

        let mut buffer = std::io::Cursor::new(Vec::new());
        {
            let mut encoder = TiffEncoder::new(&mut buffer).unwrap();
            let mut image = encoder.new_image::<colortype::Gray32Float>(3, 2).unwrap();
            image
                .encoder()
                .write_tag(tag(MODEL_PIXEL_SCALE), &[0.5f64, 0.25, 0.0][..])
                .unwrap();
            image
                .encoder()
                .write_tag(
                    tag(MODEL_TIEPOINT),
                    &[0.0f64, 0.0, 0.0, -100.0, 42.0, 0.0][..],
                )
                .unwrap();
            image.encoder().write_tag(tag(GDAL_NODATA), "-9999").unwrap();
            image.write_data(&samples[..]).unwrap();
        }
        buffer.into_inner()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            status_for(&DroughtMapError::OutsideRaster { lat: 0.0, lon: 0.0 }),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_for(&DroughtMapError::InvalidParameter {
                param: "lat".to_string(),
                message: "bad".to_string()
            }),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_for(&DroughtMapError::ImageGeneration {
                message: "bad".to_string()
            }),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn test_run_blocking() {
        assert_eq!(run_blocking("sum", || Ok(2 + 2)).await.unwrap(), 4);

        let failed: Result<()> = run_blocking("panic", || panic!("boom")).await;
        assert!(matches!(failed, Err(DroughtMapError::Server { .. })));
    }

    #[test]
    fn test_resolve_style() {
        let render = RenderConfig::default();
        assert_eq!(
            resolve_style(&render, None, None).unwrap(),
            (OverlayMode::Continuous, "rdylbu".to_string())
        );
        assert_eq!(
            resolve_style(&render, Some("categorical"), Some("BrBG")).unwrap(),
            (OverlayMode::Categorical, "brbg".to_string())
        );
        assert!(resolve_style(&render, Some("heatmap"), None).is_err());
        assert!(resolve_style(&render, None, Some("jet")).is_err());
    }
}
