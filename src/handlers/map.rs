//! Map document, overlay image and legend endpoints.
//!
//! `GET /` returns the Leaflet page for the current scene; the page loads
//! `/overlay.png` with the same style parameters. PNG encoding runs on the
//! blocking pool.

use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

use super::{error_response, resolve_style, run_blocking};
use crate::error::Result;
use crate::logging::generate_request_id;
use crate::render::{render_document, DocumentOptions, Legend};
use crate::state::AppState;

/// Query parameters shared by the map endpoints
#[derive(Debug, Default, Deserialize)]
pub struct StyleQuery {
    /// "continuous" or "categorical"
    pub mode: Option<String>,
    /// Colormap name for continuous mode
    pub colormap: Option<String>,
}

impl StyleQuery {
    fn describe(&self) -> String {
        format!("mode={:?}, colormap={:?}", self.mode, self.colormap)
    }
}

/// Handle GET / requests
pub async fn index_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<StyleQuery>,
) -> Response {
    let request_id = generate_request_id();
    debug!(endpoint = "/", request_id = %request_id, "Processing map request");

    match render_index(&state, &params) {
        Ok(html) => Html(html).into_response(),
        Err(error) => error_response(&error, "/", &request_id, Some(&params.describe())),
    }
}

fn render_index(state: &AppState, params: &StyleQuery) -> Result<String> {
    let render = &state.config.render;
    let (mode, colormap) = resolve_style(render, params.mode.as_deref(), params.colormap.as_deref())?;
    let scene = state.scene();
    let legend = scene.legend(mode, &colormap)?;

    // The version parameter keeps browsers from reusing a previous scene's image
    let overlay_url = format!(
        "/overlay.png?mode={}&colormap={}&v={}",
        mode.as_str(),
        colormap,
        scene.loaded_at.timestamp_millis()
    );

    render_document(&DocumentOptions {
        title: &render.title,
        bounds: scene.raster.bounds,
        zoom: render.zoom,
        opacity: render.opacity,
        basemap_url: &render.basemap_url,
        basemap_attribution: &render.basemap_attribution,
        overlay_url: &overlay_url,
        legend: render.show_legend.then_some(&legend),
        vector: state.vector.as_ref(),
        footprint_url: Some("/footprint.geojson"),
        upload_url: Some("/upload"),
        warnings: &scene.warnings,
    })
}

/// Handle GET /overlay.png requests
pub async fn overlay_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<StyleQuery>,
) -> Response {
    let request_id = generate_request_id();
    let start_time = Instant::now();

    debug!(
        endpoint = "/overlay.png",
        request_id = %request_id,
        mode = ?params.mode,
        colormap = ?params.colormap,
        "Processing overlay request"
    );

    let describe = params.describe();
    let renderer = Arc::clone(&state);
    let result = run_blocking("Overlay", move || render_overlay_png(&renderer, &params)).await;

    match result {
        Ok(png) => {
            info!(
                endpoint = "/overlay.png",
                request_id = %request_id,
                bytes = png.len(),
                duration_ms = start_time.elapsed().as_millis() as u64,
                "Overlay generation successful"
            );
            (
                StatusCode::OK,
                [
                    (header::CONTENT_TYPE, "image/png"),
                    (header::CACHE_CONTROL, "no-cache"),
                ],
                png,
            )
                .into_response()
        }
        Err(error) => error_response(&error, "/overlay.png", &request_id, Some(&describe)),
    }
}

fn render_overlay_png(state: &AppState, params: &StyleQuery) -> Result<Vec<u8>> {
    let (mode, colormap) = resolve_style(
        &state.config.render,
        params.mode.as_deref(),
        params.colormap.as_deref(),
    )?;
    state.scene().overlay_png(mode, &colormap)
}

/// Handle GET /legend requests
pub async fn legend_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<StyleQuery>,
) -> Response {
    let request_id = generate_request_id();

    match build_legend_for(&state, &params) {
        Ok(legend) => Json(legend).into_response(),
        Err(error) => error_response(&error, "/legend", &request_id, Some(&params.describe())),
    }
}

fn build_legend_for(state: &AppState, params: &StyleQuery) -> Result<Legend> {
    let (mode, colormap) = resolve_style(
        &state.config.render,
        params.mode.as_deref(),
        params.colormap.as_deref(),
    )?;
    state.scene().legend(mode, &colormap)
}
