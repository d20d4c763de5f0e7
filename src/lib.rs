//! # droughtmap
//!
//! Classify Standardized Precipitation Index (SPI) rasters into drought
//! severity bands and show them as an overlay on an interactive web map.
//!
//! ## Key Features
//!
//! - **Severity classification**: Every cell is assigned extreme, severe,
//!   moderate or mild drought, no drought, or no data
//! - **Min-max normalization**: Valid cells are stretched to [0, 1] for
//!   continuous colormaps, with constant grids handled explicitly
//! - **Map rendering**: A Leaflet document with a PNG overlay, legend and
//!   optional vector outlines, written to disk or served over HTTP
//! - **Footprints**: Classified regions vectorized to GeoJSON polygons
//!
//! ## Architecture
//!
//! - **Data Layer**: GeoTIFF (and optionally NetCDF) rasters loaded into
//!   memory with their georeferencing and no-data sentinel
//! - **Processing**: [`severity`] classifies, normalizes and checks quality;
//!   [`vectorize`] turns classified regions into polygons
//! - **Presentation**: [`render`] draws overlays, legends and the map page;
//!   [`handlers`] exposes them through the web UI

pub mod cache;
pub mod colormaps;
pub mod config;
pub mod data_loader;
pub mod error;
pub mod export;
pub mod handlers;
pub mod logging;
pub mod raster;
pub mod render;
pub mod severity;
pub mod state;
pub mod vector;
pub mod vectorize;

pub use config::Config;
pub use error::{DroughtMapError, Result};
pub use logging::{
    create_http_trace_layer, generate_request_id, init_tracing, log_error, log_operation_end,
    log_operation_start, log_raster_load_stats, log_request_error, log_timed_operation,
};
pub use raster::{BoundingBox, RasterGrid};
pub use severity::{classify, normalize, DroughtCategory, NoData};
pub use state::{AppState, Scene};
