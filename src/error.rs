//! Error types for droughtmap.
//!
//! A single error enum covers loading, classification, rendering and the
//! web UI. Degenerate data (constant grids, heavy no-data) is never an error;
//! see [`crate::severity::quality`] for how those cases are reported.

use thiserror::Error;

/// The main error type for droughtmap operations.
#[derive(Error, Debug)]
pub enum DroughtMapError {
    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TIFF decoding/encoding errors
    #[error("TIFF error: {0}")]
    Tiff(#[from] tiff::TiffError),

    /// NetCDF file operation errors
    #[cfg(feature = "netcdf")]
    #[error("NetCDF error: {0}")]
    NetCdf(#[from] netcdf::Error),

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Invalid parameter errors
    #[error("Invalid parameter: {param} - {message}")]
    InvalidParameter { param: String, message: String },

    /// The raster decoded but cannot be used as a single-band georeferenced grid
    #[error("Unsupported raster: {message}")]
    RasterFormat { message: String },

    /// Grid and mask (or two grids) disagree on shape
    #[error("Shape mismatch: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        expected: (usize, usize),
        actual: (usize, usize),
    },

    /// A coordinate query fell outside the raster's bounding box
    #[error("Location ({lat}, {lon}) is outside the raster bounds")]
    OutsideRaster { lat: f64, lon: f64 },

    /// Image generation errors
    #[error("Image generation error: {message}")]
    ImageGeneration { message: String },

    /// GeoJSON parsing errors
    #[error("GeoJSON error: {0}")]
    GeoJson(#[from] geojson::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Server errors
    #[error("Server error: {message}")]
    Server { message: String },
}

impl DroughtMapError {
    /// Whether the error was caused by the caller's input rather than the server.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            DroughtMapError::InvalidParameter { .. }
                | DroughtMapError::RasterFormat { .. }
                | DroughtMapError::Tiff(_)
                | DroughtMapError::OutsideRaster { .. }
        )
    }
}

/// Convenience type alias for Results with DroughtMapError
pub type Result<T> = std::result::Result<T, DroughtMapError>;
