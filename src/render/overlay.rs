//! Overlay bitmap generation.
//!
//! The overlay has one pixel per raster cell, row 0 at the top. It is
//! stretched over the bounding box by the map, so no resampling happens here.

use image::{ImageBuffer, Rgba, RgbaImage};
use ndarray::{ArrayView2, Zip};
use serde::{Deserialize, Serialize};
use std::io::Cursor;
use std::str::FromStr;
use std::time::Instant;
use tracing::debug;

use crate::colormaps::{Colormap, DroughtPalette, TRANSPARENT};
use crate::error::{DroughtMapError, Result};
use crate::severity::{check_shape, DroughtCategory, NormalizedGrid};

/// How cells are colored.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum OverlayMode {
    /// Normalized value through a continuous colormap
    #[default]
    Continuous,
    /// Severity bands through the drought palette
    Categorical,
}

impl OverlayMode {
    pub fn as_str(self) -> &'static str {
        match self {
            OverlayMode::Continuous => "continuous",
            OverlayMode::Categorical => "categorical",
        }
    }
}

impl FromStr for OverlayMode {
    type Err = DroughtMapError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "continuous" => Ok(OverlayMode::Continuous),
            "categorical" => Ok(OverlayMode::Categorical),
            _ => Err(DroughtMapError::InvalidParameter {
                param: "mode".to_string(),
                message: format!(
                    "Unknown overlay mode: {}. Must be one of: continuous, categorical",
                    s
                ),
            }),
        }
    }
}

fn image_dimensions(rows: usize, cols: usize) -> Result<(u32, u32)> {
    match (u32::try_from(cols), u32::try_from(rows)) {
        (Ok(width), Ok(height)) if width > 0 && height > 0 => Ok((width, height)),
        _ => Err(DroughtMapError::ImageGeneration {
            message: format!("Cannot render a {}x{} grid as an image", rows, cols),
        }),
    }
}

/// Color valid cells by their normalized value; invalid cells are transparent.
pub fn continuous_overlay(normalized: &NormalizedGrid, colormap: &dyn Colormap) -> Result<RgbaImage> {
    let (rows, cols) = normalized.values.dim();
    let (width, height) = image_dimensions(rows, cols)?;

    let mut img: RgbaImage = ImageBuffer::new(width, height);
    Zip::indexed(&normalized.values)
        .and(&normalized.valid)
        .for_each(|(row, col), &value, &valid| {
            let color = if valid {
                colormap.map_normalized(value)
            } else {
                TRANSPARENT
            };
            img.put_pixel(col as u32, row as u32, Rgba(color));
        });

    Ok(img)
}

/// Color cells by severity band; non-drought and no-data are transparent.
pub fn categorical_overlay(
    categories: ArrayView2<'_, DroughtCategory>,
    palette: &DroughtPalette,
) -> Result<RgbaImage> {
    let (rows, cols) = categories.dim();
    let (width, height) = image_dimensions(rows, cols)?;

    let mut img: RgbaImage = ImageBuffer::new(width, height);
    for ((row, col), &category) in categories.indexed_iter() {
        img.put_pixel(col as u32, row as u32, Rgba(palette.color(category)));
    }

    Ok(img)
}

/// Render the overlay in the requested mode.
pub fn render_overlay(
    normalized: &NormalizedGrid,
    categories: ArrayView2<'_, DroughtCategory>,
    mode: OverlayMode,
    colormap: &dyn Colormap,
    palette: &DroughtPalette,
) -> Result<RgbaImage> {
    check_shape(normalized.values.dim(), categories.dim())?;

    let start = Instant::now();
    let img = match mode {
        OverlayMode::Continuous => continuous_overlay(normalized, colormap)?,
        OverlayMode::Categorical => categorical_overlay(categories, palette)?,
    };

    debug!(
        mode = ?mode,
        colormap = colormap.name(),
        width = img.width(),
        height = img.height(),
        duration_ms = start.elapsed().as_millis() as u64,
        "Overlay rendered"
    );
    Ok(img)
}

/// Encode an image as PNG.
pub fn encode_png(img: &RgbaImage) -> Result<Vec<u8>> {
    let mut buffer = Cursor::new(Vec::new());
    img.write_to(&mut buffer, image::ImageFormat::Png)
        .map_err(|e| DroughtMapError::ImageGeneration {
            message: format!("Failed to encode PNG: {}", e),
        })?;
    Ok(buffer.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::colormaps::get_colormap;
    use crate::severity::{classify, normalize, NoData};
    use ndarray::array;

    #[test]
    fn test_invalid_cells_are_transparent() {
        let data = array![[-2.5, -1.2], [0.3, -9999.0]];
        let normalized = normalize(data.view(), NoData::Sentinel(-9999.0)).unwrap();
        let colormap = get_colormap("rdylbu").unwrap();

        let img = continuous_overlay(&normalized, colormap.as_ref()).unwrap();
        assert_eq!(img.dimensions(), (2, 2));
        assert_eq!(img.get_pixel(1, 1).0, TRANSPARENT);
        assert_eq!(img.get_pixel(0, 0).0[3], 255);
        // Driest cell at the top left is mapped to the dry end
        assert_eq!(img.get_pixel(0, 0).0, colormap.map_normalized(0.0));
        assert_eq!(img.get_pixel(0, 1).0, colormap.map_normalized(1.0));
    }

    #[test]
    fn test_degenerate_grid_uses_midpoint_color() {
        let data = array![[0.7, 0.7]];
        let normalized = normalize(data.view(), NoData::None).unwrap();
        let colormap = get_colormap("viridis").unwrap();

        let img = continuous_overlay(&normalized, colormap.as_ref()).unwrap();
        assert_eq!(img.get_pixel(0, 0).0, colormap.map_normalized(0.5));
        assert_eq!(img.get_pixel(1, 0).0, colormap.map_normalized(0.5));
    }

    #[test]
    fn test_categorical_overlay() {
        let data = array![[-2.5, -1.2], [0.3, -9999.0]];
        let categories = classify(data.view(), NoData::Sentinel(-9999.0)).unwrap();
        let palette = DroughtPalette::default();

        let img = categorical_overlay(categories.view(), &palette).unwrap();
        assert_eq!(img.get_pixel(0, 0).0, palette.extreme);
        assert_eq!(img.get_pixel(1, 0).0, palette.moderate);
        assert_eq!(img.get_pixel(0, 1).0, TRANSPARENT);
        assert_eq!(img.get_pixel(1, 1).0, TRANSPARENT);
    }

    #[test]
    fn test_png_encoding() {
        let data = array![[-1.0, 1.0]];
        let normalized = normalize(data.view(), NoData::None).unwrap();
        let categories = classify(data.view(), NoData::None).unwrap();
        let colormap = get_colormap("brbg").unwrap();

        let img = render_overlay(
            &normalized,
            categories.view(),
            OverlayMode::Continuous,
            colormap.as_ref(),
            &DroughtPalette::default(),
        )
        .unwrap();
        let png = encode_png(&img).unwrap();
        assert_eq!(&png[..8], b"\x89PNG\r\n\x1a\n");

        let decoded = image::load_from_memory(&png).unwrap().to_rgba8();
        assert_eq!(decoded, img);
    }

    #[test]
    fn test_empty_grid_is_an_error() {
        let data = ndarray::Array2::<f32>::zeros((0, 3));
        let normalized = normalize(data.view(), NoData::None).unwrap();
        let colormap = get_colormap("viridis").unwrap();
        assert!(continuous_overlay(&normalized, colormap.as_ref()).is_err());
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!("Categorical".parse::<OverlayMode>().unwrap(), OverlayMode::Categorical);
        assert!("heatmap".parse::<OverlayMode>().is_err());
    }
}
