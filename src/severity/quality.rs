//! Detection of grids that would render as a misleading map.
//!
//! A sentinel that was not declared as no-data, or a grid that is mostly
//! masked, still classifies and normalizes without error. These checks turn
//! such cases into explicit warnings.

use ndarray::{ArrayView2, Zip};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use tracing::warn;

use super::NormalizedGrid;
use crate::raster::BoundingBox;

/// Limits used by [`assess`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QualityThresholds {
    /// Warn when more than this share of cells is no-data
    #[serde(default = "default_max_nodata_fraction")]
    pub max_nodata_fraction: f64,

    /// Valid values at or beyond this magnitude are reported as likely sentinels
    #[serde(default = "default_sentinel_magnitude")]
    pub sentinel_magnitude: f32,
}

impl Default for QualityThresholds {
    fn default() -> Self {
        Self {
            max_nodata_fraction: default_max_nodata_fraction(),
            sentinel_magnitude: default_sentinel_magnitude(),
        }
    }
}

fn default_max_nodata_fraction() -> f64 {
    0.5
}

fn default_sentinel_magnitude() -> f32 {
    100.0
}

/// A condition that makes the rendered map misleading.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum QualityWarning {
    /// Every cell is masked; the overlay will be fully transparent
    NoValidCells,
    /// All valid cells share one value; the colormap collapses to its midpoint
    DegenerateRange { value: f32 },
    /// Too much of the grid is no-data
    HighNoDataFraction { fraction: f64, threshold: f64 },
    /// Valid cells carry a value far outside the SPI scale
    SuspectSentinel { value: f32, count: usize },
    /// Bounds are not longitude/latitude; the overlay will be misplaced
    NotGeographic { crs: Option<String> },
}

impl fmt::Display for QualityWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QualityWarning::NoValidCells => write!(f, "raster has no valid cells"),
            QualityWarning::DegenerateRange { value } => {
                write!(f, "all valid cells equal {}; normalized to midpoint", value)
            }
            QualityWarning::HighNoDataFraction {
                fraction,
                threshold,
            } => write!(
                f,
                "{:.1}% of cells are no-data (threshold {:.1}%)",
                fraction * 100.0,
                threshold * 100.0
            ),
            QualityWarning::SuspectSentinel { value, count } => write!(
                f,
                "{} valid cells hold {}, which looks like an undeclared no-data sentinel",
                count, value
            ),
            QualityWarning::NotGeographic { crs } => write!(
                f,
                "bounds are not longitude/latitude (crs {}); the overlay will be misplaced",
                crs.as_deref().unwrap_or("unknown")
            ),
        }
    }
}

/// Inspect a grid and its normalization for no-data handling defects.
pub fn assess(
    data: ArrayView2<'_, f32>,
    normalized: &NormalizedGrid,
    thresholds: &QualityThresholds,
) -> Vec<QualityWarning> {
    let mut warnings = Vec::new();
    let total = data.len();
    if total == 0 {
        return warnings;
    }

    let valid = normalized.valid_count();
    if valid == 0 {
        warnings.push(QualityWarning::NoValidCells);
        return warnings;
    }

    let fraction = (total - valid) as f64 / total as f64;
    if fraction > thresholds.max_nodata_fraction {
        warnings.push(QualityWarning::HighNoDataFraction {
            fraction,
            threshold: thresholds.max_nodata_fraction,
        });
    }

    if let Some(range) = normalized.range.filter(|r| r.is_degenerate()) {
        warnings.push(QualityWarning::DegenerateRange { value: range.min });
    }

    // Count suspect values by bit pattern so the most frequent one is reported.
    let mut suspects: HashMap<u32, usize> = HashMap::new();
    Zip::from(data)
        .and(&normalized.valid)
        .for_each(|&value, &ok| {
            if ok && value.abs() >= thresholds.sentinel_magnitude {
                *suspects.entry(value.to_bits()).or_insert(0) += 1;
            }
        });

    if let Some((bits, count)) = suspects
        .into_iter()
        .max_by(|a, b| a.1.cmp(&b.1).then(b.0.cmp(&a.0)))
    {
        warnings.push(QualityWarning::SuspectSentinel {
            value: f32::from_bits(bits),
            count,
        });
    }

    warnings
}

/// Geographic EPSG codes. Projected systems such as UTM (326xx) or Web
/// Mercator (3857) fall outside.
const GEOGRAPHIC_EPSG: std::ops::RangeInclusive<u32> = 4000..=4999;

/// Check that a raster can be placed on a lon/lat map as is.
pub fn assess_georeference(bounds: &BoundingBox, crs: Option<&str>) -> Option<QualityWarning> {
    let projected_crs = crs
        .and_then(|crs| crs.strip_prefix("EPSG:"))
        .and_then(|code| code.parse::<u32>().ok())
        .map(|code| !GEOGRAPHIC_EPSG.contains(&code))
        .unwrap_or(false);

    if projected_crs || !bounds.is_geographic() {
        Some(QualityWarning::NotGeographic {
            crs: crs.map(str::to_string),
        })
    } else {
        None
    }
}

/// Emit each warning through `tracing`.
pub fn log_warnings(source: &str, warnings: &[QualityWarning]) {
    for warning in warnings {
        warn!(source = source, warning = %warning, "Raster quality warning");
    }
}
