//! Drought severity analysis of SPI grids.
//!
//! Everything here is a pure function over an in-memory grid: classification
//! into severity bands, min-max normalization for colormap lookup, and the
//! quality checks that flag grids whose no-data handling would produce a
//! misleading map.
//!
//! Both the classifier and the normalizer take a [`NoData`] policy. Masking
//! always happens before any statistic is computed, so a sentinel such as
//! `-9999` can never leak into the observed value range.

pub mod classifier;
pub mod normalize;
pub mod quality;

use ndarray::{Array2, ArrayView2, Zip};

use crate::error::{DroughtMapError, Result};

pub use classifier::{
    classify, classify_value, classify_value_with_rule, classify_with_rule, BoundaryRule,
    CategoryCount, ClassificationSummary, DroughtCategory,
};
pub use normalize::{normalize, NormalizedGrid, ValueRange};
pub use quality::{assess, assess_georeference, QualityThresholds, QualityWarning};

/// How invalid cells are identified.
///
/// Non-finite samples (NaN, ±Inf) are invalid under every policy.
#[derive(Debug, Clone, Copy)]
pub enum NoData<'a> {
    /// Only non-finite samples are invalid
    None,
    /// Samples equal to this sentinel are invalid
    Sentinel(f32),
    /// Cells whose mask entry is `false` are invalid
    Mask(ArrayView2<'a, bool>),
}

impl NoData<'_> {
    /// Check a single sample against the value-based part of the policy.
    ///
    /// For [`NoData::Mask`] only finiteness is checked; the mask itself is
    /// positional and applied by the grid-level functions.
    pub fn accepts(&self, value: f32) -> bool {
        match self {
            NoData::Sentinel(sentinel) => value.is_finite() && value != *sentinel,
            NoData::None | NoData::Mask(_) => value.is_finite(),
        }
    }
}

/// Build the per-cell validity channel for a grid.
pub fn validity_mask(data: ArrayView2<'_, f32>, nodata: NoData<'_>) -> Result<Array2<bool>> {
    match nodata {
        NoData::Mask(mask) => {
            check_shape(data.dim(), mask.dim())?;
            Ok(Zip::from(data)
                .and(mask)
                .map_collect(|value, &keep| keep && value.is_finite()))
        }
        policy => Ok(data.map(|&value| policy.accepts(value))),
    }
}

pub(crate) fn check_shape(expected: (usize, usize), actual: (usize, usize)) -> Result<()> {
    if expected != actual {
        return Err(DroughtMapError::ShapeMismatch { expected, actual });
    }
    Ok(())
}
