//! Min-max normalization of the valid cells of a grid.

use ndarray::{Array2, ArrayView2, Zip};
use serde::Serialize;

use super::{validity_mask, NoData};
use crate::error::Result;

/// Value given to every valid cell when the observed range is a single point.
pub const DEGENERATE_MIDPOINT: f32 = 0.5;

/// Observed value range over the valid cells.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ValueRange {
    pub min: f32,
    pub max: f32,
}

impl ValueRange {
    pub fn is_degenerate(&self) -> bool {
        self.max <= self.min
    }

    /// Rescale a raw value into [0, 1].
    pub fn normalize(&self, value: f32) -> f32 {
        if self.is_degenerate() {
            return DEGENERATE_MIDPOINT;
        }
        let span = self.max as f64 - self.min as f64;
        (((value as f64 - self.min as f64) / span) as f32).clamp(0.0, 1.0)
    }

    /// Map a normalized value back into the raw range.
    pub fn denormalize(&self, t: f32) -> f32 {
        if self.is_degenerate() {
            return self.min;
        }
        let span = self.max as f64 - self.min as f64;
        (self.min as f64 + t.clamp(0.0, 1.0) as f64 * span) as f32
    }
}

/// A grid rescaled into [0, 1] with a parallel validity channel.
#[derive(Debug, Clone)]
pub struct NormalizedGrid {
    /// Normalized values; invalid cells keep their raw value
    pub values: Array2<f32>,
    /// `true` where the cell held a valid measurement
    pub valid: Array2<bool>,
    /// `None` when no cell is valid
    pub range: Option<ValueRange>,
}

impl NormalizedGrid {
    pub fn is_degenerate(&self) -> bool {
        self.range.map(|r| r.is_degenerate()).unwrap_or(false)
    }

    pub fn valid_count(&self) -> usize {
        self.valid.iter().filter(|&&v| v).count()
    }

    /// Normalized value of a cell, `None` if the cell is invalid or out of range.
    pub fn get(&self, row: usize, col: usize) -> Option<f32> {
        match self.valid.get((row, col)) {
            Some(true) => self.values.get((row, col)).copied(),
            _ => None,
        }
    }
}

/// Compute the range of the cells flagged valid.
pub fn value_range(data: ArrayView2<'_, f32>, valid: ArrayView2<'_, bool>) -> Option<ValueRange> {
    let mut range: Option<ValueRange> = None;

    Zip::from(data).and(valid).for_each(|&value, &ok| {
        if !ok {
            return;
        }
        range = Some(match range {
            None => ValueRange {
                min: value,
                max: value,
            },
            Some(r) => ValueRange {
                min: r.min.min(value),
                max: r.max.max(value),
            },
        });
    });

    range
}

/// Mask invalid cells, then rescale the remaining cells by their own min/max.
///
/// A constant grid (or a single valid cell) maps every valid cell to
/// [`DEGENERATE_MIDPOINT`] instead of dividing by zero.
pub fn normalize(data: ArrayView2<'_, f32>, nodata: NoData<'_>) -> Result<NormalizedGrid> {
    let valid = validity_mask(data, nodata)?;
    let range = value_range(data, valid.view());

    let values = match range {
        Some(range) => Zip::from(data).and(&valid).map_collect(|&value, &ok| {
            if ok {
                range.normalize(value)
            } else {
                value
            }
        }),
        None => data.to_owned(),
    };

    Ok(NormalizedGrid {
        values,
        valid,
        range,
    })
}
