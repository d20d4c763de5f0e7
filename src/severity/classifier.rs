//! Drought severity classification.
//!
//! SPI values map onto four drought bands. Every band is closed on its
//! upper bound and open on its lower bound, so the table is contiguous:
//!
//! | Category   | SPI value          |
//! |------------|--------------------|
//! | Extreme    | v < -2.00          |
//! | Severe     | -2.00 <= v <= -1.50 |
//! | Moderate   | -1.50 < v <= -1.00 |
//! | Mild       | -1.00 < v <= 0.00  |
//! | NonDrought | v > 0.00           |
//!
//! Some published tables put -2.00 itself in the extreme band; that variant
//! is available as [`BoundaryRule::ExtremeInclusive`].

use ndarray::{Array2, ArrayView2, Zip};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::{check_shape, NoData};
use crate::error::Result;

/// Severity category of a single cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DroughtCategory {
    Extreme,
    Severe,
    Moderate,
    Mild,
    /// Valid measurement above the drought range
    NonDrought,
    /// No valid measurement; never a drought band
    NoData,
}

impl DroughtCategory {
    /// Every category, driest first.
    pub const ALL: [DroughtCategory; 6] = [
        DroughtCategory::Extreme,
        DroughtCategory::Severe,
        DroughtCategory::Moderate,
        DroughtCategory::Mild,
        DroughtCategory::NonDrought,
        DroughtCategory::NoData,
    ];

    /// The four drought bands, driest first.
    pub const BANDS: [DroughtCategory; 4] = [
        DroughtCategory::Extreme,
        DroughtCategory::Severe,
        DroughtCategory::Moderate,
        DroughtCategory::Mild,
    ];

    pub fn is_drought(self) -> bool {
        Self::BANDS.contains(&self)
    }

    /// Human-readable name used in legends and GeoJSON properties.
    pub fn label(self) -> &'static str {
        match self {
            DroughtCategory::Extreme => "Extreme drought",
            DroughtCategory::Severe => "Severe drought",
            DroughtCategory::Moderate => "Moderate drought",
            DroughtCategory::Mild => "Mild drought",
            DroughtCategory::NonDrought => "No drought",
            DroughtCategory::NoData => "No data",
        }
    }

    /// SPI range covered by the category under `rule`, as printed in the
    /// legend.
    pub fn range_label(self, rule: BoundaryRule) -> &'static str {
        match (self, rule) {
            (DroughtCategory::Extreme, BoundaryRule::UpperInclusive) => "v < -2.00",
            (DroughtCategory::Extreme, BoundaryRule::ExtremeInclusive) => "v <= -2.00",
            (DroughtCategory::Severe, BoundaryRule::UpperInclusive) => "-2.00 <= v <= -1.50",
            (DroughtCategory::Severe, BoundaryRule::ExtremeInclusive) => "-2.00 < v <= -1.50",
            (DroughtCategory::Moderate, _) => "-1.50 < v <= -1.00",
            (DroughtCategory::Mild, _) => "-1.00 < v <= 0.00",
            (DroughtCategory::NonDrought, _) => "v > 0.00",
            (DroughtCategory::NoData, _) => "missing",
        }
    }

    /// A value well inside the band, for legends and sanity checks.
    pub fn representative_value(self) -> Option<f32> {
        match self {
            DroughtCategory::Extreme => Some(-2.5),
            DroughtCategory::Severe => Some(-1.75),
            DroughtCategory::Moderate => Some(-1.25),
            DroughtCategory::Mild => Some(-0.5),
            DroughtCategory::NonDrought => Some(1.0),
            DroughtCategory::NoData => None,
        }
    }
}

impl fmt::Display for DroughtCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Which band owns the -2.00 boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoundaryRule {
    /// -2.00 is severe; every band includes its upper bound
    #[default]
    UpperInclusive,
    /// -2.00 is extreme
    ExtremeInclusive,
}

/// Classify one SPI value with the default boundary rule.
pub fn classify_value(value: f32) -> DroughtCategory {
    classify_value_with_rule(value, BoundaryRule::default())
}

/// Classify one SPI value. Non-finite values are [`DroughtCategory::NoData`].
pub fn classify_value_with_rule(value: f32, rule: BoundaryRule) -> DroughtCategory {
    if !value.is_finite() {
        return DroughtCategory::NoData;
    }

    let extreme = match rule {
        BoundaryRule::UpperInclusive => value < -2.0,
        BoundaryRule::ExtremeInclusive => value <= -2.0,
    };

    if extreme {
        DroughtCategory::Extreme
    } else if value <= -1.5 {
        DroughtCategory::Severe
    } else if value <= -1.0 {
        DroughtCategory::Moderate
    } else if value <= 0.0 {
        DroughtCategory::Mild
    } else {
        DroughtCategory::NonDrought
    }
}

/// Classify every cell of a grid with the default boundary rule.
pub fn classify(data: ArrayView2<'_, f32>, nodata: NoData<'_>) -> Result<Array2<DroughtCategory>> {
    classify_with_rule(data, nodata, BoundaryRule::default())
}

/// Classify every cell of a grid in a single pass.
pub fn classify_with_rule(
    data: ArrayView2<'_, f32>,
    nodata: NoData<'_>,
    rule: BoundaryRule,
) -> Result<Array2<DroughtCategory>> {
    match nodata {
        NoData::Mask(mask) => {
            check_shape(data.dim(), mask.dim())?;
            Ok(Zip::from(data).and(mask).map_collect(|&value, &keep| {
                if keep {
                    classify_value_with_rule(value, rule)
                } else {
                    DroughtCategory::NoData
                }
            }))
        }
        policy => Ok(data.map(|&value| {
            if policy.accepts(value) {
                classify_value_with_rule(value, rule)
            } else {
                DroughtCategory::NoData
            }
        })),
    }
}

/// Cell count for one category.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryCount {
    pub category: DroughtCategory,
    pub label: &'static str,
    pub count: usize,
    /// Share of the valid cells (0 for the no-data entry)
    pub fraction: f64,
}

/// Per-category statistics of a classified grid.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassificationSummary {
    pub total_cells: usize,
    pub valid_cells: usize,
    pub nodata_cells: usize,
    pub counts: Vec<CategoryCount>,
}

impl ClassificationSummary {
    pub fn from_categories(categories: &Array2<DroughtCategory>) -> Self {
        let mut tally = [0usize; 6];
        for category in categories.iter() {
            tally[*category as usize] += 1;
        }

        let total_cells = categories.len();
        let nodata_cells = tally[DroughtCategory::NoData as usize];
        let valid_cells = total_cells - nodata_cells;

        let counts = DroughtCategory::ALL
            .iter()
            .map(|&category| {
                let count = tally[category as usize];
                let fraction = if category == DroughtCategory::NoData || valid_cells == 0 {
                    0.0
                } else {
                    count as f64 / valid_cells as f64
                };
                CategoryCount {
                    category,
                    label: category.label(),
                    count,
                    fraction,
                }
            })
            .collect();

        Self {
            total_cells,
            valid_cells,
            nodata_cells,
            counts,
        }
    }

    pub fn count(&self, category: DroughtCategory) -> usize {
        self.counts
            .iter()
            .find(|c| c.category == category)
            .map(|c| c.count)
            .unwrap_or(0)
    }

    /// Share of all cells that are no-data.
    pub fn nodata_fraction(&self) -> f64 {
        if self.total_cells == 0 {
            0.0
        } else {
            self.nodata_cells as f64 / self.total_cells as f64
        }
    }

    /// Share of valid cells in any drought band.
    pub fn drought_fraction(&self) -> f64 {
        if self.valid_cells == 0 {
            return 0.0;
        }
        let drought: usize = DroughtCategory::BANDS.iter().map(|&c| self.count(c)).sum();
        drought as f64 / self.valid_cells as f64
    }
}
