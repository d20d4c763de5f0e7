//! Categorical palette for drought severity bands.

use crate::severity::DroughtCategory;

use super::colormap::TRANSPARENT;

/// Colors for the four drought bands, driest (darkest) first.
///
/// Non-drought and no-data cells are left transparent so the basemap shows
/// through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DroughtPalette {
    pub extreme: [u8; 4],
    pub severe: [u8; 4],
    pub moderate: [u8; 4],
    pub mild: [u8; 4],
}

impl Default for DroughtPalette {
    fn default() -> Self {
        Self {
            extreme: [115, 0, 0, 255],
            severe: [230, 0, 0, 255],
            moderate: [255, 170, 0, 255],
            mild: [252, 211, 127, 255],
        }
    }
}

impl DroughtPalette {
    pub fn color(&self, category: DroughtCategory) -> [u8; 4] {
        match category {
            DroughtCategory::Extreme => self.extreme,
            DroughtCategory::Severe => self.severe,
            DroughtCategory::Moderate => self.moderate,
            DroughtCategory::Mild => self.mild,
            DroughtCategory::NonDrought | DroughtCategory::NoData => TRANSPARENT,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_drought_bands_are_opaque() {
        let palette = DroughtPalette::default();
        for category in DroughtCategory::ALL {
            let alpha = palette.color(category)[3];
            assert_eq!(alpha == 255, category.is_drought(), "{:?}", category);
        }
    }

    #[test]
    fn test_band_colors_are_distinct() {
        let palette = DroughtPalette::default();
        let colors: Vec<_> = DroughtCategory::BANDS
            .iter()
            .map(|&c| palette.color(c))
            .collect();
        for (i, a) in colors.iter().enumerate() {
            for b in &colors[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }
}
