//! Legend for the drought overlay.
//!
//! The legend always lists the four drought bands with their SPI ranges as
//! the active [`BoundaryRule`] draws them. In continuous mode each band is shown in the colormap color of its
//! representative value, and a colorbar spans the observed range.

use serde::Serialize;

use super::escape_html;
use super::overlay::OverlayMode;
use crate::colormaps::{to_hex, Colormap, DroughtPalette};
use crate::severity::{BoundaryRule, DroughtCategory, ValueRange};

/// Number of color stops sampled for the colorbar.
const COLORBAR_STOPS: usize = 11;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LegendEntry {
    pub category: DroughtCategory,
    pub label: &'static str,
    /// SPI range text, e.g. "-1.50 < v <= -1.00"
    pub range: &'static str,
    /// CSS hex color
    pub color: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Colorbar {
    pub colormap: String,
    pub min: f32,
    pub max: f32,
    /// Evenly spaced CSS colors from `min` to `max`
    pub stops: Vec<String>,
    /// All valid cells share one value
    pub degenerate: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Legend {
    pub title: String,
    pub mode: OverlayMode,
    pub entries: Vec<LegendEntry>,
    pub colorbar: Option<Colorbar>,
}

pub fn build_legend(
    mode: OverlayMode,
    palette: &DroughtPalette,
    colormap: &dyn Colormap,
    range: Option<ValueRange>,
    rule: BoundaryRule,
) -> Legend {
    let color_for = |category: DroughtCategory| match (mode, range) {
        (OverlayMode::Continuous, Some(range)) => {
            let value = category.representative_value().unwrap_or(range.min);
            to_hex(colormap.map_normalized(range.normalize(value)))
        }
        _ => to_hex(palette.color(category)),
    };

    let entries = DroughtCategory::BANDS
        .iter()
        .map(|&category| LegendEntry {
            category,
            label: category.label(),
            range: category.range_label(rule),
            color: color_for(category),
        })
        .collect();

    let colorbar = match (mode, range) {
        (OverlayMode::Continuous, Some(range)) => Some(Colorbar {
            colormap: colormap.name().to_string(),
            min: range.min,
            max: range.max,
            stops: (0..COLORBAR_STOPS)
                .map(|i| {
                    let t = i as f32 / (COLORBAR_STOPS - 1) as f32;
                    let t = if range.is_degenerate() { 0.5 } else { t };
                    to_hex(colormap.map_normalized(t))
                })
                .collect(),
            degenerate: range.is_degenerate(),
        }),
        _ => None,
    };

    Legend {
        title: "Drought severity (SPI)".to_string(),
        mode,
        entries,
        colorbar,
    }
}

impl Legend {
    /// HTML fragment for the legend panel.
    pub fn to_html(&self) -> String {
        let mut html = String::new();
        html.push_str(&format!(
            "<div class=\"legend\">\n<h4>{}</h4>\n",
            escape_html(&self.title)
        ));

        for entry in &self.entries {
            html.push_str(&format!(
                "<div class=\"legend-row\"><span class=\"swatch\" style=\"background:{}\"></span>{} <small>({})</small></div>\n",
                escape_html(&entry.color),
                escape_html(entry.label),
                escape_html(entry.range),
            ));
        }

        if let Some(colorbar) = &self.colorbar {
            let gradient = colorbar.stops.join(", ");
            html.push_str(&format!(
                "<div class=\"colorbar\" style=\"background:linear-gradient(to right, {})\"></div>\n",
                escape_html(&gradient)
            ));
            html.push_str(&format!(
                "<div class=\"colorbar-labels\"><span>{:.2}</span><span>{:.2}</span></div>\n",
                colorbar.min, colorbar.max
            ));
        }

        html.push_str("</div>\n");
        html
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::colormaps::get_colormap;

    #[test]
    fn test_categorical_legend() {
        let palette = DroughtPalette::default();
        let colormap = get_colormap("rdylbu").unwrap();
        let legend = build_legend(
            OverlayMode::Categorical,
            &palette,
            colormap.as_ref(),
            None,
            BoundaryRule::UpperInclusive,
        );

        assert_eq!(legend.entries.len(), 4);
        assert_eq!(legend.entries[0].category, DroughtCategory::Extreme);
        assert_eq!(legend.entries[0].color, "#730000");
        assert_eq!(legend.entries[0].range, "v < -2.00");
        assert_eq!(legend.entries[1].range, "-2.00 <= v <= -1.50");
        assert!(legend.colorbar.is_none());
    }

    #[test]
    fn test_legend_follows_boundary_rule() {
        let palette = DroughtPalette::default();
        let colormap = get_colormap("rdylbu").unwrap();
        let legend = build_legend(
            OverlayMode::Categorical,
            &palette,
            colormap.as_ref(),
            None,
            BoundaryRule::ExtremeInclusive,
        );

        assert_eq!(legend.entries[0].range, "v <= -2.00");
        assert_eq!(legend.entries[1].range, "-2.00 < v <= -1.50");
        assert!(legend.to_html().contains("v &lt;= -2.00"));
    }

    #[test]
    fn test_continuous_legend_has_colorbar() {
        let palette = DroughtPalette::default();
        let colormap = get_colormap("rdylbu").unwrap();
        let range = ValueRange {
            min: -2.5,
            max: 0.3,
        };
        let legend = build_legend(
            OverlayMode::Continuous,
            &palette,
            colormap.as_ref(),
            Some(range),
            BoundaryRule::default(),
        );

        let colorbar = legend.colorbar.as_ref().unwrap();
        assert_eq!(colorbar.stops.len(), COLORBAR_STOPS);
        assert_eq!(colorbar.min, -2.5);
        assert!(!colorbar.degenerate);
        // Extreme sits at the very dry end of this range
        assert_eq!(
            legend.entries[0].color,
            to_hex(colormap.map_normalized(0.0))
        );

        let html = legend.to_html();
        assert!(html.contains("linear-gradient"));
        assert!(html.contains("-2.50"));
        assert!(html.contains("Severe drought"));
    }

    #[test]
    fn test_continuous_without_range_falls_back_to_palette() {
        let palette = DroughtPalette::default();
        let colormap = get_colormap("viridis").unwrap();
        let legend = build_legend(
            OverlayMode::Continuous,
            &palette,
            colormap.as_ref(),
            None,
            BoundaryRule::default(),
        );
        assert!(legend.colorbar.is_none());
        assert_eq!(legend.entries[3].color, to_hex(palette.mild));
    }
}
