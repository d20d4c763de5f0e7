//! Colormap trait and lookup.

use colorgrad::Gradient;

use crate::error::{DroughtMapError, Result};

/// Fully transparent pixel used for invalid cells.
pub const TRANSPARENT: [u8; 4] = [0, 0, 0, 0];

/// Trait for continuous color mapping implementations
pub trait Colormap: Send + Sync {
    /// Map a normalized value (0.0 to 1.0) to an RGBA color
    fn map_normalized(&self, value: f32) -> [u8; 4];

    /// Map a value to an RGBA color given the data range
    fn map(&self, value: f32, min: f32, max: f32) -> [u8; 4] {
        let normalized = if max > min {
            ((value - min) / (max - min)).clamp(0.0, 1.0)
        } else {
            0.5
        };
        self.map_normalized(normalized)
    }

    /// Get the name of this colormap
    fn name(&self) -> &str;
}

/// A colormap backed by a `colorgrad` gradient.
pub struct GradientColormap {
    name: String,
    gradient: Gradient,
    reversed: bool,
}

impl GradientColormap {
    pub fn new(name: impl Into<String>, gradient: Gradient) -> Self {
        Self {
            name: name.into(),
            gradient,
            reversed: false,
        }
    }

    /// Run the gradient from 1.0 down to 0.0.
    pub fn reversed(mut self) -> Self {
        self.reversed = !self.reversed;
        self.name = match self.name.strip_suffix("_r") {
            Some(base) => base.to_string(),
            None => format!("{}_r", self.name),
        };
        self
    }
}

impl Colormap for GradientColormap {
    fn map_normalized(&self, value: f32) -> [u8; 4] {
        if !value.is_finite() {
            return TRANSPARENT;
        }
        let t = value.clamp(0.0, 1.0) as f64;
        let t = if self.reversed { 1.0 - t } else { t };
        self.gradient.at(t).to_rgba8()
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Names accepted by [`get_colormap`], without the `_r` variants.
pub const COLORMAP_NAMES: [&str; 11] = [
    "rdylbu", "rdbu", "brbg", "spectral", "rdylgn", "viridis", "plasma", "inferno", "magma",
    "cividis", "turbo",
];

/// Get a colormap by name. A `_r` suffix reverses the gradient.
pub fn get_colormap(name: &str) -> Result<Box<dyn Colormap>> {
    use super::{diverging, sequential};

    let lower = name.to_lowercase();
    let (base, reversed) = match lower.strip_suffix("_r") {
        Some(base) => (base, true),
        None => (lower.as_str(), false),
    };

    let colormap = match base {
        "rdylbu" => diverging::rd_yl_bu(),
        "rdbu" => diverging::rd_bu(),
        "brbg" => diverging::br_bg(),
        "spectral" => diverging::spectral(),
        "rdylgn" => diverging::rd_yl_gn(),
        "viridis" => sequential::viridis(),
        "plasma" => sequential::plasma(),
        "inferno" => sequential::inferno(),
        "magma" => sequential::magma(),
        "cividis" => sequential::cividis(),
        "turbo" => sequential::turbo(),
        _ => {
            return Err(DroughtMapError::InvalidParameter {
                param: "colormap".to_string(),
                message: format!(
                    "Unknown colormap: {}. Must be one of: {} (optionally with _r)",
                    name,
                    COLORMAP_NAMES.join(", ")
                ),
            })
        }
    };

    Ok(if reversed {
        Box::new(colormap.reversed())
    } else {
        Box::new(colormap)
    })
}

/// Format an RGBA color as `#rrggbb` for CSS.
pub fn to_hex(color: [u8; 4]) -> String {
    format!("#{:02x}{:02x}{:02x}", color[0], color[1], color[2])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_boxed_colormap_crosses_threads() {
        let colormap = get_colormap("viridis").unwrap();
        let color = std::thread::spawn(move || colormap.map_normalized(0.0))
            .join()
            .unwrap();
        assert_eq!(color[3], 255);
    }

    #[test]
    fn test_every_listed_name_resolves() {
        for name in COLORMAP_NAMES {
            let colormap = get_colormap(name).unwrap();
            assert_eq!(colormap.name(), name);
            assert_eq!(colormap.map_normalized(0.5)[3], 255);
        }
        assert!(get_colormap("jet").is_err());
    }

    #[test]
    fn test_reversed_colormap() {
        let forward = get_colormap("RdYlBu").unwrap();
        let reversed = get_colormap("rdylbu_r").unwrap();
        assert_eq!(reversed.name(), "rdylbu_r");
        assert_eq!(forward.map_normalized(0.0), reversed.map_normalized(1.0));
        assert_eq!(forward.map_normalized(1.0), reversed.map_normalized(0.0));
    }

    #[test]
    fn test_map_with_degenerate_range() {
        let colormap = get_colormap("viridis").unwrap();
        assert_eq!(
            colormap.map(3.0, 3.0, 3.0),
            colormap.map_normalized(0.5)
        );
    }

    #[test]
    fn test_non_finite_is_transparent() {
        let colormap = get_colormap("viridis").unwrap();
        assert_eq!(colormap.map_normalized(f32::NAN), TRANSPARENT);
    }

    #[test]
    fn test_to_hex() {
        assert_eq!(to_hex([230, 0, 0, 255]), "#e60000");
    }
}
