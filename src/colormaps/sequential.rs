//! Sequential colormaps (single-hue or perceptual progression).
//!
//! Suitable for magnitude-style views of the normalized grid where no
//! central value is meaningful.

use super::colormap::GradientColormap;

/// Viridis colormap - perceptually uniform, colorblind-friendly
pub fn viridis() -> GradientColormap {
    GradientColormap::new("viridis", colorgrad::viridis())
}

pub fn plasma() -> GradientColormap {
    GradientColormap::new("plasma", colorgrad::plasma())
}

pub fn inferno() -> GradientColormap {
    GradientColormap::new("inferno", colorgrad::inferno())
}

pub fn magma() -> GradientColormap {
    GradientColormap::new("magma", colorgrad::magma())
}

/// Cividis colormap - colorblind-friendly alternative to viridis
pub fn cividis() -> GradientColormap {
    GradientColormap::new("cividis", colorgrad::cividis())
}

pub fn turbo() -> GradientColormap {
    GradientColormap::new("turbo", colorgrad::turbo())
}
