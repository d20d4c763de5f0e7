//! Diverging colormaps (two-hue progression with center).
//!
//! SPI is centered on zero, so these are the natural choice for the
//! continuous overlay. All of them put the dry end (normalized 0.0) on the
//! warm side.

use super::colormap::GradientColormap;

/// Red-yellow-blue; the default overlay colormap
pub fn rd_yl_bu() -> GradientColormap {
    GradientColormap::new("rdylbu", colorgrad::rd_yl_bu())
}

pub fn rd_bu() -> GradientColormap {
    GradientColormap::new("rdbu", colorgrad::rd_bu())
}

/// Brown-blue-green, the conventional precipitation palette
pub fn br_bg() -> GradientColormap {
    GradientColormap::new("brbg", colorgrad::br_bg())
}

pub fn spectral() -> GradientColormap {
    GradientColormap::new("spectral", colorgrad::spectral())
}

pub fn rd_yl_gn() -> GradientColormap {
    GradientColormap::new("rdylgn", colorgrad::rd_yl_gn())
}
