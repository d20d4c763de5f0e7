//! Colormap implementations for overlay rendering.
//!
//! Continuous colormaps map the normalized grid to color; the drought
//! palette maps severity categories to fixed band colors.

pub mod colormap;
pub mod diverging;
pub mod drought;
pub mod sequential;

pub use colormap::{get_colormap, to_hex, Colormap, GradientColormap, COLORMAP_NAMES, TRANSPARENT};
pub use drought::DroughtPalette;
