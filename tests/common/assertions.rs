//! Assertion utilities for testing.
//!
//! Floating-point comparisons for normalized grids and checks on rendered
//! overlays.

use image::RgbaImage;
use ndarray::ArrayView2;

/// Default epsilon for floating-point comparisons
pub const DEFAULT_EPSILON: f32 = 1e-6;

/// Assert that two floating-point values are approximately equal.
///
/// # Panics
///
/// Panics if the absolute difference between `actual` and `expected` is greater than `epsilon`.
pub fn assert_approx_eq(actual: f32, expected: f32, epsilon: Option<f32>) {
    let epsilon = epsilon.unwrap_or(DEFAULT_EPSILON);
    let diff = (actual - expected).abs();

    assert!(
        diff <= epsilon,
        "Values not approximately equal: actual = {}, expected = {}, diff = {}, epsilon = {}",
        actual,
        expected,
        diff,
        epsilon
    );
}

/// Assert that every valid cell of a normalized grid lies in [0, 1] and every
/// invalid cell is left alone.
pub fn assert_unit_interval(values: ArrayView2<'_, f32>, valid: ArrayView2<'_, bool>) {
    assert_eq!(values.dim(), valid.dim(), "Grid and mask shapes differ");

    for ((row, col), &value) in values.indexed_iter() {
        if valid[[row, col]] {
            assert!(
                (0.0..=1.0).contains(&value),
                "Normalized value out of range at ({}, {}): {}",
                row,
                col,
                value
            );
        }
    }
}

/// Assert that the overlay pixel at a grid cell is fully transparent.
pub fn assert_transparent(img: &RgbaImage, row: u32, col: u32) {
    let pixel = img.get_pixel(col, row);
    assert_eq!(
        pixel.0[3], 0,
        "Expected transparent pixel at ({}, {}), got {:?}",
        row, col, pixel.0
    );
}

/// Assert that the overlay pixel at a grid cell is fully opaque.
pub fn assert_opaque(img: &RgbaImage, row: u32, col: u32) {
    let pixel = img.get_pixel(col, row);
    assert_eq!(
        pixel.0[3], 255,
        "Expected opaque pixel at ({}, {}), got {:?}",
        row, col, pixel.0
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_assert_approx_eq() {
        assert_approx_eq(1.0, 1.0, None);
        assert_approx_eq(1.0, 1.0000001, None);
        assert_approx_eq(1.0, 1.001, Some(0.01));
    }

    #[test]
    fn test_assert_unit_interval_ignores_invalid_cells() {
        let values = array![[0.0, 1.0], [0.5, -9999.0]];
        let valid = array![[true, true], [true, false]];
        assert_unit_interval(values.view(), valid.view());
    }
}
