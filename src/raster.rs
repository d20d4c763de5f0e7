//! Raster grid data model.
//!
//! A [`RasterGrid`] is one band of floating-point samples with its no-data
//! sentinel, geographic bounding box and an opaque CRS label. Row 0 is the
//! northernmost row and column 0 the westernmost column, whatever the
//! source format stores.

use ndarray::{Array2, ArrayView2};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::{DroughtMapError, Result};
use crate::severity::NoData;

/// Geographic extent of a raster, in the raster's own CRS units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub south: f64,
    pub west: f64,
    pub north: f64,
    pub east: f64,
}

impl BoundingBox {
    /// Create a bounding box, rejecting inverted or non-finite extents.
    pub fn new(south: f64, west: f64, north: f64, east: f64) -> Result<Self> {
        let all_finite = [south, west, north, east].iter().all(|v| v.is_finite());
        if !all_finite || south >= north || west >= east {
            return Err(DroughtMapError::InvalidParameter {
                param: "bbox".to_string(),
                message: format!(
                    "Invalid bounding box: south={}, west={}, north={}, east={}",
                    south, west, north, east
                ),
            });
        }
        Ok(Self {
            south,
            west,
            north,
            east,
        })
    }

    /// Center as (lat, lon), the order Leaflet expects.
    pub fn center(&self) -> (f64, f64) {
        (
            (self.south + self.north) / 2.0,
            (self.west + self.east) / 2.0,
        )
    }

    /// Corners as `[[south, west], [north, east]]`.
    pub fn leaflet_bounds(&self) -> [[f64; 2]; 2] {
        [[self.south, self.west], [self.north, self.east]]
    }

    pub fn width(&self) -> f64 {
        self.east - self.west
    }

    pub fn height(&self) -> f64 {
        self.north - self.south
    }

    pub fn contains(&self, lat: f64, lon: f64) -> bool {
        (self.south..=self.north).contains(&lat) && (self.west..=self.east).contains(&lon)
    }

    /// Whether the extent fits within latitude/longitude limits.
    pub fn is_geographic(&self) -> bool {
        (-90.0..=90.0).contains(&self.south)
            && (-90.0..=90.0).contains(&self.north)
            && (-180.0..=180.0).contains(&self.west)
            && (-180.0..=180.0).contains(&self.east)
    }
}

impl FromStr for BoundingBox {
    type Err = DroughtMapError;

    /// Parse "south,west,north,east".
    fn from_str(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s.split(',').map(str::trim).collect();
        if parts.len() != 4 {
            return Err(DroughtMapError::InvalidParameter {
                param: "bbox".to_string(),
                message: "Bounding box must be in format 'south,west,north,east'".to_string(),
            });
        }

        let mut values = [0.0f64; 4];
        for (slot, part) in values.iter_mut().zip(&parts) {
            *slot = part
                .parse::<f64>()
                .map_err(|_| DroughtMapError::InvalidParameter {
                    param: "bbox".to_string(),
                    message: format!("Invalid coordinate: {}", part),
                })?;
        }

        BoundingBox::new(values[0], values[1], values[2], values[3])
    }
}

/// One band of samples plus the metadata needed to place it on a map.
#[derive(Debug, Clone)]
pub struct RasterGrid {
    /// Where the grid came from (file name or "upload")
    pub source: String,
    /// Samples, row-major, north-up
    pub data: Array2<f32>,
    /// No-data sentinel declared by the source, if any
    pub nodata: Option<f64>,
    /// Geographic extent of the outer pixel edges
    pub bounds: BoundingBox,
    /// Coordinate reference system label, passed through unmodified
    pub crs: Option<String>,
}

impl RasterGrid {
    pub fn new(
        source: impl Into<String>,
        data: Array2<f32>,
        nodata: Option<f64>,
        bounds: BoundingBox,
        crs: Option<String>,
    ) -> Self {
        Self {
            source: source.into(),
            data,
            nodata,
            bounds,
            crs,
        }
    }

    pub fn view(&self) -> ArrayView2<'_, f32> {
        self.data.view()
    }

    /// (rows, cols)
    pub fn shape(&self) -> (usize, usize) {
        self.data.dim()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// The no-data policy implied by the declared sentinel.
    pub fn nodata_policy(&self) -> NoData<'static> {
        match self.nodata {
            Some(value) => NoData::Sentinel(value as f32),
            None => NoData::None,
        }
    }

    /// Size of one cell in CRS units as (x, y).
    pub fn cell_size(&self) -> (f64, f64) {
        let (rows, cols) = self.shape();
        (
            self.bounds.width() / cols.max(1) as f64,
            self.bounds.height() / rows.max(1) as f64,
        )
    }

    /// Map a pixel corner (col, row) to (x, y) in CRS units.
    pub fn corner_to_geo(&self, col: usize, row: usize) -> (f64, f64) {
        let (dx, dy) = self.cell_size();
        (
            self.bounds.west + col as f64 * dx,
            self.bounds.north - row as f64 * dy,
        )
    }

    /// Find the (row, col) of the cell containing a location.
    pub fn cell_at(&self, lat: f64, lon: f64) -> Result<(usize, usize)> {
        if self.is_empty() || !self.bounds.contains(lat, lon) {
            return Err(DroughtMapError::OutsideRaster { lat, lon });
        }

        let (rows, cols) = self.shape();
        let (dx, dy) = self.cell_size();
        // The east and south edges belong to the last column/row.
        let col = (((lon - self.bounds.west) / dx).floor() as usize).min(cols - 1);
        let row = (((self.bounds.north - lat) / dy).floor() as usize).min(rows - 1);
        Ok((row, col))
    }

    /// Approximate heap size of the samples in bytes.
    pub fn memory_bytes(&self) -> usize {
        self.data.len() * std::mem::size_of::<f32>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn sample_grid() -> RasterGrid {
        RasterGrid::new(
            "test",
            array![[1.0, 2.0, 3.0, 4.0], [5.0, 6.0, 7.0, 8.0]],
            Some(-9999.0),
            BoundingBox::new(40.0, -100.0, 42.0, -96.0).unwrap(),
            Some("EPSG:4326".to_string()),
        )
    }

    #[test]
    fn test_bbox_parse() {
        let bbox: BoundingBox = "40.5, -100, 42, -96.25".parse().unwrap();
        assert_eq!(bbox.south, 40.5);
        assert_eq!(bbox.west, -100.0);
        assert_eq!(bbox.north, 42.0);
        assert_eq!(bbox.east, -96.25);

        assert!("1,2,3".parse::<BoundingBox>().is_err());
        assert!("1,2,x,4".parse::<BoundingBox>().is_err());
        // south above north
        assert!("42,-100,40,-96".parse::<BoundingBox>().is_err());
    }

    #[test]
    fn test_bbox_center_and_leaflet_bounds() {
        let bbox = BoundingBox::new(40.0, -100.0, 42.0, -96.0).unwrap();
        assert_eq!(bbox.center(), (41.0, -98.0));
        assert_eq!(bbox.leaflet_bounds(), [[40.0, -100.0], [42.0, -96.0]]);
    }

    #[test]
    fn test_cell_lookup() {
        let grid = sample_grid();
        assert_eq!(grid.cell_size(), (1.0, 1.0));
        // North-west corner cell
        assert_eq!(grid.cell_at(41.9, -99.9).unwrap(), (0, 0));
        // South-east corner is inclusive
        assert_eq!(grid.cell_at(40.0, -96.0).unwrap(), (1, 3));
        assert_eq!(grid.cell_at(40.5, -97.5).unwrap(), (1, 2));

        assert!(matches!(
            grid.cell_at(45.0, -98.0),
            Err(DroughtMapError::OutsideRaster { .. })
        ));
    }

    #[test]
    fn test_corner_to_geo() {
        let grid = sample_grid();
        assert_eq!(grid.corner_to_geo(0, 0), (-100.0, 42.0));
        assert_eq!(grid.corner_to_geo(4, 2), (-96.0, 40.0));
    }

    #[test]
    fn test_nodata_policy() {
        let grid = sample_grid();
        assert!(matches!(grid.nodata_policy(), NoData::Sentinel(v) if v == -9999.0));
        assert_eq!(grid.memory_bytes(), 8 * 4);
    }
}
