//! Test data generation utilities.
//!
//! Writes small SPI rasters with known values and georeferencing as GeoTIFF
//! (and, with the `netcdf` feature, NetCDF) files.

use droughtmap::data_loader::geotiff_tags::{
    GDAL_NODATA, GEOGRAPHIC_TYPE_KEY, GEO_KEY_DIRECTORY, MODEL_PIXEL_SCALE, MODEL_TIEPOINT,
};
use std::fs::File;
use std::io::{Cursor, Seek, Write};
use std::path::Path;
use tiff::encoder::{colortype, TiffEncoder};
use tiff::tags::Tag;
use tiff::TiffError;

type Result<T> = std::result::Result<T, TiffError>;

/// A single-band float raster and the georeferencing to write with it.
#[derive(Debug, Clone)]
pub struct TestRaster {
    pub width: u32,
    pub height: u32,
    /// Row-major samples, north row first
    pub samples: Vec<f32>,
    /// Longitude of the west edge
    pub west: f64,
    /// Latitude of the north edge
    pub north: f64,
    /// Cell size in degrees (x, y)
    pub pixel_size: (f64, f64),
    pub nodata: Option<&'static str>,
    pub epsg: Option<u16>,
}

impl TestRaster {
    /// The 2x2 grid `[[-2.5, -1.2], [0.3, -9999]]` over 40..42N, 100..98W.
    pub fn spi_2x2() -> Self {
        Self {
            width: 2,
            height: 2,
            samples: vec![-2.5, -1.2, 0.3, -9999.0],
            west: -100.0,
            north: 42.0,
            pixel_size: (1.0, 1.0),
            nodata: Some("-9999"),
            epsg: Some(4326),
        }
    }

    /// A grid whose values rise linearly from -3 in the north-west corner to
    /// +3 in the south-east corner.
    pub fn gradient(width: u32, height: u32) -> Self {
        let steps = (width + height - 2).max(1) as f32;
        let samples = (0..height)
            .flat_map(|row| (0..width).map(move |col| -3.0 + 6.0 * (row + col) as f32 / steps))
            .collect();

        Self {
            width,
            height,
            samples,
            west: -105.0,
            north: 45.0,
            pixel_size: (0.1, 0.1),
            nodata: None,
            epsg: Some(4326),
        }
    }

    /// A grid where every cell holds the same value.
    pub fn constant(width: u32, height: u32, value: f32) -> Self {
        Self {
            samples: vec![value; (width * height) as usize],
            ..Self::gradient(width, height)
        }
    }

    pub fn south(&self) -> f64 {
        self.north - self.pixel_size.1 * self.height as f64
    }

    pub fn east(&self) -> f64 {
        self.west + self.pixel_size.0 * self.width as f64
    }

    fn encode<W: Write + Seek>(&self, writer: W) -> Result<()> {
        let mut encoder = TiffEncoder::new(writer)?;
        let mut image = encoder.new_image::<colortype::Gray32Float>(self.width, self.height)?;

        image.encoder().write_tag(
            Tag::from_u16_exhaustive(MODEL_PIXEL_SCALE),
            &[self.pixel_size.0, self.pixel_size.1, 0.0][..],
        )?;
        image.encoder().write_tag(
            Tag::from_u16_exhaustive(MODEL_TIEPOINT),
            &[0.0, 0.0, 0.0, self.west, self.north, 0.0][..],
        )?;
        if let Some(epsg) = self.epsg {
            image.encoder().write_tag(
                Tag::from_u16_exhaustive(GEO_KEY_DIRECTORY),
                &[1u16, 1, 0, 1, GEOGRAPHIC_TYPE_KEY, 0, 1, epsg][..],
            )?;
        }
        if let Some(nodata) = self.nodata {
            image
                .encoder()
                .write_tag(Tag::from_u16_exhaustive(GDAL_NODATA), nodata)?;
        }

        image.write_data(&self.samples)?;
        Ok(())
    }

    /// Write the raster as a GeoTIFF file.
    pub fn write(&self, path: &Path) -> Result<()> {
        self.encode(File::create(path)?)
    }

    /// Encode the raster as GeoTIFF bytes, as a browser upload would send them.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut buffer = Cursor::new(Vec::new());
        self.encode(&mut buffer)?;
        Ok(buffer.into_inner())
    }
}

/// Write an SPI NetCDF file with ascending latitude and three time steps.
///
/// Time step `t` holds the 2x2 grid `[[-2.5 + t, -1.2], [0.3, fill]]` in
/// north-up order.
#[cfg(feature = "netcdf")]
pub fn create_spi_nc(path: &Path) -> std::result::Result<(), netcdf::Error> {
    let mut file = netcdf::create(path)?;

    file.add_dimension("time", 3)?;
    file.add_dimension("lat", 2)?;
    file.add_dimension("lon", 2)?;
    file.add_attribute("title", "SPI test data")?;

    {
        let mut lat = file.add_variable::<f64>("lat", &["lat"])?;
        lat.put_attribute("units", "degrees_north")?;
        lat.put_values(&[40.5, 41.5], &[..])?;
    }
    {
        let mut lon = file.add_variable::<f64>("lon", &["lon"])?;
        lon.put_attribute("units", "degrees_east")?;
        lon.put_values(&[-99.5, -98.5], &[..])?;
    }

    let mut values = Vec::with_capacity(12);
    for t in 0..3 {
        // South row first because latitude ascends
        values.extend_from_slice(&[0.3f32, -9999.0, -2.5 + t as f32, -1.2]);
    }
    {
        let mut spi = file.add_variable::<f32>("spi", &["time", "lat", "lon"])?;
        spi.put_attribute("_FillValue", -9999.0f32)?;
        spi.put_attribute("long_name", "Standardized Precipitation Index")?;
        spi.put_values(&values, &[.., .., ..])?;
    }

    Ok(())
}
