//! Raster loading.
//!
//! GeoTIFF is the primary input: the first sample of each pixel is read as
//! the band, georeferencing comes from the ModelPixelScale/ModelTiepoint
//! (or ModelTransformation) tags, the no-data sentinel from GDAL_NODATA and
//! the CRS label from the GeoKey directory. NetCDF grids are supported when
//! the `netcdf` feature is enabled.

use ndarray::Array2;
use std::fs::File;
use std::io::{BufReader, Cursor, Read, Seek};
use std::path::Path;
use tiff::decoder::{Decoder, DecodingResult};
use tiff::tags::Tag;
use tracing::{debug, info, warn};

use crate::config::DataConfig;
use crate::error::{DroughtMapError, Result};
use crate::logging::log_raster_load_stats;
use crate::raster::{BoundingBox, RasterGrid};

/// TIFF tag and GeoKey numbers used for georeferencing.
pub mod geotiff_tags {
    pub const MODEL_PIXEL_SCALE: u16 = 33550;
    pub const MODEL_TIEPOINT: u16 = 33922;
    pub const MODEL_TRANSFORMATION: u16 = 34264;
    pub const GEO_KEY_DIRECTORY: u16 = 34735;
    pub const GDAL_NODATA: u16 = 42113;

    pub const GEOGRAPHIC_TYPE_KEY: u16 = 2048;
    pub const PROJECTED_CS_TYPE_KEY: u16 = 3072;
    /// GeoKey value meaning "user-defined", which carries no EPSG code
    pub const USER_DEFINED: u32 = 32767;
}

/// Overrides applied on top of what the file declares.
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Replace (or supply) the no-data sentinel
    pub nodata: Option<f64>,
    /// Replace (or supply) the bounding box
    pub bounds: Option<BoundingBox>,
    /// Variable to read from multi-variable formats
    pub variable: Option<String>,
    /// Slice of the leading (time) dimension of multi-variable formats
    pub time_index: usize,
}

impl LoadOptions {
    pub fn from_config(config: &DataConfig) -> Self {
        Self {
            nodata: config.nodata,
            bounds: config.bounds,
            variable: config.variable.clone(),
            time_index: config.time_index,
        }
    }
}

/// Load a raster file, choosing the decoder from its extension.
pub fn load_raster(path: &Path, options: &LoadOptions) -> Result<RasterGrid> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "nc" | "nc4" | "netcdf" => load_netcdf_raster(path, options),
        _ => load_geotiff(path, options),
    }
}

/// Load a GeoTIFF from disk.
pub fn load_geotiff(path: &Path, options: &LoadOptions) -> Result<RasterGrid> {
    // Check if the file exists
    if !path.exists() {
        return Err(DroughtMapError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("File not found: {}", path.display()),
        )));
    }

    let file = File::open(path)?;
    info!("Opened GeoTIFF file: {}", path.display());

    let source = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    let raster = decode_geotiff(BufReader::new(file), &source, options)?;
    log_raster_load_stats(&path.display().to_string(), &raster);
    Ok(raster)
}

/// Load a GeoTIFF held in memory, e.g. an uploaded file.
pub fn load_geotiff_bytes(bytes: &[u8], source: &str, options: &LoadOptions) -> Result<RasterGrid> {
    let raster = decode_geotiff(Cursor::new(bytes), source, options)?;
    log_raster_load_stats(source, &raster);
    Ok(raster)
}

fn decode_geotiff<R: Read + Seek>(
    reader: R,
    source: &str,
    options: &LoadOptions,
) -> Result<RasterGrid> {
    let mut decoder = Decoder::new(reader)?;
    let (width, height) = decoder.dimensions()?;
    debug!(width = width, height = height, "Decoding GeoTIFF");

    let bounds = match options.bounds {
        Some(bounds) => bounds,
        None => read_bounds(&mut decoder, width, height)?.ok_or_else(|| {
            DroughtMapError::RasterFormat {
                message: format!(
                    "{} has no georeferencing tags; configure a bounding box override",
                    source
                ),
            }
        })?,
    };

    let nodata = match options.nodata {
        Some(value) => Some(value),
        None => read_nodata(&mut decoder)?,
    };

    let crs = read_crs(&mut decoder)?;

    let samples = convert_to_f32(decoder.read_image()?);
    let data = first_band(samples, width as usize, height as usize)?;

    Ok(RasterGrid::new(source, data, nodata, bounds, crs))
}

pub(crate) fn tag(code: u16) -> Tag {
    Tag::from_u16_exhaustive(code)
}

fn read_bounds<R: Read + Seek>(
    decoder: &mut Decoder<R>,
    width: u32,
    height: u32,
) -> Result<Option<BoundingBox>> {
    use geotiff_tags::*;

    let scale = decoder
        .find_tag(tag(MODEL_PIXEL_SCALE))?
        .map(|v| v.into_f64_vec())
        .transpose()?;
    let tiepoint = decoder
        .find_tag(tag(MODEL_TIEPOINT))?
        .map(|v| v.into_f64_vec())
        .transpose()?;

    let (origin_x, origin_y, pixel_x, pixel_y) = match (scale, tiepoint) {
        (Some(scale), Some(tiepoint)) if scale.len() >= 2 && tiepoint.len() >= 6 => {
            // Tiepoint maps raster (i, j) to model (x, y)
            let (i, j, x, y) = (tiepoint[0], tiepoint[1], tiepoint[3], tiepoint[4]);
            (x - i * scale[0], y + j * scale[1], scale[0], scale[1])
        }
        _ => {
            let matrix = decoder
                .find_tag(tag(MODEL_TRANSFORMATION))?
                .map(|v| v.into_f64_vec())
                .transpose()?;
            match matrix {
                Some(m) if m.len() >= 8 => {
                    if m[1] != 0.0 || m[4] != 0.0 {
                        return Err(DroughtMapError::RasterFormat {
                            message: "Rotated or sheared rasters are not supported".to_string(),
                        });
                    }
                    (m[3], m[7], m[0], -m[5])
                }
                _ => return Ok(None),
            }
        }
    };

    let west = origin_x;
    let north = origin_y;
    let east = west + width as f64 * pixel_x;
    let south = north - height as f64 * pixel_y;

    BoundingBox::new(south, west, north, east)
        .map(Some)
        .map_err(|e| DroughtMapError::RasterFormat {
            message: format!("Georeferencing tags describe an invalid extent: {}", e),
        })
}

fn read_nodata<R: Read + Seek>(decoder: &mut Decoder<R>) -> Result<Option<f64>> {
    let text = match decoder.find_tag(tag(geotiff_tags::GDAL_NODATA))? {
        Some(value) => value.into_string()?,
        None => return Ok(None),
    };

    let trimmed = text.trim_matches(|c: char| c == '\0' || c.is_whitespace());
    match trimmed.parse::<f64>() {
        // NaN samples are invalid regardless of the sentinel
        Ok(value) if value.is_nan() => Ok(None),
        Ok(value) => Ok(Some(value)),
        Err(_) => {
            warn!("Ignoring unparseable GDAL_NODATA value: {:?}", trimmed);
            Ok(None)
        }
    }
}

fn read_crs<R: Read + Seek>(decoder: &mut Decoder<R>) -> Result<Option<String>> {
    use geotiff_tags::*;

    let keys = match decoder.find_tag(tag(GEO_KEY_DIRECTORY))? {
        Some(value) => value.into_u32_vec()?,
        None => return Ok(None),
    };

    Ok(epsg_from_geokeys(&keys).map(|code| format!("EPSG:{}", code)))
}

/// Pull an EPSG code out of a GeoKey directory, preferring the projected CRS.
fn epsg_from_geokeys(keys: &[u32]) -> Option<u32> {
    use geotiff_tags::*;

    if keys.len() < 4 {
        return None;
    }

    let key_count = keys[3] as usize;
    let entries: Vec<&[u32]> = keys[4..].chunks_exact(4).take(key_count).collect();

    let lookup = |wanted: u16| {
        entries
            .iter()
            // Location 0 means the value is stored inline
            .find(|entry| entry[0] == wanted as u32 && entry[1] == 0)
            .map(|entry| entry[3])
            .filter(|&code| code != 0 && code != USER_DEFINED)
    };

    lookup(PROJECTED_CS_TYPE_KEY).or_else(|| lookup(GEOGRAPHIC_TYPE_KEY))
}

fn convert_to_f32(data: DecodingResult) -> Vec<f32> {
    match data {
        DecodingResult::U8(values) => values.into_iter().map(|v| v as f32).collect(),
        DecodingResult::U16(values) => values.into_iter().map(|v| v as f32).collect(),
        DecodingResult::U32(values) => values.into_iter().map(|v| v as f32).collect(),
        DecodingResult::U64(values) => values.into_iter().map(|v| v as f32).collect(),
        DecodingResult::I8(values) => values.into_iter().map(|v| v as f32).collect(),
        DecodingResult::I16(values) => values.into_iter().map(|v| v as f32).collect(),
        DecodingResult::I32(values) => values.into_iter().map(|v| v as f32).collect(),
        DecodingResult::I64(values) => values.into_iter().map(|v| v as f32).collect(),
        DecodingResult::F32(values) => values,
        DecodingResult::F64(values) => values.into_iter().map(|v| v as f32).collect(),
    }
}

/// Keep the first sample of each pixel from chunky multi-sample data.
fn first_band(samples: Vec<f32>, width: usize, height: usize) -> Result<Array2<f32>> {
    let pixels = width * height;
    if pixels == 0 || samples.len() < pixels || samples.len() % pixels != 0 {
        return Err(DroughtMapError::RasterFormat {
            message: format!(
                "Decoded {} samples for a {}x{} raster",
                samples.len(),
                width,
                height
            ),
        });
    }

    let samples_per_pixel = samples.len() / pixels;
    if samples_per_pixel > 1 {
        debug!(
            samples_per_pixel = samples_per_pixel,
            "Multi-sample raster, using the first band"
        );
    }

    let band: Vec<f32> = if samples_per_pixel == 1 {
        samples
    } else {
        samples.into_iter().step_by(samples_per_pixel).collect()
    };

    Array2::from_shape_vec((height, width), band).map_err(|e| DroughtMapError::RasterFormat {
        message: format!("Failed to shape raster: {}", e),
    })
}

#[cfg(not(feature = "netcdf"))]
fn load_netcdf_raster(path: &Path, _options: &LoadOptions) -> Result<RasterGrid> {
    Err(DroughtMapError::RasterFormat {
        message: format!(
            "{} is a NetCDF file but droughtmap was built without the `netcdf` feature",
            path.display()
        ),
    })
}

#[cfg(feature = "netcdf")]
fn load_netcdf_raster(path: &Path, options: &LoadOptions) -> Result<RasterGrid> {
    netcdf_source::load_netcdf(path, options)
}

#[cfg(feature = "netcdf")]
mod netcdf_source {
    //! NetCDF grids: a 2-D (lat, lon) or 3-D (time, lat, lon) variable.

    use ndarray::{Array, Axis, IxDyn};
    use netcdf::Variable as NetCDFVariable;
    use std::path::Path;
    use tracing::info;

    use super::LoadOptions;
    use crate::error::{DroughtMapError, Result};
    use crate::logging::log_raster_load_stats;
    use crate::raster::{BoundingBox, RasterGrid};

    const LAT_NAMES: [&str; 2] = ["lat", "latitude"];
    const LON_NAMES: [&str; 2] = ["lon", "longitude"];

    pub fn load_netcdf(path: &Path, options: &LoadOptions) -> Result<RasterGrid> {
        if !path.exists() {
            return Err(DroughtMapError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("File not found: {}", path.display()),
            )));
        }

        let file = netcdf::open(path)?;
        info!("Opened NetCDF file: {}", path.display());

        let lat = read_coordinate(&file, &LAT_NAMES)?;
        let lon = read_coordinate(&file, &LON_NAMES)?;

        let var_name = match &options.variable {
            Some(name) => name.clone(),
            None => find_grid_variable(&file)?,
        };
        let var = file
            .variable(&var_name)
            .ok_or_else(|| DroughtMapError::InvalidParameter {
                param: "variable".to_string(),
                message: format!("Variable not found: {}", var_name),
            })?;

        let shape: Vec<usize> = var.dimensions().iter().map(|d| d.len()).collect();
        let values: Vec<f32> = var.get_values::<f32, _>(&[] as &[netcdf::Extent])?;
        let array = Array::from_shape_vec(IxDyn(&shape), values).map_err(|e| {
            DroughtMapError::RasterFormat {
                message: format!("Failed to shape {}: {}", var_name, e),
            }
        })?;

        let mut grid = match shape.len() {
            2 => array,
            3 => {
                if options.time_index >= shape[0] {
                    return Err(DroughtMapError::InvalidParameter {
                        param: "time_index".to_string(),
                        message: format!(
                            "time index {} out of range (0..{})",
                            options.time_index, shape[0]
                        ),
                    });
                }
                array.index_axis(Axis(0), options.time_index).to_owned()
            }
            n => {
                return Err(DroughtMapError::RasterFormat {
                    message: format!("{} has {} dimensions; expected 2 or 3", var_name, n),
                })
            }
        }
        .into_dimensionality::<ndarray::Ix2>()
        .map_err(|e| DroughtMapError::RasterFormat {
            message: format!("Failed to reshape {}: {}", var_name, e),
        })?;

        let (rows, cols) = grid.dim();
        if rows != lat.len() || cols != lon.len() {
            return Err(DroughtMapError::RasterFormat {
                message: format!(
                    "{} is {}x{} but coordinates are {}x{}",
                    var_name,
                    rows,
                    cols,
                    lat.len(),
                    lon.len()
                ),
            });
        }

        // Rows must run north to south
        if lat.len() > 1 && lat[0] < lat[lat.len() - 1] {
            grid.invert_axis(ndarray::Axis(0));
        }

        let bounds = match options.bounds {
            Some(bounds) => bounds,
            None => coordinate_bounds(&lat, &lon)?,
        };
        let nodata = options.nodata.or_else(|| fill_value(&var));

        let raster = RasterGrid::new(
            path.file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| var_name.clone()),
            grid,
            nodata,
            bounds,
            Some("EPSG:4326".to_string()),
        );
        log_raster_load_stats(&path.display().to_string(), &raster);
        Ok(raster)
    }

    fn read_coordinate(file: &netcdf::File, names: &[&str]) -> Result<Vec<f64>> {
        for name in names {
            if let Some(var) = file.variable(name) {
                return Ok(var.get_values::<f64, _>(&[] as &[netcdf::Extent])?);
            }
        }
        Err(DroughtMapError::RasterFormat {
            message: format!("No coordinate variable named any of {:?}", names),
        })
    }

    /// The first variable whose trailing dimensions are (lat, lon).
    fn find_grid_variable(file: &netcdf::File) -> Result<String> {
        file.variables()
            .find(|var| {
                let dims: Vec<String> = var.dimensions().iter().map(|d| d.name()).collect();
                dims.len() >= 2
                    && LAT_NAMES.contains(&dims[dims.len() - 2].as_str())
                    && LON_NAMES.contains(&dims[dims.len() - 1].as_str())
            })
            .map(|var| var.name())
            .ok_or_else(|| DroughtMapError::RasterFormat {
                message: "No variable with (lat, lon) dimensions".to_string(),
            })
    }

    fn fill_value(var: &NetCDFVariable) -> Option<f64> {
        use netcdf::AttributeValue as NcAttributeValue;

        ["_FillValue", "missing_value"].iter().find_map(|name| {
            let attr = var.attribute(name)?;
            match attr.value().ok()? {
                NcAttributeValue::Float(v) => Some(v as f64),
                NcAttributeValue::Double(v) => Some(v),
                NcAttributeValue::Short(v) => Some(v as f64),
                NcAttributeValue::Int(v) => Some(v as f64),
                _ => None,
            }
        })
    }

    /// Cell-center coordinates to outer edges.
    fn coordinate_bounds(lat: &[f64], lon: &[f64]) -> Result<BoundingBox> {
        let half_step = |coords: &[f64]| {
            if coords.len() > 1 {
                ((coords[coords.len() - 1] - coords[0]) / (coords.len() - 1) as f64).abs() / 2.0
            } else {
                0.5
            }
        };
        let (lat_min, lat_max) = min_max(lat);
        let (lon_min, lon_max) = min_max(lon);
        let (dlat, dlon) = (half_step(lat), half_step(lon));

        BoundingBox::new(
            (lat_min - dlat).max(-90.0),
            lon_min - dlon,
            (lat_max + dlat).min(90.0),
            lon_max + dlon,
        )
    }

    fn min_max(values: &[f64]) -> (f64, f64) {
        values
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
                (lo.min(v), hi.max(v))
            })
    }
}
