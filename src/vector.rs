//! Optional vector overlay (boundaries, basins) drawn above the raster.
//!
//! The overlay is decoration: any problem with it is logged and the map is
//! rendered without it.

use geojson::GeoJson;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tracing::{info, warn};

use crate::error::{DroughtMapError, Result};

/// Read a GeoJSON file.
pub fn read_geojson(path: &Path) -> Result<GeoJson> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "geojson" | "json" => {}
        "shp" | "shx" | "dbf" | "gpkg" | "kml" => {
            return Err(DroughtMapError::InvalidParameter {
                param: "vector".to_string(),
                message: format!(
                    "{} is not GeoJSON; convert it first (e.g. `ogr2ogr -f GeoJSON out.geojson {}`)",
                    path.display(),
                    path.display()
                ),
            })
        }
        other => {
            return Err(DroughtMapError::InvalidParameter {
                param: "vector".to_string(),
                message: format!("Unsupported vector file extension: {:?}", other),
            })
        }
    }

    let file = File::open(path)?;
    let geojson = GeoJson::from_reader(BufReader::new(file))?;
    Ok(geojson)
}

/// Load the vector overlay, or `None` (with a warning) if it cannot be used.
pub fn load_vector_overlay(path: &Path) -> Option<GeoJson> {
    match read_geojson(path) {
        Ok(geojson) => {
            info!(path = %path.display(), features = feature_count(&geojson), "Loaded vector overlay");
            Some(geojson)
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Skipping vector overlay");
            None
        }
    }
}

fn feature_count(geojson: &GeoJson) -> usize {
    match geojson {
        GeoJson::FeatureCollection(collection) => collection.features.len(),
        GeoJson::Feature(_) | GeoJson::Geometry(_) => 1,
    }
}
