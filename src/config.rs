//! Configuration management for droughtmap.
//!
//! This module handles the layered configuration system with the following precedence:
//! 1. Command-line arguments (highest priority)
//! 2. Environment variables
//! 3. JSON config file
//! 4. Default values (lowest priority)

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::colormaps::get_colormap;
use crate::error::{DroughtMapError, Result};
use crate::raster::BoundingBox;
use crate::render::OverlayMode;
use crate::severity::{BoundaryRule, QualityThresholds};
use crate::vectorize::GroupBy;

/// Command-line arguments for droughtmap
#[derive(Parser, Debug)]
#[command(name = "droughtmap")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Write a self-contained map document and its overlay to a directory
    Render(RenderArgs),
    /// Serve the map and an upload form over HTTP
    Serve(ServeArgs),
}

/// Options shared by both commands
#[derive(clap::Args, Debug, Clone)]
pub struct CommonArgs {
    /// Path to the SPI raster (GeoTIFF, or NetCDF with the `netcdf` feature)
    pub raster: PathBuf,

    /// Optional vector overlay (GeoJSON) drawn as outlines
    #[arg(long, env = "DROUGHTMAP_VECTOR")]
    pub vector: Option<PathBuf>,

    /// Colormap for the continuous overlay (append _r to reverse)
    #[arg(long, env = "DROUGHTMAP_COLORMAP")]
    pub colormap: Option<String>,

    /// Overlay style
    #[arg(long, value_enum, env = "DROUGHTMAP_MODE")]
    pub mode: Option<OverlayMode>,

    /// Overlay opacity between 0 and 1
    #[arg(long, env = "DROUGHTMAP_OPACITY")]
    pub opacity: Option<f32>,

    /// No-data sentinel, replacing the one declared by the file
    #[arg(long, env = "DROUGHTMAP_NODATA", allow_hyphen_values = true)]
    pub nodata: Option<f64>,

    /// Bounding box "south,west,north,east", replacing the file's georeference
    #[arg(long, env = "DROUGHTMAP_BBOX", value_parser = parse_bbox, allow_hyphen_values = true)]
    pub bbox: Option<BoundingBox>,

    /// Path to JSON configuration file
    #[arg(short, long, env = "DROUGHTMAP_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "DROUGHTMAP_LOG_LEVEL")]
    pub log_level: Option<String>,
}

#[derive(clap::Args, Debug, Clone)]
pub struct RenderArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Directory the map, overlay and summary are written to
    #[arg(short, long, env = "DROUGHTMAP_OUT_DIR", default_value = "droughtmap-out")]
    pub out_dir: PathBuf,

    /// Also write a GeoJSON footprint of the classified regions
    #[arg(long)]
    pub footprint: bool,

    /// How footprint cells are grouped into polygons
    #[arg(long, value_enum, env = "DROUGHTMAP_GROUP")]
    pub group: Option<GroupBy>,
}

#[derive(clap::Args, Debug, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Host address to bind to
    #[arg(short = 'H', long, env = "DROUGHTMAP_HOST")]
    pub host: Option<String>,

    /// Port to listen on
    #[arg(short, long, env = "DROUGHTMAP_PORT")]
    pub port: Option<u16>,

    /// Number of worker threads
    #[arg(short, long, env = "DROUGHTMAP_WORKERS")]
    pub workers: Option<usize>,
}

fn parse_bbox(value: &str) -> std::result::Result<BoundingBox, String> {
    value.parse::<BoundingBox>().map_err(|e| e.to_string())
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Number of worker threads (None = number of CPU cores)
    #[serde(default)]
    pub workers: Option<usize>,

    /// Largest accepted upload body in bytes
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,

    /// Number of loaded scenes kept by the read-through cache
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,
}

/// Raster loading and analysis configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DataConfig {
    /// No-data sentinel override
    #[serde(default)]
    pub nodata: Option<f64>,

    /// Bounding box override, required for rasters without georeferencing
    #[serde(default)]
    pub bounds: Option<BoundingBox>,

    /// Variable name for NetCDF input (default: first (lat, lon) variable)
    #[serde(default)]
    pub variable: Option<String>,

    /// Time slice for 3-D NetCDF variables
    #[serde(default)]
    pub time_index: usize,

    /// Which band owns the -2.00 boundary
    #[serde(default)]
    pub boundary_rule: BoundaryRule,

    /// Thresholds for quality warnings
    #[serde(default)]
    pub quality: QualityThresholds,
}

/// Map document and overlay configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderConfig {
    /// Continuous colormap name
    #[serde(default = "default_colormap")]
    pub colormap: String,

    /// Continuous colormap or drought palette
    #[serde(default)]
    pub mode: OverlayMode,

    /// Overlay opacity
    #[serde(default = "default_opacity")]
    pub opacity: f32,

    /// Initial zoom level
    #[serde(default = "default_zoom")]
    pub zoom: u8,

    /// Basemap tile URL template
    #[serde(default = "default_basemap_url")]
    pub basemap_url: String,

    /// Attribution shown for the basemap
    #[serde(default = "default_basemap_attribution")]
    pub basemap_attribution: String,

    /// Page title
    #[serde(default = "default_title")]
    pub title: String,

    /// Draw the legend panel
    #[serde(default = "default_true")]
    pub show_legend: bool,

    /// Produce a footprint GeoJSON alongside the map
    #[serde(default)]
    pub footprint: bool,

    /// Grouping used for the footprint
    #[serde(default)]
    pub footprint_group: GroupBy,

    /// Optional vector overlay file
    #[serde(default)]
    pub vector: Option<PathBuf>,
}

/// Complete configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Data configuration
    #[serde(default)]
    pub data: DataConfig,

    /// Render configuration
    #[serde(default)]
    pub render: RenderConfig,

    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// What the command line asked for, besides configuration.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Render { out_dir: PathBuf },
    Serve,
}

/// The raster to open and what to do with it.
#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    pub raster: PathBuf,
    pub action: Action,
}

impl Config {
    /// Load configuration from all sources with proper precedence
    pub fn load() -> Result<(Self, Invocation)> {
        Self::from_args(Args::parse())
    }

    /// Build configuration from already-parsed arguments
    pub fn from_args(args: Args) -> Result<(Self, Invocation)> {
        let common = match &args.command {
            Command::Render(render) => &render.common,
            Command::Serve(serve) => &serve.common,
        };

        // Start with defaults
        let mut config = Config::default();

        // Load from JSON file if provided
        if let Some(config_path) = &common.config {
            let json_config = Self::load_from_file(config_path)?;
            config.merge(json_config);
        }

        config.apply_common(common);
        let raster = common.raster.clone();

        let action = match args.command {
            Command::Render(render) => {
                if render.footprint {
                    config.render.footprint = true;
                }
                if let Some(group) = render.group {
                    config.render.footprint_group = group;
                }
                Action::Render {
                    out_dir: render.out_dir,
                }
            }
            Command::Serve(serve) => {
                if let Some(host) = serve.host {
                    config.server.host = host;
                }
                if let Some(port) = serve.port {
                    config.server.port = port;
                }
                if serve.workers.is_some() {
                    config.server.workers = serve.workers;
                }
                Action::Serve
            }
        };

        Ok((config, Invocation { raster, action }))
    }

    /// Override with command-line arguments that were given
    fn apply_common(&mut self, common: &CommonArgs) {
        if common.vector.is_some() {
            self.render.vector = common.vector.clone();
        }
        if let Some(colormap) = &common.colormap {
            self.render.colormap = colormap.clone();
        }
        if let Some(mode) = common.mode {
            self.render.mode = mode;
        }
        if let Some(opacity) = common.opacity {
            self.render.opacity = opacity;
        }
        if common.nodata.is_some() {
            self.data.nodata = common.nodata;
        }
        if common.bbox.is_some() {
            self.data.bounds = common.bbox;
        }
        if let Some(level) = &common.log_level {
            self.log_level = level.clone();
        }
    }

    /// Load configuration from a JSON file
    fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Merge another config into this one (other takes precedence)
    fn merge(&mut self, other: Config) {
        self.server.host = other.server.host;
        self.server.port = other.server.port;
        if other.server.workers.is_some() {
            self.server.workers = other.server.workers;
        }
        self.server.max_upload_bytes = other.server.max_upload_bytes;
        self.server.cache_capacity = other.server.cache_capacity;
        self.data = other.data;
        self.render = other.render;
        self.log_level = other.log_level;
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        // Validate server host (must be a valid IP or hostname)
        if self.server.host.is_empty() {
            return Err(DroughtMapError::Config {
                message: "Server host cannot be empty".to_string(),
            });
        }

        // Validate port (0 is not a valid port for users)
        if self.server.port == 0 {
            return Err(DroughtMapError::Config {
                message: "Server port cannot be 0".to_string(),
            });
        }

        if self.server.workers == Some(0) {
            return Err(DroughtMapError::Config {
                message: "Worker count must be at least 1".to_string(),
            });
        }

        if self.server.max_upload_bytes == 0 || self.server.cache_capacity == 0 {
            return Err(DroughtMapError::Config {
                message: "max_upload_bytes and cache_capacity must be positive".to_string(),
            });
        }

        // Validate log level
        match self.log_level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => {
                return Err(DroughtMapError::Config {
                    message: format!(
                        "Invalid log level: {}. Must be one of: trace, debug, info, warn, error",
                        self.log_level
                    ),
                });
            }
        }

        get_colormap(&self.render.colormap).map_err(|e| DroughtMapError::Config {
            message: e.to_string(),
        })?;

        if !(0.0..=1.0).contains(&self.render.opacity) {
            return Err(DroughtMapError::Config {
                message: format!(
                    "Invalid opacity: {}. Must be between 0 and 1",
                    self.render.opacity
                ),
            });
        }

        if self.render.zoom > 20 {
            return Err(DroughtMapError::Config {
                message: format!("Invalid zoom: {}. Must be at most 20", self.render.zoom),
            });
        }

        let quality = &self.data.quality;
        if !(0.0..=1.0).contains(&quality.max_nodata_fraction) || quality.sentinel_magnitude <= 0.0
        {
            return Err(DroughtMapError::Config {
                message: "Quality thresholds out of range".to_string(),
            });
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            data: DataConfig::default(),
            render: RenderConfig::default(),
            log_level: default_log_level(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            workers: None,
            max_upload_bytes: default_max_upload_bytes(),
            cache_capacity: default_cache_capacity(),
        }
    }
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            colormap: default_colormap(),
            mode: OverlayMode::default(),
            opacity: default_opacity(),
            zoom: default_zoom(),
            basemap_url: default_basemap_url(),
            basemap_attribution: default_basemap_attribution(),
            title: default_title(),
            show_legend: true,
            footprint: false,
            footprint_group: GroupBy::default(),
            vector: None,
        }
    }
}

// Default value functions for serde
fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_max_upload_bytes() -> usize {
    64 * 1024 * 1024
}

fn default_cache_capacity() -> usize {
    8
}

fn default_colormap() -> String {
    "rdylbu".to_string()
}

fn default_opacity() -> f32 {
    0.5
}

fn default_zoom() -> u8 {
    6
}

fn default_basemap_url() -> String {
    "https://{s}.tile.openstreetmap.org/{z}/{x}/{y}.png".to_string()
}

fn default_basemap_attribution() -> String {
    "&copy; OpenStreetMap contributors".to_string()
}

fn default_title() -> String {
    "Drought severity (SPI)".to_string()
}

fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.render.colormap, "rdylbu");
        assert_eq!(config.render.opacity, 0.5);
        assert_eq!(config.render.mode, OverlayMode::Continuous);
        assert_eq!(config.data.boundary_rule, BoundaryRule::UpperInclusive);
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_config_merge() {
        let mut config1 = Config::default();
        let mut config2 = Config::default();

        config2.server.port = 9000;
        config2.server.workers = Some(4);
        config2.render.colormap = "brbg".to_string();

        config1.merge(config2);

        assert_eq!(config1.server.port, 9000);
        assert_eq!(config1.server.workers, Some(4));
        assert_eq!(config1.render.colormap, "brbg");
    }

    #[test]
    fn test_config_validation() {
        // Valid config should pass
        let config = Config::default();
        assert!(config.validate().is_ok());

        // Test invalid host
        let mut config = Config::default();
        config.server.host = "".to_string();
        assert!(config.validate().is_err());

        // Test invalid port
        let mut config = Config::default();
        config.server.port = 0;
        assert!(config.validate().is_err());

        // Test invalid log level
        let mut config = Config::default();
        config.log_level = "invalid".to_string();
        assert!(config.validate().is_err());

        // Test unknown colormap
        let mut config = Config::default();
        config.render.colormap = "jet".to_string();
        assert!(config.validate().is_err());

        // Test opacity out of range
        let mut config = Config::default();
        config.render.opacity = 1.5;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.data.quality.max_nodata_fraction = 2.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: Config =
            serde_json::from_str(r#"{"render": {"mode": "categorical"}, "data": {"nodata": -9999}}"#)
                .unwrap();
        assert_eq!(config.render.mode, OverlayMode::Categorical);
        assert_eq!(config.render.colormap, "rdylbu");
        assert_eq!(config.data.nodata, Some(-9999.0));
        assert_eq!(config.server.port, 8000);
    }

    #[test]
    fn test_cli_overrides_file() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("config.json");
        std::fs::write(
            &config_path,
            r#"{"server": {"port": 9100}, "render": {"colormap": "viridis", "opacity": 0.8}}"#,
        )
        .unwrap();

        let args = Args::parse_from([
            "droughtmap",
            "serve",
            "spi.tif",
            "--config",
            config_path.to_str().unwrap(),
            "--colormap",
            "brbg",
            "--bbox",
            "40,-100,42,-96",
            "-p",
            "9200",
        ]);
        let (config, invocation) = Config::from_args(args).unwrap();

        assert_eq!(invocation.raster, PathBuf::from("spi.tif"));
        assert_eq!(invocation.action, Action::Serve);
        assert_eq!(config.server.port, 9200);
        assert_eq!(config.render.colormap, "brbg");
        // From the file, not overridden
        assert_eq!(config.render.opacity, 0.8);
        assert_eq!(config.data.bounds.map(|b| b.west), Some(-100.0));
    }

    #[test]
    fn test_render_command() {
        let args = Args::parse_from([
            "droughtmap",
            "render",
            "spi.tif",
            "--out-dir",
            "maps",
            "--footprint",
            "--mode",
            "categorical",
            "--nodata",
            "-9999",
        ]);
        let (config, invocation) = Config::from_args(args).unwrap();

        assert_eq!(
            invocation.action,
            Action::Render {
                out_dir: PathBuf::from("maps")
            }
        );
        assert!(config.render.footprint);
        assert_eq!(config.render.mode, OverlayMode::Categorical);
        assert_eq!(config.data.nodata, Some(-9999.0));
    }
}
