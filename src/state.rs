//! Application state management for droughtmap.
//!
//! A [`Scene`] holds one raster together with everything derived from it:
//! the classified grid, the normalized grid, the per-category summary and
//! the quality warnings. Scenes are immutable and shared as `Arc<Scene>`.
//! [`AppState`] is what the HTTP handlers see: configuration, the scene
//! cache and the scene currently on display.

use chrono::{DateTime, Utc};
use geojson::{FeatureCollection, GeoJson};
use ndarray::Array2;
use parking_lot::RwLock;
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

use crate::cache::{CacheKey, SceneCache};
use crate::colormaps::{get_colormap, DroughtPalette};
use crate::config::{Config, DataConfig};
use crate::data_loader::{load_geotiff_bytes, load_raster, LoadOptions};
use crate::error::Result;
use crate::raster::{BoundingBox, RasterGrid};
use crate::render::{build_legend, encode_png, render_overlay, Legend, OverlayMode};
use crate::severity::quality::log_warnings;
use crate::severity::{
    assess, assess_georeference, classify_with_rule, normalize, BoundaryRule, ClassificationSummary,
    DroughtCategory, NormalizedGrid, QualityWarning, ValueRange,
};
use crate::vectorize::{footprint, GroupBy};

/// A raster and all products derived from it.
#[derive(Debug)]
pub struct Scene {
    pub raster: RasterGrid,
    pub categories: Array2<DroughtCategory>,
    pub normalized: NormalizedGrid,
    pub summary: ClassificationSummary,
    pub warnings: Vec<QualityWarning>,
    /// Rule the categories were classified with
    pub boundary_rule: BoundaryRule,
    pub loaded_at: DateTime<Utc>,
}

/// Value and classification of the cell under a location.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PointSample {
    pub lat: f64,
    pub lon: f64,
    pub row: usize,
    pub col: usize,
    /// Raw value, `None` for no-data cells
    pub value: Option<f32>,
    pub normalized: Option<f32>,
    pub category: DroughtCategory,
    pub label: &'static str,
}

/// Serializable description of a scene, written as `summary.json` and
/// returned by `/summary`.
#[derive(Debug, Clone, Serialize)]
pub struct SceneReport {
    pub source: String,
    pub rows: usize,
    pub cols: usize,
    pub bounds: BoundingBox,
    pub crs: Option<String>,
    pub nodata: Option<f64>,
    pub range: Option<ValueRange>,
    pub degenerate: bool,
    pub drought_fraction: f64,
    pub classification: ClassificationSummary,
    pub warnings: Vec<QualityWarning>,
    pub loaded_at: String,
}

impl Scene {
    /// Classify, normalize and assess a raster.
    pub fn build(raster: RasterGrid, data: &DataConfig) -> Result<Self> {
        let start = Instant::now();
        let nodata = raster.nodata_policy();

        let categories = classify_with_rule(raster.view(), nodata, data.boundary_rule)?;
        let normalized = normalize(raster.view(), nodata)?;
        let summary = ClassificationSummary::from_categories(&categories);
        let mut warnings = assess(raster.view(), &normalized, &data.quality);
        warnings.extend(assess_georeference(&raster.bounds, raster.crs.as_deref()));
        log_warnings(&raster.source, &warnings);

        info!(
            source = %raster.source,
            valid_cells = summary.valid_cells,
            nodata_cells = summary.nodata_cells,
            drought_fraction = summary.drought_fraction(),
            warnings = warnings.len(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Scene built"
        );

        Ok(Self {
            raster,
            categories,
            normalized,
            summary,
            warnings,
            boundary_rule: data.boundary_rule,
            loaded_at: Utc::now(),
        })
    }

    /// Overlay bitmap encoded as PNG.
    pub fn overlay_png(&self, mode: OverlayMode, colormap: &str) -> Result<Vec<u8>> {
        let colormap = get_colormap(colormap)?;
        let img = render_overlay(
            &self.normalized,
            self.categories.view(),
            mode,
            colormap.as_ref(),
            &DroughtPalette::default(),
        )?;
        encode_png(&img)
    }

    pub fn legend(&self, mode: OverlayMode, colormap: &str) -> Result<Legend> {
        let colormap = get_colormap(colormap)?;
        Ok(build_legend(
            mode,
            &DroughtPalette::default(),
            colormap.as_ref(),
            self.normalized.range,
            self.boundary_rule,
        ))
    }

    pub fn footprint(&self, group: GroupBy) -> Result<FeatureCollection> {
        footprint(
            &self.raster,
            self.categories.view(),
            self.normalized.valid.view(),
            group,
        )
    }

    /// Look up the cell containing a location.
    pub fn point(&self, lat: f64, lon: f64) -> Result<PointSample> {
        let (row, col) = self.raster.cell_at(lat, lon)?;
        let category = self.categories[[row, col]];
        let normalized = self.normalized.get(row, col);
        let value = normalized.map(|_| self.raster.data[[row, col]]);

        Ok(PointSample {
            lat,
            lon,
            row,
            col,
            value,
            normalized,
            category,
            label: category.label(),
        })
    }

    pub fn report(&self) -> SceneReport {
        let (rows, cols) = self.raster.shape();
        SceneReport {
            source: self.raster.source.clone(),
            rows,
            cols,
            bounds: self.raster.bounds,
            crs: self.raster.crs.clone(),
            nodata: self.raster.nodata,
            range: self.normalized.range,
            degenerate: self.normalized.is_degenerate(),
            drought_fraction: self.summary.drought_fraction(),
            classification: self.summary.clone(),
            warnings: self.warnings.clone(),
            loaded_at: self
                .loaded_at
                .to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
        }
    }

    /// Approximate memory held by the scene's grids, in bytes.
    pub fn memory_bytes(&self) -> usize {
        let cells = self.categories.len();
        self.raster.memory_bytes()
            + cells * std::mem::size_of::<DroughtCategory>()
            + cells * (std::mem::size_of::<f32>() + std::mem::size_of::<bool>())
    }
}

/// Load a raster file into a scene through the cache.
pub fn load_scene_from_file(path: &Path, config: &Config, cache: &SceneCache) -> Result<Arc<Scene>> {
    let key = CacheKey::for_file(path)?;
    cache.get_or_load(key, || {
        let raster = load_raster(path, &LoadOptions::from_config(&config.data))?;
        Scene::build(raster, &config.data)
    })
}

/// Load uploaded GeoTIFF bytes into a scene through the cache.
pub fn load_scene_from_bytes(
    bytes: &[u8],
    source: &str,
    config: &Config,
    cache: &SceneCache,
) -> Result<Arc<Scene>> {
    cache.get_or_load(CacheKey::for_bytes(bytes), || {
        let raster = load_geotiff_bytes(bytes, source, &LoadOptions::from_config(&config.data))?;
        Scene::build(raster, &config.data)
    })
}

/// The main application state shared across all handlers
pub struct AppState {
    /// Configuration
    pub config: Config,
    /// Previously loaded scenes
    pub cache: SceneCache,
    /// Optional outlines drawn over every scene
    pub vector: Option<GeoJson>,
    current: RwLock<Arc<Scene>>,
}

impl AppState {
    /// Create a new AppState
    pub fn new(config: Config, scene: Arc<Scene>, cache: SceneCache, vector: Option<GeoJson>) -> Self {
        Self {
            config,
            cache,
            vector,
            current: RwLock::new(scene),
        }
    }

    /// Create a new AppState wrapped in an Arc for shared ownership
    pub fn new_shared(
        config: Config,
        scene: Arc<Scene>,
        cache: SceneCache,
        vector: Option<GeoJson>,
    ) -> Arc<Self> {
        Arc::new(Self::new(config, scene, cache, vector))
    }

    /// The scene currently on display.
    pub fn scene(&self) -> Arc<Scene> {
        self.current.read().clone()
    }

    /// Put a new scene on display.
    pub fn replace_scene(&self, scene: Arc<Scene>) {
        *self.current.write() = scene;
    }

    /// Load an upload and put it on display.
    pub fn load_upload(&self, bytes: &[u8]) -> Result<Arc<Scene>> {
        let scene = load_scene_from_bytes(bytes, "upload", &self.config, &self.cache)?;
        self.replace_scene(Arc::clone(&scene));
        Ok(scene)
    }
}
