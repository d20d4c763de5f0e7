//! Writing a scene to disk as a self-contained map.
//!
//! The output directory receives `map.html`, `overlay.png`, `summary.json`
//! and, when enabled, `footprint.geojson`. The document references the
//! other files by relative URL, so the directory can be moved or served as
//! static files.

use geojson::GeoJson;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::info;

use crate::config::RenderConfig;
use crate::error::Result;
use crate::logging::{log_operation_end, log_operation_start};
use crate::render::{render_document, DocumentOptions};
use crate::state::Scene;

pub const MAP_FILE: &str = "map.html";
pub const OVERLAY_FILE: &str = "overlay.png";
pub const SUMMARY_FILE: &str = "summary.json";
pub const FOOTPRINT_FILE: &str = "footprint.geojson";

/// Paths of the files written by [`export_map`].
#[derive(Debug, Clone, PartialEq)]
pub struct ExportedFiles {
    pub map: PathBuf,
    pub overlay: PathBuf,
    pub summary: PathBuf,
    pub footprint: Option<PathBuf>,
}

pub fn export_map(
    scene: &Scene,
    render: &RenderConfig,
    vector: Option<&GeoJson>,
    out_dir: &Path,
) -> Result<ExportedFiles> {
    let start = Instant::now();
    log_operation_start("export_map", Some(&out_dir.display().to_string()));

    fs::create_dir_all(out_dir)?;

    let overlay = out_dir.join(OVERLAY_FILE);
    fs::write(&overlay, scene.overlay_png(render.mode, &render.colormap)?)?;

    let footprint = if render.footprint {
        let path = out_dir.join(FOOTPRINT_FILE);
        let collection = scene.footprint(render.footprint_group)?;
        info!(
            features = collection.features.len(),
            group = ?render.footprint_group,
            "Footprint generated"
        );
        fs::write(&path, serde_json::to_string(&collection)?)?;
        Some(path)
    } else {
        None
    };

    let summary = out_dir.join(SUMMARY_FILE);
    fs::write(&summary, serde_json::to_string_pretty(&scene.report())?)?;

    let legend = scene.legend(render.mode, &render.colormap)?;
    let document = render_document(&DocumentOptions {
        title: &render.title,
        bounds: scene.raster.bounds,
        zoom: render.zoom,
        opacity: render.opacity,
        basemap_url: &render.basemap_url,
        basemap_attribution: &render.basemap_attribution,
        overlay_url: OVERLAY_FILE,
        legend: render.show_legend.then_some(&legend),
        vector,
        footprint_url: footprint.as_ref().map(|_| FOOTPRINT_FILE),
        upload_url: None,
        warnings: &scene.warnings,
    })?;

    let map = out_dir.join(MAP_FILE);
    fs::write(&map, document)?;

    log_operation_end("export_map", start, scene.warnings.len());
    Ok(ExportedFiles {
        map,
        overlay,
        summary,
        footprint,
    })
}
