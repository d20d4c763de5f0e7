//! Self-contained HTML map document.
//!
//! The page loads Leaflet from a CDN, draws the basemap, places the overlay
//! bitmap at the raster's bounding box and fits the view to it. Everything
//! dynamic is passed to the script as one JSON object, so user-supplied text
//! only ever reaches the page HTML-escaped or JSON-encoded.

use geojson::GeoJson;
use serde_json::json;

use super::escape_html;
use super::legend::Legend;
use crate::error::Result;
use crate::raster::BoundingBox;
use crate::severity::QualityWarning;

/// Inputs of [`render_document`].
#[derive(Debug, Clone)]
pub struct DocumentOptions<'a> {
    pub title: &'a str,
    pub bounds: BoundingBox,
    pub zoom: u8,
    pub opacity: f32,
    pub basemap_url: &'a str,
    pub basemap_attribution: &'a str,
    /// URL of the overlay PNG, relative to the document
    pub overlay_url: &'a str,
    pub legend: Option<&'a Legend>,
    /// Outlines drawn above the overlay
    pub vector: Option<&'a GeoJson>,
    /// Download link for the footprint GeoJSON
    pub footprint_url: Option<&'a str>,
    /// Show the raster upload form (served mode only)
    pub upload_url: Option<&'a str>,
    pub warnings: &'a [QualityWarning],
}

const TEMPLATE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="UTF-8" />
  <meta name="viewport" content="width=device-width, initial-scale=1.0" />
  <title>{{TITLE}}</title>
  <link
    rel="stylesheet"
    href="https://unpkg.com/leaflet@1.9.4/dist/leaflet.css"
    integrity="sha256-p4NxAoJBhIIN+hmNHrzRCf9tD/miZyoHS5obTRR9BMY="
    crossorigin=""
  />
  <style>
    html, body { height: 100%; margin: 0; padding: 0; font-family: sans-serif; }
    #map { height: 100%; width: 100%; }
    .leaflet-image-layer { image-rendering: pixelated; }
    .panel {
      position: absolute;
      z-index: 1000;
      background: white;
      padding: 8px;
      border-radius: 4px;
      box-shadow: 0 1px 4px rgba(0,0,0,0.3);
      font-size: 13px;
    }
    #controls { top: 12px; left: 50px; }
    #legend { bottom: 24px; right: 12px; }
    #warnings { top: 12px; right: 12px; max-width: 320px; color: #8a4b00; }
    .legend h4 { margin: 0 0 6px 0; }
    .legend-row { line-height: 20px; }
    .swatch { display: inline-block; width: 14px; height: 14px; margin-right: 6px; vertical-align: middle; }
    .colorbar { height: 10px; margin-top: 6px; }
    .colorbar-labels { display: flex; justify-content: space-between; }
  </style>
</head>
<body>
  <div id="controls" class="panel">
    <label for="opacitySlider">Opacity: </label>
    <input type="range" id="opacitySlider" min="0" max="1" step="0.05" value="{{OPACITY}}" />
{{CONTROLS}}  </div>
{{LEGEND}}{{WARNINGS}}  <div id="map"></div>

  <script
    src="https://unpkg.com/leaflet@1.9.4/dist/leaflet.js"
    integrity="sha256-20nQCchB9co0qIjJZRGuk2/Z9VM+kNiyxNV1lvTlZBo="
    crossorigin=""
  ></script>
  <script>
    const config = {{CONFIG}};

    const map = L.map('map').setView(config.center, config.zoom);

    L.tileLayer(config.basemap.url, {
      maxZoom: 19,
      attribution: config.basemap.attribution
    }).addTo(map);

    const overlay = L.imageOverlay(config.overlay.url, config.overlay.bounds, {
      opacity: config.overlay.opacity
    }).addTo(map);

    if (config.vector) {
      L.geoJSON(config.vector, {
        style: { color: '#222', weight: 1, fill: false }
      }).addTo(map);
    }

    map.fitBounds(config.overlay.bounds);

    document.getElementById('opacitySlider').addEventListener('input', (e) => {
      overlay.setOpacity(parseFloat(e.target.value));
    });

    const uploadForm = document.getElementById('uploadForm');
    if (uploadForm && config.upload) {
      uploadForm.addEventListener('submit', async (e) => {
        e.preventDefault();
        const file = document.getElementById('uploadFile').files[0];
        if (!file) { return; }
        const status = document.getElementById('uploadStatus');
        status.textContent = 'Uploading...';
        const res = await fetch(config.upload, { method: 'POST', body: file });
        if (res.ok) {
          window.location.reload();
        } else {
          const body = await res.json().catch(() => ({ error: res.statusText }));
          status.textContent = body.error;
        }
      });
    }
  </script>
</body>
</html>
"#;

/// Make JSON safe to embed inside a `<script>` element.
pub fn escape_script_json(json: &str) -> String {
    json.replace("</", "<\\/").replace("<!--", "<\\!--")
}

/// Render the map document.
pub fn render_document(options: &DocumentOptions<'_>) -> Result<String> {
    let (lat, lon) = options.bounds.center();
    let vector = match options.vector {
        Some(geojson) => serde_json::to_value(geojson)?,
        None => serde_json::Value::Null,
    };

    let config = json!({
        "center": [lat, lon],
        "zoom": options.zoom,
        "basemap": {
            "url": options.basemap_url,
            "attribution": options.basemap_attribution,
        },
        "overlay": {
            "url": options.overlay_url,
            "bounds": options.bounds.leaflet_bounds(),
            "opacity": options.opacity,
        },
        "vector": vector,
        "upload": options.upload_url,
    });
    let config = escape_script_json(&serde_json::to_string(&config)?);

    let mut controls = String::new();
    if let Some(url) = options.footprint_url {
        controls.push_str(&format!(
            "    <br />\n    <a href=\"{}\" download>Download footprint (GeoJSON)</a>\n",
            escape_html(url)
        ));
    }
    if options.upload_url.is_some() {
        controls.push_str(
            "    <form id=\"uploadForm\">\n      <input type=\"file\" id=\"uploadFile\" accept=\".tif,.tiff\" />\n      <button type=\"submit\">Upload GeoTIFF</button>\n      <span id=\"uploadStatus\"></span>\n    </form>\n",
        );
    }

    let legend = match options.legend {
        Some(legend) => format!("  <div id=\"legend\" class=\"panel\">\n{}  </div>\n", legend.to_html()),
        None => String::new(),
    };

    let warnings = if options.warnings.is_empty() {
        String::new()
    } else {
        let items: String = options
            .warnings
            .iter()
            .map(|w| format!("      <li>{}</li>\n", escape_html(&w.to_string())))
            .collect();
        format!(
            "  <div id=\"warnings\" class=\"panel\">\n    <strong>Data quality</strong>\n    <ul>\n{}    </ul>\n  </div>\n",
            items
        )
    };

    Ok(TEMPLATE
        .replace("{{TITLE}}", &escape_html(options.title))
        .replace("{{OPACITY}}", &options.opacity.to_string())
        .replace("{{CONTROLS}}", &controls)
        .replace("{{LEGEND}}", &legend)
        .replace("{{WARNINGS}}", &warnings)
        .replace("{{CONFIG}}", &config))
}
