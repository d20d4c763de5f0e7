//! Polygon footprint of a classified grid.
//!
//! Cells are grouped into 4-connected regions of equal key (severity
//! category, exact value, or plain validity). Each region becomes one GeoJSON
//! Polygon whose exterior ring runs counter-clockwise and whose holes run
//! clockwise, in the raster's own coordinates.
//!
//! Rings are traced from cell edges: every side of a region cell that does
//! not face another cell of the same region is a boundary edge, oriented so
//! the region lies on its left. Linking those edges end to start yields
//! closed rings. Where two cells of one region touch only at a corner the
//! walk crosses that corner, so an enclosed hole touching the outline there
//! comes out as its own ring and no ring visits a vertex twice.

use geojson::{Feature, FeatureCollection, Geometry, JsonObject, Value};
use ndarray::{Array2, ArrayView2};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::{HashMap, VecDeque};
use std::str::FromStr;

use crate::error::{DroughtMapError, Result};
use crate::raster::RasterGrid;
use crate::severity::{check_shape, DroughtCategory};

/// How cells are grouped into regions.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum GroupBy {
    /// One region per contiguous run of a severity category
    #[default]
    Category,
    /// One region per contiguous run of an exact value
    Value,
    /// The outline of all valid cells
    Validity,
}

impl FromStr for GroupBy {
    type Err = DroughtMapError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "category" => Ok(GroupBy::Category),
            "value" => Ok(GroupBy::Value),
            "validity" => Ok(GroupBy::Validity),
            _ => Err(DroughtMapError::InvalidParameter {
                param: "group".to_string(),
                message: format!(
                    "Unknown grouping: {}. Must be one of: category, value, validity",
                    s
                ),
            }),
        }
    }
}

/// Corner of the grid as (x, y) with y pointing north, i.e. (col, -row).
type Vertex = (i64, i64);

#[derive(Debug, Clone, Copy)]
struct Edge {
    from: Vertex,
    to: Vertex,
}

impl Edge {
    fn direction(&self) -> (i64, i64) {
        (self.to.0 - self.from.0, self.to.1 - self.from.1)
    }
}

/// One connected region of equal key.
struct Region {
    cells: Vec<(usize, usize)>,
}

/// Build the footprint of a classified grid.
///
/// `categories` and `valid` must match the raster's shape. No-data cells are
/// never part of a region.
pub fn footprint(
    raster: &RasterGrid,
    categories: ArrayView2<'_, DroughtCategory>,
    valid: ArrayView2<'_, bool>,
    group: GroupBy,
) -> Result<FeatureCollection> {
    check_shape(raster.shape(), categories.dim())?;
    check_shape(raster.shape(), valid.dim())?;

    let keys = Array2::from_shape_fn(raster.shape(), |(row, col)| {
        if !valid[[row, col]] || categories[[row, col]] == DroughtCategory::NoData {
            return None;
        }
        Some(match group {
            GroupBy::Category => categories[[row, col]] as u32,
            GroupBy::Value => raster.data[[row, col]].to_bits(),
            GroupBy::Validity => 0,
        })
    });

    let (labels, regions) = label_regions(&keys);

    let features = regions
        .iter()
        .enumerate()
        .map(|(label, region)| {
            let rings = trace_rings(&labels, label, region);
            let polygon = assemble_polygon(rings)
                .into_iter()
                .map(|ring| {
                    ring.into_iter()
                        .map(|(x, y)| {
                            let (gx, gy) = raster.corner_to_geo(x as usize, (-y) as usize);
                            vec![gx, gy]
                        })
                        .collect()
                })
                .collect();

            Feature {
                bbox: None,
                geometry: Some(Geometry::new(Value::Polygon(polygon))),
                id: None,
                properties: Some(region_properties(raster, &categories, region, group)),
                foreign_members: None,
            }
        })
        .collect();

    Ok(FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    })
}

/// Flood-fill 4-connected regions of equal key.
fn label_regions(keys: &Array2<Option<u32>>) -> (Array2<usize>, Vec<Region>) {
    let (rows, cols) = keys.dim();
    let mut labels = Array2::from_elem((rows, cols), usize::MAX);
    let mut regions = Vec::new();
    let mut queue = VecDeque::new();

    for row in 0..rows {
        for col in 0..cols {
            let key = match keys[[row, col]] {
                Some(key) if labels[[row, col]] == usize::MAX => key,
                _ => continue,
            };

            let label = regions.len();
            let mut cells = Vec::new();
            labels[[row, col]] = label;
            queue.push_back((row, col));

            while let Some((r, c)) = queue.pop_front() {
                cells.push((r, c));
                let neighbors = [
                    (r.wrapping_sub(1), c),
                    (r + 1, c),
                    (r, c.wrapping_sub(1)),
                    (r, c + 1),
                ];
                for (nr, nc) in neighbors {
                    if nr < rows
                        && nc < cols
                        && labels[[nr, nc]] == usize::MAX
                        && keys[[nr, nc]] == Some(key)
                    {
                        labels[[nr, nc]] = label;
                        queue.push_back((nr, nc));
                    }
                }
            }

            regions.push(Region { cells });
        }
    }

    (labels, regions)
}

/// Closed rings (first vertex not repeated) around one region.
fn trace_rings(labels: &Array2<usize>, label: usize, region: &Region) -> Vec<Vec<Vertex>> {
    let (rows, cols) = labels.dim();
    let same = |row: Option<usize>, col: Option<usize>| match (row, col) {
        (Some(r), Some(c)) if r < rows && c < cols => labels[[r, c]] == label,
        _ => false,
    };

    let mut edges = Vec::new();
    for &(row, col) in &region.cells {
        let (x, y) = (col as i64, -(row as i64));
        // Counter-clockwise around the cell: south, east, north, west sides
        if !same(Some(row + 1), Some(col)) {
            edges.push(Edge {
                from: (x, y - 1),
                to: (x + 1, y - 1),
            });
        }
        if !same(Some(row), Some(col + 1)) {
            edges.push(Edge {
                from: (x + 1, y - 1),
                to: (x + 1, y),
            });
        }
        if !same(row.checked_sub(1), Some(col)) {
            edges.push(Edge {
                from: (x + 1, y),
                to: (x, y),
            });
        }
        if !same(Some(row), col.checked_sub(1)) {
            edges.push(Edge {
                from: (x, y),
                to: (x, y - 1),
            });
        }
    }

    let mut outgoing: HashMap<Vertex, Vec<usize>> = HashMap::new();
    for (index, edge) in edges.iter().enumerate() {
        outgoing.entry(edge.from).or_default().push(index);
    }

    let mut used = vec![false; edges.len()];
    let mut rings = Vec::new();

    for first in 0..edges.len() {
        if used[first] {
            continue;
        }
        used[first] = true;

        let start = edges[first].from;
        let mut ring = vec![start];
        let mut current = first;

        loop {
            let edge = edges[current];
            if edge.to == start {
                break;
            }
            ring.push(edge.to);

            let candidates = outgoing.get(&edge.to).map(Vec::as_slice).unwrap_or(&[]);
            match next_edge(&edges, candidates, &used, edge.direction()) {
                Some(next) => {
                    used[next] = true;
                    current = next;
                }
                None => break,
            }
        }

        rings.push(drop_collinear(ring));
    }

    rings
}

/// Pick the unused outgoing edge, preferring a right turn.
fn next_edge(
    edges: &[Edge],
    candidates: &[usize],
    used: &[bool],
    (dx, dy): (i64, i64),
) -> Option<usize> {
    let preference = [(dy, -dx), (dx, dy), (-dy, dx)];
    preference.iter().find_map(|&wanted| {
        candidates
            .iter()
            .copied()
            .find(|&i| !used[i] && edges[i].direction() == wanted)
    })
}

fn drop_collinear(ring: Vec<Vertex>) -> Vec<Vertex> {
    let n = ring.len();
    if n < 4 {
        return ring;
    }
    (0..n)
        .filter(|&i| {
            let prev = ring[(i + n - 1) % n];
            let here = ring[i];
            let next = ring[(i + 1) % n];
            let incoming = (here.0 - prev.0, here.1 - prev.1);
            let outgoing = (next.0 - here.0, next.1 - here.1);
            // Axis-aligned unit steps: collinear iff the cross product is zero
            incoming.0 * outgoing.1 - incoming.1 * outgoing.0 != 0
        })
        .map(|i| ring[i])
        .collect()
}

/// Twice the signed area; positive for counter-clockwise rings.
fn signed_area2(ring: &[Vertex]) -> i64 {
    let n = ring.len();
    (0..n)
        .map(|i| {
            let (x0, y0) = ring[i];
            let (x1, y1) = ring[(i + 1) % n];
            x0 * y1 - x1 * y0
        })
        .sum()
}

fn extent(ring: &[Vertex]) -> (i64, i64, i64, i64) {
    ring.iter().fold(
        (i64::MAX, i64::MAX, i64::MIN, i64::MIN),
        |(x0, y0, x1, y1), &(x, y)| (x0.min(x), y0.min(y), x1.max(x), y1.max(y)),
    )
}

/// Order rings as exterior first, then holes, each explicitly closed.
fn assemble_polygon(rings: Vec<Vec<Vertex>>) -> Vec<Vec<Vertex>> {
    let (mut exteriors, holes): (Vec<_>, Vec<_>) =
        rings.into_iter().partition(|ring| signed_area2(ring) > 0);

    // A 4-connected region has exactly one outer boundary; keep the largest
    // should tracing ever produce more.
    exteriors.sort_by_key(|ring| std::cmp::Reverse(signed_area2(ring)));
    let mut polygon: Vec<Vec<Vertex>> = exteriors.into_iter().take(1).collect();

    if let Some(outer) = polygon.first() {
        let (ox0, oy0, ox1, oy1) = extent(outer);
        polygon.extend(holes.into_iter().filter(|hole| {
            let (hx0, hy0, hx1, hy1) = extent(hole);
            hx0 >= ox0 && hy0 >= oy0 && hx1 <= ox1 && hy1 <= oy1
        }));
    }

    for ring in &mut polygon {
        if let Some(&first) = ring.first() {
            ring.push(first);
        }
    }
    polygon
}

fn region_properties(
    raster: &RasterGrid,
    categories: &ArrayView2<'_, DroughtCategory>,
    region: &Region,
    group: GroupBy,
) -> JsonObject {
    let mut properties = JsonObject::new();
    let &(row, col) = &region.cells[0];
    let sum: f64 = region
        .cells
        .iter()
        .map(|&(r, c)| raster.data[[r, c]] as f64)
        .sum();
    let mean = sum / region.cells.len() as f64;

    match group {
        GroupBy::Category => {
            let category = categories[[row, col]];
            properties.insert("category".to_string(), json!(category));
            properties.insert("label".to_string(), json!(category.label()));
            properties.insert("value".to_string(), json!(mean));
        }
        GroupBy::Value => {
            let value = raster.data[[row, col]];
            properties.insert("category".to_string(), json!(categories[[row, col]]));
            properties.insert("value".to_string(), json!(value));
        }
        GroupBy::Validity => {
            properties.insert("value".to_string(), json!(mean));
        }
    }
    properties.insert("cell_count".to_string(), json!(region.cells.len()));
    properties
}
