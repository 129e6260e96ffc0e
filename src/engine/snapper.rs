//! Maps an arbitrary geographic waypoint to the nearest navigable cell
//! within a bounded radius, via uniform-cost search over 8-connected grid
//! neighbors.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashSet};

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

use crate::engine::geo::{great_circle_distance_km, GeoCoordinate, GridCoordinate};
use crate::engine::grid::{CellType, NavigableGrid};

const NEIGHBOR_OFFSETS: [(i64, i64); 8] =
    [(-1, -1), (-1, 0), (-1, 1), (0, -1), (0, 1), (1, -1), (1, 0), (1, 1)];

/// Tri-state outcome of snapping one waypoint.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum SnappingStatus {
    AlreadyNavigable,
    Snapped,
    Failed,
}

/// The result of snapping one waypoint: the original input, the outcome,
/// and (when successful) the navigable cell's geographic center and the
/// great-circle distance moved.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SnappingInfo {
    pub original: GeoCoordinate,
    pub status: SnappingStatus,
    pub snapped: Option<GeoCoordinate>,
    pub distance_km: f64,
}

impl SnappingInfo {
    pub fn failed(original: GeoCoordinate) -> Self {
        Self { original, status: SnappingStatus::Failed, snapped: None, distance_km: f64::INFINITY }
    }
}

/// Stateless snapper; holds no data of its own beyond the search radius
/// policy: a pure algorithm over a
/// `NavigableGrid`.
#[derive(Debug, Clone, Copy, Default)]
pub struct WaypointSnapper;

impl WaypointSnapper {
    pub fn new() -> Self {
        Self
    }

    /// Runs the bounded uniform-cost search described above. Tie-breaking
    /// among equally-distant candidates is intentionally unspecified.
    pub fn snap(&self, grid: &NavigableGrid, input: &GeoCoordinate, max_search_radius_km: f64) -> SnappingInfo {
        let clamped = input.clamped();
        let start = grid.mapper.geo_to_grid(&clamped);

        if grid.cell_type(&start) == CellType::Navigable {
            return SnappingInfo {
                original: *input,
                status: SnappingStatus::AlreadyNavigable,
                snapped: Some(*input),
                distance_km: 0.0,
            };
        }

        let mut visited = HashSet::new();
        let mut heap = BinaryHeap::new();
        visited.insert(start);
        heap.push(Reverse((OrderedFloat(0.0), start)));

        while let Some(Reverse((OrderedFloat(dist), pos))) = heap.pop() {
            if grid.cell_type(&pos) == CellType::Navigable {
                let center = grid.mapper.grid_to_geo(&pos);
                let distance_km = great_circle_distance_km(input, &center);
                return SnappingInfo {
                    original: *input,
                    status: SnappingStatus::Snapped,
                    snapped: Some(center),
                    distance_km,
                };
            }
            let _ = dist;

            for (dr, dc) in NEIGHBOR_OFFSETS {
                let neighbor = GridCoordinate::new(pos.row + dr, pos.col + dc);
                if !grid.mapper.in_bounds(&neighbor) || visited.contains(&neighbor) {
                    continue;
                }
                visited.insert(neighbor);
                let center = grid.mapper.grid_to_geo(&neighbor);
                let d = great_circle_distance_km(input, &center);
                if d > max_search_radius_km {
                    continue;
                }
                heap.push(Reverse((OrderedFloat(d), neighbor)));
            }
        }

        SnappingInfo::failed(*input)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::collaborators::{InMemoryBathymetry, InMemoryCoastline, ScanlinePolygonRasterizer};
    use crate::engine::geo::BoundingBox;
    use crate::engine::grid::GridBuilder;

    fn grid_with_land_strip() -> NavigableGrid {
        let bounds = BoundingBox::new(30.0, 40.0, 120.0, 130.0);
        let mut depths = vec![-4000.0; 200 * 200];
        // Carve a land strip through the middle columns of the raster.
        for r in 0..200 {
            for c in 90..110 {
                depths[r * 200 + c] = 50.0;
            }
        }
        let bathy = InMemoryBathymetry::new(bounds, 200, 200, depths);
        let coastline = InMemoryCoastline::default();
        let rasterizer = ScanlinePolygonRasterizer;
        let builder = GridBuilder::new(&bathy, &coastline, &rasterizer);
        let waypoints = vec![GeoCoordinate::new(31.0, 121.0), GeoCoordinate::new(39.0, 129.0)];
        builder.build(&waypoints, 5.0, 1).unwrap()
    }

    #[test]
    fn already_navigable_is_idempotent_with_zero_distance() {
        let grid = grid_with_land_strip();
        let snapper = WaypointSnapper::new();
        let point = GeoCoordinate::new(35.0, 121.0);
        let info = snapper.snap(&grid, &point, 50.0);
        assert_eq!(info.status, SnappingStatus::AlreadyNavigable);
        assert_eq!(info.distance_km, 0.0);
    }

    #[test]
    fn land_point_snaps_to_nearby_navigable_cell() {
        let grid = grid_with_land_strip();
        let snapper = WaypointSnapper::new();
        // Land strip spans columns ~90..110; pick a point well inside it.
        let center = grid.mapper.grid_to_geo(&GridCoordinate::new(100, 100));
        let info = snapper.snap(&grid, &center, 50.0);
        assert_eq!(info.status, SnappingStatus::Snapped);
        assert!(info.snapped.is_some());
    }

    #[test]
    fn zero_radius_on_land_fails() {
        let grid = grid_with_land_strip();
        let snapper = WaypointSnapper::new();
        let center = grid.mapper.grid_to_geo(&GridCoordinate::new(100, 100));
        let info = snapper.snap(&grid, &center, 0.0);
        assert_eq!(info.status, SnappingStatus::Failed);
    }
}
