//! Navigable grid construction: fuses a downsampled bathymetry
//! block-average with a rasterized land mask into a dense `CellType`
//! matrix.

use serde::{Deserialize, Serialize};

use crate::engine::collaborators::{BathymetrySource, CoastlineSource, PolygonRasterizer};
use crate::engine::geo::{BoundingBox, GeoCoordinate, GeoIndexMapper, GridCoordinate};
use crate::error::RouterError;

/// 15 arc-seconds at the Earth's mean radius, used to translate a target
/// cell size in km into a source-pixel block size.
pub const KM_PER_PIXEL_LAT: f64 = 0.4625;

/// Grid dimensions are clamped to this many cells per axis.
pub const MAX_GRID_DIMENSION: usize = 9000;

/// A cell's classification. `Unknown` is a transient build-time sentinel;
/// no cell of a completed [`NavigableGrid`] carries it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CellType {
    Unknown,
    Land,
    Shallow,
    Navigable,
}

/// Dense, immutable navigable grid: a `rows x cols` classification matrix
/// plus the [`GeoIndexMapper`] that produced it, so build-time and
/// query-time geotransforms cannot drift apart.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NavigableGrid {
    pub mapper: GeoIndexMapper,
    cells: Vec<CellType>,
}

impl NavigableGrid {
    pub fn rows(&self) -> usize {
        self.mapper.rows
    }

    pub fn cols(&self) -> usize {
        self.mapper.cols
    }

    /// Out-of-bounds positions are treated as `Land` (non-navigable)
    /// rather than panicking.
    pub fn cell_type(&self, g: &GridCoordinate) -> CellType {
        if !self.mapper.in_bounds(g) {
            return CellType::Land;
        }
        self.cells[g.row as usize * self.mapper.cols + g.col as usize]
    }

    pub fn is_navigable(&self, g: &GridCoordinate) -> bool {
        self.cell_type(g) == CellType::Navigable
    }
}

/// Builds a [`NavigableGrid`] from a waypoint list and target resolution,
/// fusing a bathymetry collaborator's depth grid with a coastline
/// collaborator's land polygons (rasterized by a third collaborator).
pub struct GridBuilder<'a> {
    pub bathymetry: &'a dyn BathymetrySource,
    pub coastline: &'a dyn CoastlineSource,
    pub rasterizer: &'a dyn PolygonRasterizer,
}

impl<'a> GridBuilder<'a> {
    pub fn new(
        bathymetry: &'a dyn BathymetrySource,
        coastline: &'a dyn CoastlineSource,
        rasterizer: &'a dyn PolygonRasterizer,
    ) -> Self {
        Self { bathymetry, coastline, rasterizer }
    }

    /// Runs the 8-step grid-build algorithm.
    pub fn build(
        &self,
        waypoints: &[GeoCoordinate],
        target_cell_km: f64,
        margin_cells: u32,
    ) -> Result<NavigableGrid, RouterError> {
        if waypoints.is_empty() {
            return Err(RouterError::GridBuildFailed("waypoint list is empty".into()));
        }

        // Step 1: base ROI.
        let base_roi = BoundingBox::from_points(waypoints)?;

        // Step 2: block size, longitude corrected by cos(avg lat).
        let avg_lat = (base_roi.min_lat + base_roi.max_lat) / 2.0;
        let block_lat = (target_cell_km / KM_PER_PIXEL_LAT).round().max(1.0) as usize;
        let lon_correction = avg_lat.to_radians().cos().max(1e-6);
        let block_lon = (target_cell_km / (KM_PER_PIXEL_LAT * lon_correction)).round().max(1.0) as usize;

        // Step 3: pixel margin, applied via the bathymetry collaborator's
        // own clamping (it clamps to raster extent internally).
        let margin_px = (block_lat.max(block_lon) as u32 * margin_cells, block_lat.max(block_lon) as u32 * margin_cells);

        // Step 4: bathymetry extraction for the (conceptually expanded) ROI.
        let window = self
            .bathymetry
            .window(&base_roi, margin_px)
            .map_err(|e| RouterError::BathymetryLoadFailed(e.to_string()))?;

        if window.rows < block_lat || window.cols < block_lon {
            return Err(RouterError::GridBuildFailed(
                "upsampling implied: source window smaller than one output cell".into(),
            ));
        }

        // Step 5: block-average downsample, snapping silently to
        // block-aligned dimensions.
        let mut rows = window.rows / block_lat;
        let mut cols = window.cols / block_lon;
        if rows == 0 || cols == 0 {
            return Err(RouterError::GridBuildFailed("downsampled grid has zero dimension".into()));
        }
        rows = rows.min(MAX_GRID_DIMENSION);
        cols = cols.min(MAX_GRID_DIMENSION);

        let used_rows = rows * block_lat;
        let used_cols = cols * block_lon;
        let lat_span_used = window.bounds.height_deg() * used_rows as f64 / window.rows as f64;
        let lon_span_used = window.bounds.width_deg() * used_cols as f64 / window.cols as f64;
        let expanded_roi = BoundingBox::new(
            window.bounds.max_lat - lat_span_used,
            window.bounds.max_lat,
            window.bounds.min_lon,
            window.bounds.min_lon + lon_span_used,
        );

        let mut depths = vec![0.0f64; rows * cols];
        for r in 0..rows {
            for c in 0..cols {
                let mut sum = 0.0;
                let mut count = 0usize;
                for br in 0..block_lat {
                    for bc in 0..block_lon {
                        sum += window.depth_at(r * block_lat + br, c * block_lon + bc);
                        count += 1;
                    }
                }
                depths[r * cols + c] = sum / count as f64;
            }
        }

        // Step 6: rasterize land polygons at grid resolution.
        let polygons = self
            .coastline
            .polygons(&expanded_roi)
            .map_err(|e| RouterError::CoastlineLoadFailed(e.to_string()))?;
        let land_mask = self.rasterizer.rasterize(&polygons, &expanded_roi, rows, cols);

        // Step 7: classify depth, then overwrite with LAND wherever the
        // rasterized mask is set.
        let mut cells = vec![CellType::Unknown; rows * cols];
        for idx in 0..cells.len() {
            cells[idx] = classify_depth(depths[idx]);
            if land_mask[idx] {
                cells[idx] = CellType::Land;
            }
        }

        let mapper = GeoIndexMapper::new(expanded_roi, rows, cols);
        Ok(NavigableGrid { mapper, cells })
    }
}

fn classify_depth(depth: f64) -> CellType {
    if depth >= 0.0 {
        CellType::Land
    } else if depth > -15.0 {
        CellType::Shallow
    } else {
        CellType::Navigable
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::collaborators::{rectangular_land_polygon, InMemoryBathymetry, InMemoryCoastline, ScanlinePolygonRasterizer};

    fn deep_ocean_bathymetry(bounds: BoundingBox, rows: usize, cols: usize) -> InMemoryBathymetry {
        InMemoryBathymetry::new(bounds, rows, cols, vec![-4000.0; rows * cols])
    }

    #[test]
    fn build_classifies_every_cell_no_unknown_remains() {
        let bounds = BoundingBox::new(30.0, 40.0, 120.0, 130.0);
        let bathy = deep_ocean_bathymetry(bounds, 2000, 2000);
        let coastline = InMemoryCoastline::default();
        let rasterizer = ScanlinePolygonRasterizer;
        let builder = GridBuilder::new(&bathy, &coastline, &rasterizer);

        let waypoints = vec![GeoCoordinate::new(35.0, 125.0), GeoCoordinate::new(36.0, 126.0)];
        let grid = builder.build(&waypoints, 5.0, 2).unwrap();

        assert!(grid.rows() > 0 && grid.cols() > 0);
        for r in 0..grid.rows() {
            for c in 0..grid.cols() {
                assert_ne!(grid.cell_type(&GridCoordinate::new(r as i64, c as i64)), CellType::Unknown);
            }
        }
    }

    #[test]
    fn land_polygon_overrides_deep_bathymetry() {
        let bounds = BoundingBox::new(30.0, 40.0, 120.0, 130.0);
        let bathy = deep_ocean_bathymetry(bounds, 2000, 2000);
        let land = rectangular_land_polygon(34.0, 36.0, 124.0, 126.0);
        let coastline = InMemoryCoastline::new(vec![land]);
        let rasterizer = ScanlinePolygonRasterizer;
        let builder = GridBuilder::new(&bathy, &coastline, &rasterizer);

        let waypoints = vec![GeoCoordinate::new(35.0, 125.0), GeoCoordinate::new(36.0, 126.0)];
        let grid = builder.build(&waypoints, 5.0, 2).unwrap();

        let mid = grid.mapper.geo_to_grid(&GeoCoordinate::new(35.0, 125.0));
        assert_eq!(grid.cell_type(&mid), CellType::Land);
    }

    #[test]
    fn empty_waypoints_fails_build() {
        let bounds = BoundingBox::new(30.0, 40.0, 120.0, 130.0);
        let bathy = deep_ocean_bathymetry(bounds, 100, 100);
        let coastline = InMemoryCoastline::default();
        let rasterizer = ScanlinePolygonRasterizer;
        let builder = GridBuilder::new(&bathy, &coastline, &rasterizer);
        assert!(builder.build(&[], 5.0, 2).is_err());
    }

    #[test]
    fn upsampling_request_fails() {
        let bounds = BoundingBox::new(30.0, 40.0, 120.0, 130.0);
        // Only 3x3 source pixels available: far too coarse for a 5km cell.
        let bathy = deep_ocean_bathymetry(bounds, 3, 3);
        let coastline = InMemoryCoastline::default();
        let rasterizer = ScanlinePolygonRasterizer;
        let builder = GridBuilder::new(&bathy, &coastline, &rasterizer);
        let waypoints = vec![GeoCoordinate::new(35.0, 125.0), GeoCoordinate::new(36.0, 126.0)];
        assert!(builder.build(&waypoints, 5.0, 2).is_err());
    }
}
