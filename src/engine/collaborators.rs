//! Trait boundaries for the components treated as external
//! collaborators (bathymetry/coastline readers, a polygon rasterizer, and
//! the ship-dynamics solver), plus one dependency-light default
//! implementation of each so the crate runs end to end without a native
//! GIS toolchain. Swap in a GDAL-backed or DLL-backed implementation
//! behind the same trait for a production deployment.

use geo::{Coord, Intersects, LineString, Polygon, Rect};

use crate::engine::geo::{BoundingBox, GeoCoordinate, GeoIndexMapper, GridCoordinate};
use crate::engine::weather::Weather;
use crate::error::RouterError;

/// A windowed read of a bathymetry raster: the depth matrix plus the pixel
/// window actually returned (which may differ slightly from the request
/// once clamped to the raster extent).
#[derive(Debug, Clone)]
pub struct BathymetryWindow {
    pub bounds: BoundingBox,
    pub rows: usize,
    pub cols: usize,
    /// Row-major depths in meters; negative values are below sea level.
    pub depths: Vec<f64>,
}

impl BathymetryWindow {
    pub fn depth_at(&self, row: usize, col: usize) -> f64 {
        self.depths[row * self.cols + col]
    }
}

/// Delivers a clipped depth grid and its geotransform. Reading from an
/// on-disk GeoTIFF is out of scope here; callers inject a reader that does
/// that behind this trait.
pub trait BathymetrySource {
    fn window(&self, roi: &BoundingBox, margin_px: (u32, u32)) -> Result<BathymetryWindow, RouterError>;
}

/// A land polygon clipped to a bounding box. `level == 1` marks continental
/// land, mirroring the GSHHG dataset's own attribute.
#[derive(Debug, Clone)]
pub struct LandPolygon {
    pub level: i32,
    pub polygon: Polygon<f64>,
}

/// Delivers land polygons clipped to a bounding box.
pub trait CoastlineSource {
    fn polygons(&self, roi: &BoundingBox) -> Result<Vec<LandPolygon>, RouterError>;
}

/// Burns polygon interiors into a dense `rows*cols` row-major mask with
/// "all-touched" semantics: a cell counts as land if its footprint
/// intersects any land polygon, not only if its center is enclosed.
pub trait PolygonRasterizer {
    fn rasterize(&self, polygons: &[LandPolygon], roi: &BoundingBox, rows: usize, cols: usize) -> Vec<bool>;
}

/// In-memory bathymetry source holding a pre-loaded pixel grid. Suitable
/// for tests and for callers that already fetched GEBCO-style data through
/// their own pipeline.
#[derive(Debug, Clone)]
pub struct InMemoryBathymetry {
    bounds: BoundingBox,
    rows: usize,
    cols: usize,
    /// Row-major depths in meters, native pixel resolution.
    depths: Vec<f64>,
}

impl InMemoryBathymetry {
    pub fn new(bounds: BoundingBox, rows: usize, cols: usize, depths: Vec<f64>) -> Self {
        assert_eq!(depths.len(), rows * cols, "depths length must equal rows*cols");
        Self { bounds, rows, cols, depths }
    }
}

impl BathymetrySource for InMemoryBathymetry {
    fn window(&self, roi: &BoundingBox, margin_px: (u32, u32)) -> Result<BathymetryWindow, RouterError> {
        if self.rows == 0 || self.cols == 0 {
            return Err(RouterError::BathymetryLoadFailed("bathymetry raster is empty".into()));
        }
        let mapper = GeoIndexMapper::new(self.bounds, self.rows, self.cols);

        let top_left = mapper.geo_to_grid(&GeoCoordinate::new(roi.max_lat, roi.min_lon));
        let bottom_right = mapper.geo_to_grid(&GeoCoordinate::new(roi.min_lat, roi.max_lon));

        let max_row = self.rows as i64 - 1;
        let max_col = self.cols as i64 - 1;
        let row0 = (top_left.row - margin_px.0 as i64).clamp(0, max_row);
        let row1 = (bottom_right.row + margin_px.0 as i64).clamp(0, max_row);
        let col0 = (top_left.col - margin_px.1 as i64).clamp(0, max_col);
        let col1 = (bottom_right.col + margin_px.1 as i64).clamp(0, max_col);

        let out_rows = (row1 - row0 + 1) as usize;
        let out_cols = (col1 - col0 + 1) as usize;
        let mut depths = Vec::with_capacity(out_rows * out_cols);
        for r in row0..=row1 {
            for c in col0..=col1 {
                depths.push(self.depths[r as usize * self.cols + c as usize]);
            }
        }

        let nw = mapper.grid_to_geo(&GridCoordinate::new(row0, col0));
        let se = mapper.grid_to_geo(&GridCoordinate::new(row1, col1));
        let bounds = BoundingBox::new(
            se.latitude - mapper.cell_size_lat / 2.0,
            nw.latitude + mapper.cell_size_lat / 2.0,
            nw.longitude - mapper.cell_size_lon / 2.0,
            se.longitude + mapper.cell_size_lon / 2.0,
        );

        Ok(BathymetryWindow { bounds, rows: out_rows, cols: out_cols, depths })
    }
}

/// In-memory coastline source holding a pre-loaded polygon set.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCoastline {
    polygons: Vec<LandPolygon>,
}

impl InMemoryCoastline {
    pub fn new(polygons: Vec<LandPolygon>) -> Self {
        Self { polygons }
    }
}

impl CoastlineSource for InMemoryCoastline {
    fn polygons(&self, roi: &BoundingBox) -> Result<Vec<LandPolygon>, RouterError> {
        let roi_rect = bbox_to_rect(roi);
        Ok(self
            .polygons
            .iter()
            .filter(|p| p.level == 1 && p.polygon.intersects(&roi_rect))
            .cloned()
            .collect())
    }
}

fn bbox_to_rect(b: &BoundingBox) -> Rect<f64> {
    Rect::new(Coord { x: b.min_lon, y: b.min_lat }, Coord { x: b.max_lon, y: b.max_lat })
}

/// All-touched scanline rasterizer built on `geo`'s ring/segment
/// intersection primitives rather than a native GDAL rasterizer. A
/// GDAL-backed implementation can be swapped in behind
/// [`PolygonRasterizer`] without touching [`crate::engine::grid::GridBuilder`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ScanlinePolygonRasterizer;

impl PolygonRasterizer for ScanlinePolygonRasterizer {
    fn rasterize(&self, polygons: &[LandPolygon], roi: &BoundingBox, rows: usize, cols: usize) -> Vec<bool> {
        let mut mask = vec![false; rows * cols];
        if polygons.is_empty() || rows == 0 || cols == 0 {
            return mask;
        }
        let cell_h = roi.height_deg() / rows as f64;
        let cell_w = roi.width_deg() / cols as f64;

        for row in 0..rows {
            let cell_max_lat = roi.max_lat - row as f64 * cell_h;
            let cell_min_lat = cell_max_lat - cell_h;
            for col in 0..cols {
                let cell_min_lon = roi.min_lon + col as f64 * cell_w;
                let cell_max_lon = cell_min_lon + cell_w;
                let cell_rect = Rect::new(
                    Coord { x: cell_min_lon, y: cell_min_lat },
                    Coord { x: cell_max_lon, y: cell_max_lat },
                );
                let idx = row * cols + col;
                if polygons.iter().any(|p| p.polygon.intersects(&cell_rect)) {
                    mask[idx] = true;
                }
            }
        }
        mask
    }
}

/// Constructs a simple rectangular land polygon, handy for tests and for
/// callers seeding [`InMemoryCoastline`] from a coarse dataset.
pub fn rectangular_land_polygon(min_lat: f64, max_lat: f64, min_lon: f64, max_lon: f64) -> LandPolygon {
    let ring = LineString::from(vec![
        (min_lon, min_lat),
        (max_lon, min_lat),
        (max_lon, max_lat),
        (min_lon, max_lat),
        (min_lon, min_lat),
    ]);
    LandPolygon { level: 1, polygon: Polygon::new(ring, vec![]) }
}

/// Ship-speed / heading / draft / weather inputs to the ship-dynamics solver.
#[derive(Debug, Clone, Copy)]
pub struct ShipDynamicsInput {
    pub ship_speed_mps: f64,
    pub draft_m: f64,
    pub trim_m: f64,
    pub heading_deg: f64,
    pub weather: Weather,
}

/// Fuel burn rate estimate from the ship-dynamics solver.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShipDynamicsOutput {
    pub fuel_rate_kgh: f64,
}

/// `(ShipInput) -> ShipOutput`, callable from a single thread at a time
/// unless the implementation declares reentrancy. This isolates
/// platform-specific loading (e.g. a native DLL) from the core routing
/// logic.
pub trait ShipDynamicsSolver {
    fn estimate(&self, input: &ShipDynamicsInput) -> Result<ShipDynamicsOutput, RouterError>;
}

/// Default ship-dynamics estimator: a calm-water base curve (cubic in
/// speed, linear in draft/trim) plus independent wind/wave resistance
/// penalty terms and a current-assist discount, combined the way
/// `engine::physics::PhysicsModel` once composed wind/current vectors
/// against a polar lookup, adapted here to a fuel-rate output rather than a
/// speed/heading pair (the contract here is a fuel rate in `kg/h`, not a
/// velocity vector).
#[derive(Debug, Clone, Copy)]
pub struct PolynomialShipDynamics {
    pub base_coeff: f64,
    pub draft_coeff: f64,
    pub trim_coeff: f64,
    pub wind_coeff: f64,
    pub wave_coeff: f64,
    pub current_coeff: f64,
}

impl Default for PolynomialShipDynamics {
    fn default() -> Self {
        Self {
            base_coeff: 0.85,
            draft_coeff: 0.02,
            trim_coeff: 0.01,
            wind_coeff: 0.015,
            wave_coeff: 2.0,
            current_coeff: 0.08,
        }
    }
}

impl ShipDynamicsSolver for PolynomialShipDynamics {
    fn estimate(&self, input: &ShipDynamicsInput) -> Result<ShipDynamicsOutput, RouterError> {
        if !input.ship_speed_mps.is_finite() || input.ship_speed_mps <= 0.0 {
            return Err(RouterError::ShipDynamicsFailed(format!(
                "ship speed must be positive and finite, got {}",
                input.ship_speed_mps
            )));
        }

        let calm_water = self.base_coeff
            * input.ship_speed_mps.powi(3)
            * (1.0 + input.draft_m.max(0.0) * self.draft_coeff + input.trim_m.abs() * self.trim_coeff);

        // Headwind costs more than a following wind: the relative angle
        // between heading and the direction wind blows *from* determines
        // the penalty multiplier, peaking at a dead headwind.
        let relative_wind_rad = (input.weather.wind_dir_deg - input.heading_deg).to_radians();
        let wind_penalty =
            self.wind_coeff * input.weather.wind_spd_mps.powi(2) * (1.0 + 0.5 * (1.0 + relative_wind_rad.cos()));

        let wave_penalty = self.wave_coeff * input.weather.wave_height_m.powi(2);

        // A following current reduces the resistance the engine must
        // overcome; a foul current increases it.
        let relative_current_rad = (input.weather.current_dir_deg - input.heading_deg).to_radians();
        let current_assist = self.current_coeff * input.weather.current_spd_mps * relative_current_rad.cos();

        let fuel_rate_kgh = (calm_water + wind_penalty + wave_penalty - current_assist).max(0.0);
        Ok(ShipDynamicsOutput { fuel_rate_kgh })
    }
}
