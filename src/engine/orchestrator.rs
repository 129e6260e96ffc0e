//! The route orchestrator: builds one grid per request, snaps every
//! waypoint, runs A* pairwise per strategy, stitches segments, and
//! integrates per-point telemetry.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::engine::astar::{AStarEngine, PathSearchResult};
use crate::engine::collaborators::{BathymetrySource, CoastlineSource, PolygonRasterizer, ShipDynamicsSolver};
use crate::engine::geo::{GeoCoordinate, GridCoordinate};
use crate::engine::grid::{GridBuilder, NavigableGrid};
use crate::engine::snapper::{SnappingInfo, SnappingStatus, WaypointSnapper};
use crate::engine::strategy::{
    evaluate_fuel_edge, min_fuel_rate_kgh, DistanceStrategy, FuelStrategy, VoyageInfo, DEFAULT_MAX_ANGLE_DEGREES,
};
use crate::engine::weather::{Weather, WeatherStore};
use crate::error::RouterError;

/// Voyage-wide configuration. Every field carries a sensible default.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VoyageConfig {
    pub ship_speed_mps: f64,
    pub draft_m: f64,
    pub trim_m: f64,
    pub start_time_unix: i64,
    pub grid_cell_size_km: f64,
    pub grid_margin_cells: u32,
    pub max_snap_radius_km: f64,
    pub calculate_shortest: bool,
    pub calculate_optimized: bool,
}

impl Default for VoyageConfig {
    fn default() -> Self {
        Self {
            ship_speed_mps: 8.0,
            draft_m: 10.0,
            trim_m: 0.0,
            start_time_unix: 0,
            grid_cell_size_km: 5.0,
            grid_margin_cells: 20,
            max_snap_radius_km: 50.0,
            calculate_shortest: true,
            calculate_optimized: true,
        }
    }
}

/// Aggregate totals for one strategy's stitched route.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PathSummary {
    pub total_distance_km: f64,
    pub total_time_hours: f64,
    pub total_fuel_kg: f64,
    pub average_speed_mps: f64,
    pub average_fuel_rate_kgh: f64,
}

impl PathSummary {
    fn zero() -> Self {
        Self {
            total_distance_km: 0.0,
            total_time_hours: 0.0,
            total_fuel_kg: 0.0,
            average_speed_mps: 0.0,
            average_fuel_rate_kgh: 0.0,
        }
    }
}

/// One point along a stitched route: position, cumulative telemetry since
/// the voyage start, and the instantaneous rates/weather at that point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PathPointDetail {
    pub position: GeoCoordinate,
    pub cumulative_time_hours: f64,
    pub cumulative_distance_km: f64,
    pub cumulative_fuel_kg: f64,
    pub instantaneous_fuel_rate_kgh: f64,
    pub speed_mps: f64,
    pub heading_deg: f64,
    pub weather: Weather,
}

/// One strategy's outcome: whether it completed, the summary, and the
/// ordered per-point telemetry. On partial failure this still carries the
/// segments computed before the failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SinglePathResult {
    pub success: bool,
    pub error_message: Option<String>,
    pub summary: PathSummary,
    pub points: Vec<PathPointDetail>,
}

/// The full result of one `calculate_route` call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoyageResult {
    pub success: bool,
    pub error_message: Option<String>,
    pub snapping: Vec<SnappingInfo>,
    pub shortest: Option<SinglePathResult>,
    pub optimized: Option<SinglePathResult>,
}

impl VoyageResult {
    fn failed(error: RouterError, snapping: Vec<SnappingInfo>) -> Self {
        Self { success: false, error_message: Some(error.to_string()), snapping, shortest: None, optimized: None }
    }
}

struct RouterSources<'a, D: ShipDynamicsSolver + Sync> {
    bathymetry: &'a dyn BathymetrySource,
    coastline: &'a dyn CoastlineSource,
    rasterizer: &'a dyn PolygonRasterizer,
    ship_dynamics: &'a D,
    weather: WeatherStore,
}

/// Orchestrates one voyage's routing: grid build, snapping, per-strategy
/// A*, stitching, and telemetry integration. Owns its collaborator
/// references and loaded weather table for the lifetime of every
/// `calculate_route` call.
///
/// `new()` produces a router that has not yet loaded its collaborators;
/// calling `calculate_route` before `load_sources` returns
/// [`RouterError::NotInitialized`], keeping collaborator loading distinct
/// from routing.
pub struct ShipRouter<'a, D: ShipDynamicsSolver + Sync> {
    sources: Option<RouterSources<'a, D>>,
}

impl<'a, D: ShipDynamicsSolver + Sync> ShipRouter<'a, D> {
    pub fn new() -> Self {
        Self { sources: None }
    }

    pub fn with_sources(
        bathymetry: &'a dyn BathymetrySource,
        coastline: &'a dyn CoastlineSource,
        rasterizer: &'a dyn PolygonRasterizer,
        ship_dynamics: &'a D,
        weather: WeatherStore,
    ) -> Self {
        let mut router = Self::new();
        router.load_sources(bathymetry, coastline, rasterizer, ship_dynamics, weather);
        router
    }

    pub fn load_sources(
        &mut self,
        bathymetry: &'a dyn BathymetrySource,
        coastline: &'a dyn CoastlineSource,
        rasterizer: &'a dyn PolygonRasterizer,
        ship_dynamics: &'a D,
        weather: WeatherStore,
    ) {
        self.sources = Some(RouterSources { bathymetry, coastline, rasterizer, ship_dynamics, weather });
    }

    pub fn is_initialized(&self) -> bool {
        self.sources.is_some()
    }

    /// Runs the full routing pipeline for one set of waypoints. Never panics;
    /// every failure mode becomes a `VoyageResult` with `success = false`.
    pub fn calculate_route(&self, waypoints: &[GeoCoordinate], config: &VoyageConfig) -> VoyageResult {
        let sources = match &self.sources {
            Some(s) => s,
            None => return VoyageResult::failed(RouterError::NotInitialized, vec![]),
        };

        if waypoints.len() < 2 {
            return VoyageResult::failed(RouterError::TooFewWaypoints(waypoints.len()), vec![]);
        }

        let builder = GridBuilder::new(sources.bathymetry, sources.coastline, sources.rasterizer);
        let grid = match builder.build(waypoints, config.grid_cell_size_km, config.grid_margin_cells) {
            Ok(g) => g,
            Err(e) => return VoyageResult::failed(e, vec![]),
        };

        let snapper = WaypointSnapper::new();
        let snapping: Vec<SnappingInfo> =
            waypoints.iter().map(|w| snapper.snap(&grid, w, config.max_snap_radius_km)).collect();

        if let Some(failure) = snapping.iter().find(|s| s.status == SnappingStatus::Failed) {
            let error = RouterError::SnappingFailed {
                lat: failure.original.latitude,
                lon: failure.original.longitude,
                max_radius_km: config.max_snap_radius_km,
            };
            return VoyageResult { success: false, error_message: Some(error.to_string()), snapping, shortest: None, optimized: None };
        }

        let snapped_geo: Vec<GeoCoordinate> = snapping.iter().map(|s| s.snapped.expect("checked Failed above")).collect();
        let snapped_grid: Vec<GridCoordinate> = snapped_geo.iter().map(|g| grid.mapper.geo_to_grid(g)).collect();

        let voyage = VoyageInfo {
            heading_deg: 0.0,
            ship_speed_mps: config.ship_speed_mps,
            draft_m: config.draft_m,
            trim_m: config.trim_m,
        };

        // Bind the two fields the strategies actually need as their own
        // local references rather than capturing `sources` wholesale: the
        // collaborator trait objects inside `RouterSources` carry no
        // `Sync` bound (matching `GridBuilder`'s own trait-object fields),
        // so capturing the struct itself across the `rayon::join` thread
        // boundary below would require more than this call needs.
        let weather = &sources.weather;
        let ship_dynamics = sources.ship_dynamics;

        let compute_shortest = || -> Option<SinglePathResult> {
            if !config.calculate_shortest {
                return None;
            }
            let (path, seg_err) = compute_distance_route(&grid, config.ship_speed_mps, &snapped_grid);
            Some(finalize_path_result(&grid, &path, seg_err, &voyage, config.start_time_unix, weather, ship_dynamics))
        };
        let compute_optimized = || -> Option<SinglePathResult> {
            if !config.calculate_optimized {
                return None;
            }
            let (path, seg_err) =
                compute_fuel_route(&grid, &voyage, config.start_time_unix, weather, ship_dynamics, &snapped_grid, &snapped_geo);
            Some(finalize_path_result(&grid, &path, seg_err, &voyage, config.start_time_unix, weather, ship_dynamics))
        };

        // The two strategies share only
        // immutable inputs (grid, weather, voyage config).
        let (shortest, optimized) = rayon::join(compute_shortest, compute_optimized);

        let success = shortest.as_ref().is_none_or(|r| r.success) && optimized.as_ref().is_none_or(|r| r.success);
        let error_message = shortest
            .as_ref()
            .and_then(|r| r.error_message.clone())
            .or_else(|| optimized.as_ref().and_then(|r| r.error_message.clone()));

        VoyageResult { success, error_message, snapping, shortest, optimized }
    }
}

impl<'a, D: ShipDynamicsSolver + Sync> Default for ShipRouter<'a, D> {
    fn default() -> Self {
        Self::new()
    }
}

/// Stitches segment results in waypoint order, skipping the first cell of
/// every segment after the first (it duplicates the previous segment's
/// end). Returns the stitched prefix plus the first
/// error hit, if any; segments after a failure are never appended.
fn stitch_segment_results(results: Vec<Result<PathSearchResult, RouterError>>) -> (Vec<GridCoordinate>, Option<RouterError>) {
    let mut stitched = Vec::new();
    for result in results {
        match result {
            Ok(segment) => {
                if stitched.is_empty() {
                    stitched.extend(segment.path.iter().copied());
                } else {
                    stitched.extend(segment.path.iter().skip(1).copied());
                }
            }
            Err(e) => return (stitched, Some(e)),
        }
    }
    (stitched, None)
}

/// Runs the distance strategy across every consecutive waypoint pair.
/// Segments are independent (read-only grid) and run in parallel.
fn compute_distance_route(
    grid: &NavigableGrid,
    ship_speed_mps: f64,
    snapped_grid: &[GridCoordinate],
) -> (Vec<GridCoordinate>, Option<RouterError>) {
    let strategy = DistanceStrategy::new(grid.mapper, ship_speed_mps);
    let pairs: Vec<(GridCoordinate, GridCoordinate)> = snapped_grid.windows(2).map(|w| (w[0], w[1])).collect();
    let results: Vec<Result<PathSearchResult, RouterError>> =
        pairs.par_iter().map(|&(from, to)| AStarEngine::new(grid, &strategy).search(from, to)).collect();
    stitch_segment_results(results)
}

/// Runs the fuel strategy across every consecutive waypoint pair. Each
/// segment gets its own `min_fuel_rate_kgh`, evaluated at that segment's
/// own start point heading toward that segment's own goal.
fn compute_fuel_route<D: ShipDynamicsSolver + Sync>(
    grid: &NavigableGrid,
    voyage: &VoyageInfo,
    start_time_unix: i64,
    weather: &WeatherStore,
    ship_dynamics: &D,
    snapped_grid: &[GridCoordinate],
    snapped_geo: &[GeoCoordinate],
) -> (Vec<GridCoordinate>, Option<RouterError>) {
    let pairs: Vec<(GridCoordinate, GridCoordinate, GeoCoordinate, GeoCoordinate)> = snapped_grid
        .windows(2)
        .zip(snapped_geo.windows(2))
        .map(|(g, p)| (g[0], g[1], p[0], p[1]))
        .collect();

    let results: Vec<Result<PathSearchResult, RouterError>> = pairs
        .par_iter()
        .map(|&(from_grid, to_grid, from_geo, to_geo)| {
            let min_rate = min_fuel_rate_kgh(ship_dynamics, voyage, &from_geo, &to_geo)?;
            let strategy = FuelStrategy {
                mapper: grid.mapper,
                voyage: *voyage,
                start_time_unix,
                weather,
                ship_dynamics,
                max_angle_degrees: DEFAULT_MAX_ANGLE_DEGREES,
                min_fuel_rate_kgh: min_rate,
            };
            AStarEngine::new(grid, &strategy).search(from_grid, to_grid)
        })
        .collect();

    stitch_segment_results(results)
}

/// Integrates telemetry along the final stitched path: the
/// same rules as the fuel strategy's edge evaluation, applied regardless
/// of which strategy produced the path, so both routes report comparable
/// distance/time/fuel totals. Any internal failure (e.g. a weather query
/// before the table start) truncates the point list rather than
/// discarding what was already integrated.
fn integrate_telemetry<D: ShipDynamicsSolver>(
    grid: &NavigableGrid,
    path: &[GridCoordinate],
    voyage: &VoyageInfo,
    start_time_unix: i64,
    weather: &WeatherStore,
    ship_dynamics: &D,
) -> (Vec<PathPointDetail>, PathSummary, Option<RouterError>) {
    if path.is_empty() {
        return (vec![], PathSummary::zero(), None);
    }

    let mut points = Vec::with_capacity(path.len());
    let start_geo = grid.mapper.grid_to_geo(&path[0]);
    let initial_weather = weather.query(start_time_unix, &start_geo).unwrap_or_else(|_| Weather::zero());
    points.push(PathPointDetail {
        position: start_geo,
        cumulative_time_hours: 0.0,
        cumulative_distance_km: 0.0,
        cumulative_fuel_kg: 0.0,
        instantaneous_fuel_rate_kgh: 0.0,
        speed_mps: voyage.ship_speed_mps,
        heading_deg: 0.0,
        weather: initial_weather,
    });

    let mut cumulative_time_hours = 0.0;
    let mut cumulative_distance_km = 0.0;
    let mut cumulative_fuel_kg = 0.0;
    let mut error = None;

    for pair in path.windows(2) {
        let (from, to) = (pair[0], pair[1]);
        match evaluate_fuel_edge(&grid.mapper, voyage, start_time_unix, cumulative_time_hours, weather, ship_dynamics, from, to) {
            Ok(edge) => {
                cumulative_time_hours += edge.delta_time_hours;
                cumulative_distance_km += edge.distance_km;
                cumulative_fuel_kg += edge.fuel_rate_kgh * edge.delta_time_hours;
                points.push(PathPointDetail {
                    position: grid.mapper.grid_to_geo(&to),
                    cumulative_time_hours,
                    cumulative_distance_km,
                    cumulative_fuel_kg,
                    instantaneous_fuel_rate_kgh: edge.fuel_rate_kgh,
                    speed_mps: voyage.ship_speed_mps,
                    heading_deg: edge.heading_deg,
                    weather: edge.weather,
                });
            }
            Err(e) => {
                error = Some(e);
                break;
            }
        }
    }

    let summary = PathSummary {
        total_distance_km: cumulative_distance_km,
        total_time_hours: cumulative_time_hours,
        total_fuel_kg: cumulative_fuel_kg,
        average_speed_mps: if cumulative_time_hours > 0.0 {
            cumulative_distance_km * 1000.0 / (cumulative_time_hours * 3600.0)
        } else {
            0.0
        },
        average_fuel_rate_kgh: if cumulative_time_hours > 0.0 { cumulative_fuel_kg / cumulative_time_hours } else { 0.0 },
    };

    (points, summary, error)
}

fn finalize_path_result<D: ShipDynamicsSolver>(
    grid: &NavigableGrid,
    path: &[GridCoordinate],
    seg_err: Option<RouterError>,
    voyage: &VoyageInfo,
    start_time_unix: i64,
    weather: &WeatherStore,
    ship_dynamics: &D,
) -> SinglePathResult {
    let (points, summary, telemetry_err) = integrate_telemetry(grid, path, voyage, start_time_unix, weather, ship_dynamics);
    let error = seg_err.or(telemetry_err);
    SinglePathResult { success: error.is_none(), error_message: error.map(|e| e.to_string()), summary, points }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::collaborators::{InMemoryBathymetry, InMemoryCoastline, PolynomialShipDynamics, ScanlinePolygonRasterizer};
    use crate::engine::geo::BoundingBox;

    fn uniform_ocean(bounds: BoundingBox) -> (InMemoryBathymetry, InMemoryCoastline, ScanlinePolygonRasterizer, PolynomialShipDynamics) {
        (
            InMemoryBathymetry::new(bounds, 400, 400, vec![-4000.0; 400 * 400]),
            InMemoryCoastline::default(),
            ScanlinePolygonRasterizer,
            PolynomialShipDynamics::default(),
        )
    }

    #[test]
    fn uninitialized_router_fails_not_initialized() {
        let router: ShipRouter<PolynomialShipDynamics> = ShipRouter::new();
        let waypoints = vec![GeoCoordinate::new(35.0, 129.0), GeoCoordinate::new(33.5, 126.5)];
        let result = router.calculate_route(&waypoints, &VoyageConfig::default());
        assert!(!result.success);
        assert_eq!(result.error_message.unwrap(), RouterError::NotInitialized.to_string());
    }

    #[test]
    fn single_waypoint_fails_too_few() {
        let bounds = BoundingBox::new(30.0, 40.0, 120.0, 130.0);
        let (bathy, coastline, rasterizer, ship) = uniform_ocean(bounds);
        let router = ShipRouter::with_sources(&bathy, &coastline, &rasterizer, &ship, WeatherStore::default());
        let result = router.calculate_route(&[GeoCoordinate::new(35.0, 125.0)], &VoyageConfig::default());
        assert!(!result.success);
    }

    #[test]
    fn degenerate_same_point_produces_zero_totals() {
        let bounds = BoundingBox::new(30.0, 40.0, 120.0, 130.0);
        let (bathy, coastline, rasterizer, ship) = uniform_ocean(bounds);
        let router = ShipRouter::with_sources(&bathy, &coastline, &rasterizer, &ship, WeatherStore::default());
        let point = GeoCoordinate::new(35.1, 129.04);
        let result = router.calculate_route(&[point, point], &VoyageConfig::default());

        assert!(result.success);
        assert_eq!(result.snapping.len(), 2);
        let shortest = result.shortest.unwrap();
        assert_eq!(shortest.summary.total_distance_km, 0.0);
        assert_eq!(shortest.summary.total_time_hours, 0.0);
        assert_eq!(shortest.summary.total_fuel_kg, 0.0);
    }

    #[test]
    fn short_hop_both_strategies_succeed_and_optimized_not_shorter_distance() {
        let bounds = BoundingBox::new(20.0, 45.0, 115.0, 140.0);
        let (bathy, coastline, rasterizer, ship) = uniform_ocean(bounds);
        let router = ShipRouter::with_sources(&bathy, &coastline, &rasterizer, &ship, WeatherStore::default());

        let waypoints = vec![GeoCoordinate::new(35.0994, 129.0336), GeoCoordinate::new(33.4996, 126.5312)];
        let config = VoyageConfig { grid_cell_size_km: 5.0, ship_speed_mps: 8.0, ..VoyageConfig::default() };
        let result = router.calculate_route(&waypoints, &config);

        assert!(result.success);
        let shortest = result.shortest.unwrap();
        let optimized = result.optimized.unwrap();
        assert!(shortest.success && optimized.success);

        let direct_km = crate::engine::geo::great_circle_distance_km(&waypoints[0], &waypoints[1]);
        let rel_err = (shortest.summary.total_distance_km - direct_km).abs() / direct_km;
        assert!(rel_err < 0.05, "shortest distance {} too far from direct {}", shortest.summary.total_distance_km, direct_km);
        assert!(optimized.summary.total_distance_km >= shortest.summary.total_distance_km - 1e-6);
    }

    #[test]
    fn land_locked_waypoint_fails_snapping_but_still_reports_snapping_info() {
        let bounds = BoundingBox::new(30.0, 55.0, 85.0, 130.0);
        let bathy = InMemoryBathymetry::new(bounds, 500, 900, vec![50.0; 500 * 900]);
        let coastline = InMemoryCoastline::default();
        let rasterizer = ScanlinePolygonRasterizer;
        let ship = PolynomialShipDynamics::default();
        let router = ShipRouter::with_sources(&bathy, &coastline, &rasterizer, &ship, WeatherStore::default());

        // Entirely-land bathymetry: no waypoint can snap within any radius.
        let waypoints = vec![GeoCoordinate::new(47.9, 106.9), GeoCoordinate::new(48.0, 107.0)];
        let config = VoyageConfig { max_snap_radius_km: 50.0, ..VoyageConfig::default() };
        let result = router.calculate_route(&waypoints, &config);

        assert!(!result.success);
        assert_eq!(result.snapping.len(), 2);
        assert!(result.snapping.iter().any(|s| s.status == SnappingStatus::Failed));
        assert!(result.shortest.is_none());
        assert!(result.optimized.is_none());
    }
}
