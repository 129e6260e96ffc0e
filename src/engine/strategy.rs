//! Cost strategies: the `RouteStrategy` capability trait plus the
//! distance and fuel implementations. Statically dispatched into the A*
//! engine via generics since the strategy is fixed for an entire search.

use serde::{Deserialize, Serialize};

use crate::engine::collaborators::{ShipDynamicsInput, ShipDynamicsSolver};
use crate::engine::geo::{great_circle_distance_km, initial_bearing_deg, GeoCoordinate, GeoIndexMapper, GridCoordinate};
use crate::engine::weather::{Weather, WeatherStore};
use crate::error::RouterError;

/// Default maximum turn angle, exposed as a knob since this value has
/// varied across deployments.
pub const DEFAULT_MAX_ANGLE_DEGREES: f64 = 90.0;

/// Per-voyage inputs shared by both strategies. `heading_deg` is
/// recomputed per edge; the rest is inherited from [`crate::engine::orchestrator::VoyageConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VoyageInfo {
    pub heading_deg: f64,
    pub ship_speed_mps: f64,
    pub draft_m: f64,
    pub trim_m: f64,
}

/// The cost, in whatever unit the strategy works in, and the elapsed time
/// in hours, for a single grid-edge transition.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EdgeCost {
    pub cost: f64,
    pub delta_time_hours: f64,
}

/// The capability set an A* search needs from a cost model: edge cost,
/// admissible heuristic, and transition legality. Both implementations
/// share the turn-angle legality check below.
pub trait RouteStrategy {
    fn edge_cost(&self, from: GridCoordinate, to: GridCoordinate, accumulated_time_hours: f64) -> Result<EdgeCost, RouterError>;
    fn heuristic(&self, current: GridCoordinate, goal: GridCoordinate) -> f64;
    fn is_valid_transition(&self, parent: Option<GridCoordinate>, current: GridCoordinate, neighbor: GridCoordinate) -> bool;
}

/// Unsigned turn angle, in degrees, between the `parent -> current` and
/// `current -> neighbor` grid-step vectors.
pub fn turn_angle_degrees(parent: GridCoordinate, current: GridCoordinate, neighbor: GridCoordinate) -> f64 {
    let dx_prev = (current.col - parent.col) as f64;
    let dy_prev = (current.row - parent.row) as f64;
    let dx_curr = (neighbor.col - current.col) as f64;
    let dy_curr = (neighbor.row - current.row) as f64;

    let mag_prev = (dx_prev * dx_prev + dy_prev * dy_prev).sqrt();
    let mag_curr = (dx_curr * dx_curr + dy_curr * dy_curr).sqrt();
    if mag_prev == 0.0 || mag_curr == 0.0 {
        return 0.0;
    }

    let dot = dx_prev * dx_curr + dy_prev * dy_curr;
    let cos_theta = (dot / (mag_prev * mag_curr)).clamp(-1.0, 1.0);
    cos_theta.acos().to_degrees()
}

/// Nodes with no parent always pass; otherwise the turn must be `<= max_angle_deg`.
pub fn angle_check(
    parent: Option<GridCoordinate>,
    current: GridCoordinate,
    neighbor: GridCoordinate,
    max_angle_deg: f64,
) -> bool {
    match parent {
        None => true,
        Some(p) => turn_angle_degrees(p, current, neighbor) <= max_angle_deg,
    }
}

/// Edge cost = great-circle distance between cell centers; heuristic =
/// great-circle distance to goal (admissible and consistent).
#[derive(Debug, Clone, Copy)]
pub struct DistanceStrategy {
    pub mapper: GeoIndexMapper,
    pub ship_speed_mps: f64,
    pub max_angle_degrees: f64,
}

impl DistanceStrategy {
    pub fn new(mapper: GeoIndexMapper, ship_speed_mps: f64) -> Self {
        Self { mapper, ship_speed_mps, max_angle_degrees: DEFAULT_MAX_ANGLE_DEGREES }
    }
}

impl RouteStrategy for DistanceStrategy {
    fn edge_cost(&self, from: GridCoordinate, to: GridCoordinate, _accumulated_time_hours: f64) -> Result<EdgeCost, RouterError> {
        let a = self.mapper.grid_to_geo(&from);
        let b = self.mapper.grid_to_geo(&to);
        let distance_km = great_circle_distance_km(&a, &b);
        let delta_time_hours = distance_km / (self.ship_speed_mps * 3.6);
        Ok(EdgeCost { cost: distance_km, delta_time_hours })
    }

    fn heuristic(&self, current: GridCoordinate, goal: GridCoordinate) -> f64 {
        great_circle_distance_km(&self.mapper.grid_to_geo(&current), &self.mapper.grid_to_geo(&goal))
    }

    fn is_valid_transition(&self, parent: Option<GridCoordinate>, current: GridCoordinate, neighbor: GridCoordinate) -> bool {
        angle_check(parent, current, neighbor, self.max_angle_degrees)
    }
}

/// One transition's full telemetry: distance, time, heading, the
/// ship-dynamics fuel rate, and the weather snapshot it was evaluated
/// against. Shared by [`FuelStrategy::edge_cost`] and the orchestrator's
/// telemetry integration pass, which uses the same rules as the fuel
/// strategy even when reporting telemetry for the distance-optimal path.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TelemetryEdge {
    pub distance_km: f64,
    pub delta_time_hours: f64,
    pub heading_deg: f64,
    pub fuel_rate_kgh: f64,
    pub weather: Weather,
}

/// Evaluates one grid-cell transition against the ship-dynamics solver:
/// midpoint position, mid-time weather lookup, heading by initial
/// bearing, fuel rate in kg/h.
pub fn evaluate_fuel_edge<D: ShipDynamicsSolver>(
    mapper: &GeoIndexMapper,
    voyage: &VoyageInfo,
    start_time_unix: i64,
    accumulated_time_hours: f64,
    weather: &WeatherStore,
    ship_dynamics: &D,
    from: GridCoordinate,
    to: GridCoordinate,
) -> Result<TelemetryEdge, RouterError> {
    let from_geo = mapper.grid_to_geo(&from);
    let to_geo = mapper.grid_to_geo(&to);
    let distance_km = great_circle_distance_km(&from_geo, &to_geo);
    let delta_time_hours = distance_km / (voyage.ship_speed_mps * 3.6);

    let mid_geo = GeoCoordinate::new(
        (from_geo.latitude + to_geo.latitude) / 2.0,
        (from_geo.longitude + to_geo.longitude) / 2.0,
    );
    let heading_deg = initial_bearing_deg(&from_geo, &to_geo);

    let mid_time_unix =
        start_time_unix + ((accumulated_time_hours + delta_time_hours / 2.0) * 3600.0).round() as i64;
    let mid_weather = weather.query(mid_time_unix, &mid_geo)?;

    let input = ShipDynamicsInput {
        ship_speed_mps: voyage.ship_speed_mps,
        draft_m: voyage.draft_m,
        trim_m: voyage.trim_m,
        heading_deg,
        weather: mid_weather,
    };
    let output = ship_dynamics.estimate(&input)?;
    Ok(TelemetryEdge { distance_km, delta_time_hours, heading_deg, fuel_rate_kgh: output.fuel_rate_kgh, weather: mid_weather })
}

/// Edge cost integrates a ship-dynamics fuel rate evaluated at the
/// midpoint/mid-time of each transition against the weather field;
/// heuristic is the start-point zero-weather rate times the straight-line
/// time to goal, an empirical lower bound that is not provably admissible
/// under adverse weather, but pinned to this formula rather than a goal-point
/// or sampled-minimum variant.
pub struct FuelStrategy<'a, D: ShipDynamicsSolver> {
    pub mapper: GeoIndexMapper,
    pub voyage: VoyageInfo,
    pub start_time_unix: i64,
    pub weather: &'a WeatherStore,
    pub ship_dynamics: &'a D,
    pub max_angle_degrees: f64,
    /// Precomputed once per segment: the ship-dynamics fuel rate (kg/h) at
    /// the segment's start point under zero weather, heading toward goal.
    pub min_fuel_rate_kgh: f64,
}

impl<'a, D: ShipDynamicsSolver> RouteStrategy for FuelStrategy<'a, D> {
    fn edge_cost(&self, from: GridCoordinate, to: GridCoordinate, accumulated_time_hours: f64) -> Result<EdgeCost, RouterError> {
        let edge = evaluate_fuel_edge(
            &self.mapper,
            &self.voyage,
            self.start_time_unix,
            accumulated_time_hours,
            self.weather,
            self.ship_dynamics,
            from,
            to,
        )?;
        Ok(EdgeCost { cost: edge.fuel_rate_kgh * edge.delta_time_hours, delta_time_hours: edge.delta_time_hours })
    }

    fn heuristic(&self, current: GridCoordinate, goal: GridCoordinate) -> f64 {
        let current_geo = self.mapper.grid_to_geo(&current);
        let goal_geo = self.mapper.grid_to_geo(&goal);
        let distance_km = great_circle_distance_km(&current_geo, &goal_geo);
        let time_to_goal_hours = distance_km / (self.voyage.ship_speed_mps * 3.6);
        self.min_fuel_rate_kgh * time_to_goal_hours
    }

    fn is_valid_transition(&self, parent: Option<GridCoordinate>, current: GridCoordinate, neighbor: GridCoordinate) -> bool {
        angle_check(parent, current, neighbor, self.max_angle_degrees)
    }
}

/// Computes the fuel heuristic's precomputed minimum rate: the
/// ship-dynamics output at `start`, zero weather, heading toward `goal`.
pub fn min_fuel_rate_kgh<D: ShipDynamicsSolver>(
    ship_dynamics: &D,
    voyage: &VoyageInfo,
    start_geo: &crate::engine::geo::GeoCoordinate,
    goal_geo: &crate::engine::geo::GeoCoordinate,
) -> Result<f64, RouterError> {
    let heading_deg = initial_bearing_deg(start_geo, goal_geo);
    let input = ShipDynamicsInput {
        ship_speed_mps: voyage.ship_speed_mps,
        draft_m: voyage.draft_m,
        trim_m: voyage.trim_m,
        heading_deg,
        weather: crate::engine::weather::Weather::zero(),
    };
    Ok(ship_dynamics.estimate(&input)?.fuel_rate_kgh)
}
