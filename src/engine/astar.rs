//! Generic best-first search over a [`NavigableGrid`], parameterized by a
//! [`RouteStrategy`]. Static dispatch via generics since the strategy
//! never changes within a single search.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, HashSet};

use ordered_float::OrderedFloat;

use crate::engine::geo::GridCoordinate;
use crate::engine::grid::NavigableGrid;
use crate::engine::strategy::RouteStrategy;
use crate::error::RouterError;

const NEIGHBOR_OFFSETS: [(i64, i64); 8] =
    [(-1, -1), (-1, 0), (-1, 1), (0, -1), (0, 1), (1, -1), (1, 0), (1, 1)];

/// A node as it lives in the open set: its grid position, cost-so-far `g`,
/// heuristic `h`, the parent it was relaxed from (`None` only at `start`),
/// and the elapsed voyage time accumulated to reach it. Exists only for
/// the lifetime of one [`AStarEngine::search`] call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PathNode {
    pub position: GridCoordinate,
    pub g: f64,
    pub h: f64,
    pub parent: Option<GridCoordinate>,
    pub accumulated_time_hours: f64,
}

impl PathNode {
    pub fn f(&self) -> f64 {
        self.g + self.h
    }
}

/// Open-set entry: ordered by `f` only (ascending, via `Reverse` semantics
/// baked into `Ord`), so `BinaryHeap` (a max-heap) pops the lowest `f`
/// first. Tie-breaking among equal `f` is left to `BinaryHeap`'s own
/// behavior; ties are intentionally unresolved.
struct HeapEntry(OrderedFloat<f64>, PathNode);

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}
impl Eq for HeapEntry {}
impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        other.0.cmp(&self.0)
    }
}

/// The ordered grid-cell path plus its total cost and elapsed time, as
/// returned for one waypoint-pair segment.
#[derive(Debug, Clone, PartialEq)]
pub struct PathSearchResult {
    pub path: Vec<GridCoordinate>,
    pub total_cost: f64,
    pub total_time_hours: f64,
}

/// Best-first search over 8-connected grid neighbors, generic over the
/// cost [`RouteStrategy`].
pub struct AStarEngine<'a, S: RouteStrategy> {
    grid: &'a NavigableGrid,
    strategy: &'a S,
}

impl<'a, S: RouteStrategy> AStarEngine<'a, S> {
    pub fn new(grid: &'a NavigableGrid, strategy: &'a S) -> Self {
        Self { grid, strategy }
    }

    /// Runs the main search loop. Fails with `EndpointNotNavigable` if
    /// either endpoint is out of bounds or not navigable, with
    /// `PathNotFound` if the open set drains without reaching `goal`.
    /// `start == goal` short-circuits to the trivial single-cell path.
    pub fn search(&self, start: GridCoordinate, goal: GridCoordinate) -> Result<PathSearchResult, RouterError> {
        if !self.grid.mapper.in_bounds(&start) || !self.grid.is_navigable(&start) {
            return Err(RouterError::EndpointNotNavigable { row: start.row, col: start.col });
        }
        if !self.grid.mapper.in_bounds(&goal) || !self.grid.is_navigable(&goal) {
            return Err(RouterError::EndpointNotNavigable { row: goal.row, col: goal.col });
        }
        if start == goal {
            return Ok(PathSearchResult { path: vec![start], total_cost: 0.0, total_time_hours: 0.0 });
        }

        let mut open: BinaryHeap<HeapEntry> = BinaryHeap::new();
        let mut g_score: HashMap<GridCoordinate, f64> = HashMap::new();
        let mut parent: HashMap<GridCoordinate, GridCoordinate> = HashMap::new();
        let mut closed: HashSet<GridCoordinate> = HashSet::new();

        g_score.insert(start, 0.0);
        let h_start = self.strategy.heuristic(start, goal);
        open.push(HeapEntry(
            OrderedFloat(h_start),
            PathNode { position: start, g: 0.0, h: h_start, parent: None, accumulated_time_hours: 0.0 },
        ));

        while let Some(HeapEntry(_, current)) = open.pop() {
            if closed.contains(&current.position) {
                continue;
            }

            if current.position == goal {
                let path = reconstruct_path(&parent, start, current.position);
                return Ok(PathSearchResult {
                    path,
                    total_cost: current.g,
                    total_time_hours: current.accumulated_time_hours,
                });
            }

            closed.insert(current.position);

            for (dr, dc) in NEIGHBOR_OFFSETS {
                let neighbor = GridCoordinate::new(current.position.row + dr, current.position.col + dc);
                if !self.grid.mapper.in_bounds(&neighbor) || !self.grid.is_navigable(&neighbor) {
                    continue;
                }
                if closed.contains(&neighbor) {
                    continue;
                }
                if !self.strategy.is_valid_transition(current.parent, current.position, neighbor) {
                    continue;
                }

                let edge = self.strategy.edge_cost(current.position, neighbor, current.accumulated_time_hours)?;
                let new_g = current.g + edge.cost;
                let existing_g = g_score.get(&neighbor).copied().unwrap_or(f64::INFINITY);
                if new_g < existing_g {
                    g_score.insert(neighbor, new_g);
                    parent.insert(neighbor, current.position);
                    let new_time = current.accumulated_time_hours + edge.delta_time_hours;
                    let h = self.strategy.heuristic(neighbor, goal);
                    open.push(HeapEntry(
                        OrderedFloat(new_g + h),
                        PathNode { position: neighbor, g: new_g, h, parent: Some(current.position), accumulated_time_hours: new_time },
                    ));
                }
            }
        }

        Err(RouterError::PathNotFound { from_row: start.row, from_col: start.col, to_row: goal.row, to_col: goal.col })
    }
}

/// Walks the parent map back from `goal` to `start` and reverses. Parents
/// form a tree rooted at `start` (written only on relaxation), so this
/// terminates without cycle detection.
fn reconstruct_path(
    parent: &HashMap<GridCoordinate, GridCoordinate>,
    start: GridCoordinate,
    goal: GridCoordinate,
) -> Vec<GridCoordinate> {
    let mut path = vec![goal];
    let mut pos = goal;
    while pos != start {
        pos = parent[&pos];
        path.push(pos);
    }
    path.reverse();
    path
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::collaborators::{rectangular_land_polygon, InMemoryBathymetry, InMemoryCoastline, ScanlinePolygonRasterizer};
    use crate::engine::geo::{great_circle_distance_km, BoundingBox, GeoCoordinate};
    use crate::engine::grid::GridBuilder;
    use crate::engine::strategy::DistanceStrategy;

    fn uniform_ocean_grid(bounds: BoundingBox, waypoints: &[GeoCoordinate]) -> NavigableGrid {
        let bathy = InMemoryBathymetry::new(bounds, 400, 400, vec![-4000.0; 400 * 400]);
        let coastline = InMemoryCoastline::default();
        let rasterizer = ScanlinePolygonRasterizer;
        let builder = GridBuilder::new(&bathy, &coastline, &rasterizer);
        builder.build(waypoints, 5.0, 2).unwrap()
    }

    #[test]
    fn identical_start_and_goal_is_trivial() {
        let bounds = BoundingBox::new(30.0, 40.0, 120.0, 130.0);
        let waypoints = vec![GeoCoordinate::new(35.0, 125.0), GeoCoordinate::new(36.0, 126.0)];
        let grid = uniform_ocean_grid(bounds, &waypoints);
        let strategy = DistanceStrategy::new(grid.mapper, 8.0);
        let engine = AStarEngine::new(&grid, &strategy);

        let a = grid.mapper.geo_to_grid(&waypoints[0]);
        let result = engine.search(a, a).unwrap();
        assert_eq!(result.path, vec![a]);
        assert_eq!(result.total_cost, 0.0);
    }

    #[test]
    fn non_navigable_endpoint_fails() {
        let bounds = BoundingBox::new(30.0, 40.0, 120.0, 130.0);
        let waypoints = vec![GeoCoordinate::new(35.0, 125.0), GeoCoordinate::new(36.0, 126.0)];
        let grid = uniform_ocean_grid(bounds, &waypoints);
        let strategy = DistanceStrategy::new(grid.mapper, 8.0);
        let engine = AStarEngine::new(&grid, &strategy);

        let out_of_bounds = GridCoordinate::new(-1, -1);
        let a = grid.mapper.geo_to_grid(&waypoints[0]);
        assert!(engine.search(out_of_bounds, a).is_err());
    }

    #[test]
    fn uniform_grid_path_matches_great_circle_within_half_percent() {
        let bounds = BoundingBox::new(20.0, 45.0, 115.0, 140.0);
        let start_geo = GeoCoordinate::new(35.0994, 129.0336);
        let goal_geo = GeoCoordinate::new(33.4996, 126.5312);
        let waypoints = vec![start_geo, goal_geo];
        let grid = uniform_ocean_grid(bounds, &waypoints);
        let strategy = DistanceStrategy::new(grid.mapper, 8.0);
        let engine = AStarEngine::new(&grid, &strategy);

        let start = grid.mapper.geo_to_grid(&start_geo);
        let goal = grid.mapper.geo_to_grid(&goal_geo);
        let result = engine.search(start, goal).unwrap();

        let direct = great_circle_distance_km(&start_geo, &goal_geo);
        assert!(direct >= 100.0, "test precondition: endpoints should be >= 100km apart");
        let relative_error = (result.total_cost - direct).abs() / direct;
        assert!(relative_error < 0.005, "relative error {relative_error} too high (cost={}, direct={direct})", result.total_cost);
    }

    #[test]
    fn returned_path_is_8_connected_and_all_navigable() {
        let bounds = BoundingBox::new(20.0, 45.0, 115.0, 140.0);
        let start_geo = GeoCoordinate::new(35.0994, 129.0336);
        let goal_geo = GeoCoordinate::new(33.4996, 126.5312);
        let waypoints = vec![start_geo, goal_geo];
        let grid = uniform_ocean_grid(bounds, &waypoints);
        let strategy = DistanceStrategy::new(grid.mapper, 8.0);
        let engine = AStarEngine::new(&grid, &strategy);

        let start = grid.mapper.geo_to_grid(&start_geo);
        let goal = grid.mapper.geo_to_grid(&goal_geo);
        let result = engine.search(start, goal).unwrap();

        assert_eq!(*result.path.first().unwrap(), start);
        assert_eq!(*result.path.last().unwrap(), goal);
        for pair in result.path.windows(2) {
            assert!(grid.is_navigable(&pair[0]));
            assert!((pair[1].row - pair[0].row).abs() <= 1);
            assert!((pair[1].col - pair[0].col).abs() <= 1);
        }
    }

    #[test]
    fn angle_guard_routes_around_a_sharp_turn() {
        let bounds = BoundingBox::new(30.0, 40.0, 120.0, 130.0);
        // A narrow land spit forces a path that would otherwise need a
        // sharp reversal to slip around the tip; the angle guard must
        // still only ever emit <= 90 degree turns.
        let mut depths = vec![-4000.0; 300 * 300];
        for r in 100..200 {
            for c in 140..160 {
                depths[r * 300 + c] = 50.0;
            }
        }
        let bathy = InMemoryBathymetry::new(bounds, 300, 300, depths);
        let land = rectangular_land_polygon(33.3, 36.7, 126.7, 127.3);
        let coastline = InMemoryCoastline::new(vec![land]);
        let rasterizer = ScanlinePolygonRasterizer;
        let builder = GridBuilder::new(&bathy, &coastline, &rasterizer);
        let waypoints = vec![GeoCoordinate::new(33.0, 125.0), GeoCoordinate::new(33.0, 129.0)];
        let grid = builder.build(&waypoints, 5.0, 2).unwrap();

        let strategy = DistanceStrategy::new(grid.mapper, 8.0);
        let engine = AStarEngine::new(&grid, &strategy);
        let start = grid.mapper.geo_to_grid(&waypoints[0]);
        let goal = grid.mapper.geo_to_grid(&waypoints[1]);
        let result = engine.search(start, goal).unwrap();

        for window in result.path.windows(3) {
            let angle = crate::engine::strategy::turn_angle_degrees(window[0], window[1], window[2]);
            assert!(angle <= 90.0 + 1e-6, "turn angle {angle} exceeds 90 degrees");
        }
    }
}
