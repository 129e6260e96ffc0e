//! Geographic primitives and the coordinate mapper shared by the grid,
//! snapper, and cost strategies.

use serde::{Deserialize, Serialize};

use crate::error::RouterError;

/// Mean Earth radius used for every great-circle computation in this crate, in km.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// A geographic point: `latitude` in `[-90, 90]`, `longitude` in `[-180, 180]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoCoordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoCoordinate {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }

    pub fn is_finite(&self) -> bool {
        self.latitude.is_finite() && self.longitude.is_finite()
    }

    /// Clamps to the valid lat/lon range rather than rejecting, matching the
    /// "out-of-range geo coordinates in snapping: clamped then searched" rule.
    pub fn clamped(&self) -> Self {
        Self {
            latitude: self.latitude.clamp(-90.0, 90.0),
            longitude: self.longitude.clamp(-180.0, 180.0),
        }
    }
}

/// An integer position inside a [`crate::engine::grid::NavigableGrid`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GridCoordinate {
    pub row: i64,
    pub col: i64,
}

impl GridCoordinate {
    pub fn new(row: i64, col: i64) -> Self {
        Self { row, col }
    }
}

/// An axis-aligned lat/lon box. Never crosses the anti-meridian.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
}

impl BoundingBox {
    pub fn new(min_lat: f64, max_lat: f64, min_lon: f64, max_lon: f64) -> Self {
        Self { min_lat, max_lat, min_lon, max_lon }
    }

    /// The smallest box enclosing every waypoint. Fails on an empty list.
    pub fn from_points(points: &[GeoCoordinate]) -> Result<Self, RouterError> {
        let mut iter = points.iter();
        let first = iter
            .next()
            .ok_or_else(|| RouterError::GridBuildFailed("no waypoints to bound".into()))?;

        let mut bbox = Self::new(first.latitude, first.latitude, first.longitude, first.longitude);
        for p in iter {
            bbox.min_lat = bbox.min_lat.min(p.latitude);
            bbox.max_lat = bbox.max_lat.max(p.latitude);
            bbox.min_lon = bbox.min_lon.min(p.longitude);
            bbox.max_lon = bbox.max_lon.max(p.longitude);
        }
        Ok(bbox)
    }

    pub fn height_deg(&self) -> f64 {
        self.max_lat - self.min_lat
    }

    pub fn width_deg(&self) -> f64 {
        self.max_lon - self.min_lon
    }

    pub fn contains(&self, p: &GeoCoordinate) -> bool {
        p.latitude >= self.min_lat
            && p.latitude <= self.max_lat
            && p.longitude >= self.min_lon
            && p.longitude <= self.max_lon
    }
}

/// Bijection between grid indices and the geographic centers of cells inside
/// a [`BoundingBox`]. Owned by [`crate::engine::grid::NavigableGrid`] so
/// build-time and query-time geotransforms cannot drift apart.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoIndexMapper {
    pub bounds: BoundingBox,
    pub rows: usize,
    pub cols: usize,
    pub cell_size_lat: f64,
    pub cell_size_lon: f64,
}

impl GeoIndexMapper {
    pub fn new(bounds: BoundingBox, rows: usize, cols: usize) -> Self {
        let cell_size_lat = bounds.height_deg() / rows as f64;
        let cell_size_lon = bounds.width_deg() / cols as f64;
        Self { bounds, rows, cols, cell_size_lat, cell_size_lon }
    }

    /// Row 0 is the northernmost band. Out-of-bounds inputs are clamped.
    pub fn geo_to_grid(&self, g: &GeoCoordinate) -> GridCoordinate {
        let row = ((self.bounds.max_lat - g.latitude) / self.cell_size_lat).floor() as i64;
        let col = ((g.longitude - self.bounds.min_lon) / self.cell_size_lon).floor() as i64;
        GridCoordinate {
            row: row.clamp(0, self.rows as i64 - 1),
            col: col.clamp(0, self.cols as i64 - 1),
        }
    }

    /// Returns the geographic center of the cell.
    pub fn grid_to_geo(&self, g: &GridCoordinate) -> GeoCoordinate {
        let lat = self.bounds.max_lat - (g.row as f64 + 0.5) * self.cell_size_lat;
        let lon = self.bounds.min_lon + (g.col as f64 + 0.5) * self.cell_size_lon;
        GeoCoordinate::new(lat, lon)
    }

    pub fn in_bounds(&self, g: &GridCoordinate) -> bool {
        g.row >= 0 && g.col >= 0 && g.row < self.rows as i64 && g.col < self.cols as i64
    }
}

/// Haversine great-circle distance in km. Symmetric; zero iff `a == b`.
pub fn great_circle_distance_km(a: &GeoCoordinate, b: &GeoCoordinate) -> f64 {
    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();
    let d_lat = (b.latitude - a.latitude).to_radians();
    let d_lon = (b.longitude - a.longitude).to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().asin();
    EARTH_RADIUS_KM * c
}

/// Initial bearing from `a` to `b`, in `[0, 360)` degrees. `a == b` returns 0.0.
pub fn initial_bearing_deg(a: &GeoCoordinate, b: &GeoCoordinate) -> f64 {
    if (a.latitude - b.latitude).abs() < 1e-12 && (a.longitude - b.longitude).abs() < 1e-12 {
        return 0.0;
    }

    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();
    let d_lon = (b.longitude - a.longitude).to_radians();

    let y = d_lon.sin() * lat2.cos();
    let x = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * d_lon.cos();
    let theta = y.atan2(x).to_degrees();
    (theta + 360.0) % 360.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn geo_to_grid_round_trip_within_half_cell() {
        let bounds = BoundingBox::new(30.0, 40.0, 120.0, 130.0);
        let mapper = GeoIndexMapper::new(bounds, 100, 100);
        let g = GeoCoordinate::new(35.123, 125.456);
        let rt = mapper.grid_to_geo(&mapper.geo_to_grid(&g));
        assert!((rt.latitude - g.latitude).abs() <= mapper.cell_size_lat / 2.0 + 1e-9);
        assert!((rt.longitude - g.longitude).abs() <= mapper.cell_size_lon / 2.0 + 1e-9);
    }

    #[test]
    fn geo_to_grid_clamps_outside_bounds() {
        let bounds = BoundingBox::new(30.0, 40.0, 120.0, 130.0);
        let mapper = GeoIndexMapper::new(bounds, 10, 10);
        let far = GeoCoordinate::new(80.0, 200.0);
        let gc = mapper.geo_to_grid(&far);
        assert_eq!(gc.row, 0);
        assert_eq!(gc.col, 9);
    }

    #[test]
    fn row_zero_is_northernmost() {
        let bounds = BoundingBox::new(30.0, 40.0, 120.0, 130.0);
        let mapper = GeoIndexMapper::new(bounds, 10, 10);
        let north = mapper.geo_to_grid(&GeoCoordinate::new(39.99, 125.0));
        let south = mapper.geo_to_grid(&GeoCoordinate::new(30.01, 125.0));
        assert_eq!(north.row, 0);
        assert_eq!(south.row, 9);
    }

    #[test]
    fn great_circle_distance_is_symmetric_and_zero_for_same_point() {
        let a = GeoCoordinate::new(35.0, 129.0);
        let b = GeoCoordinate::new(33.5, 126.5);
        assert!((great_circle_distance_km(&a, &b) - great_circle_distance_km(&b, &a)).abs() < 1e-9);
        assert!(great_circle_distance_km(&a, &a) < 1e-9);
    }

    #[test]
    fn antipodal_distance_matches_half_circumference() {
        let a = GeoCoordinate::new(10.0, 20.0);
        let b = GeoCoordinate::new(-10.0, -160.0);
        let expected = std::f64::consts::PI * EARTH_RADIUS_KM;
        assert!((great_circle_distance_km(&a, &b) - expected).abs() < 1e-6);
    }

    #[test]
    fn initial_bearing_is_in_range() {
        let a = GeoCoordinate::new(10.0, 20.0);
        let b = GeoCoordinate::new(20.0, 30.0);
        let bearing = initial_bearing_deg(&a, &b);
        assert!((0.0..360.0).contains(&bearing));
        assert_eq!(initial_bearing_deg(&a, &a), 0.0);
    }

    #[test]
    fn bearing_due_north_is_zero() {
        let a = GeoCoordinate::new(10.0, 20.0);
        let b = GeoCoordinate::new(20.0, 20.0);
        assert!(initial_bearing_deg(&a, &b) < 1e-6);
    }

    #[test]
    fn bearing_due_east_is_ninety() {
        let a = GeoCoordinate::new(0.0, 20.0);
        let b = GeoCoordinate::new(0.0, 30.0);
        assert!((initial_bearing_deg(&a, &b) - 90.0).abs() < 1e-6);
    }
}
