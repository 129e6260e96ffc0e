use thiserror::Error;

/// Error taxonomy surfaced to callers of [`crate::engine::orchestrator::ShipRouter`].
///
/// Failures that are handled locally with a fallback value (a missing
/// weather file, a missing weather sample, an out-of-range snapping input, a
/// degenerate rasterizer polygon) never reach this type; they are logged
/// instead of propagated.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum RouterError {
    #[error("router used before grid construction completed")]
    NotInitialized,

    #[error("at least 2 waypoints are required, got {0}")]
    TooFewWaypoints(usize),

    #[error("failed to load bathymetry: {0}")]
    BathymetryLoadFailed(String),

    #[error("failed to load coastline: {0}")]
    CoastlineLoadFailed(String),

    #[error("grid build failed: {0}")]
    GridBuildFailed(String),

    #[error("no navigable cell found within {max_radius_km} km of ({lat}, {lon})")]
    SnappingFailed {
        lat: f64,
        lon: f64,
        max_radius_km: f64,
    },

    #[error("endpoint ({row}, {col}) is not navigable")]
    EndpointNotNavigable { row: i64, col: i64 },

    #[error("no path found between ({from_row}, {from_col}) and ({to_row}, {to_col})")]
    PathNotFound {
        from_row: i64,
        from_col: i64,
        to_row: i64,
        to_col: i64,
    },

    #[error("ship dynamics solver failed: {0}")]
    ShipDynamicsFailed(String),

    #[error("weather query time is before the table start")]
    TimeBeforeRange,
}
