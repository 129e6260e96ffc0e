pub mod astar;
pub mod collaborators;
pub mod geo;
pub mod grid;
pub mod orchestrator;
pub mod snapper;
pub mod strategy;
pub mod weather;

pub use astar::{AStarEngine, PathSearchResult};
pub use geo::{BoundingBox, GeoCoordinate, GridCoordinate};
pub use grid::{CellType, GridBuilder, NavigableGrid};
pub use orchestrator::{ShipRouter, VoyageConfig, VoyageResult};
pub use snapper::{SnappingInfo, SnappingStatus, WaypointSnapper};
pub use strategy::{DistanceStrategy, FuelStrategy, RouteStrategy, VoyageInfo};
pub use weather::{Weather, WeatherDataInput, WeatherStore};
