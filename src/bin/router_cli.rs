//! Thin CLI wrapper around `ship_router::engine::orchestrator::ShipRouter`:
//! parses waypoints and a handful of voyage-config overrides, runs one
//! `calculate_route` call, and prints the `VoyageResult` as pretty JSON.
//! Non-core glue; kept intentionally small.

use clap::Parser;

use ship_router::engine::collaborators::{InMemoryBathymetry, InMemoryCoastline, PolynomialShipDynamics, ScanlinePolygonRasterizer};
use ship_router::engine::{BoundingBox, GeoCoordinate, ShipRouter, VoyageConfig};
use ship_router::engine::weather::WeatherStore;

/// Plan a ship voyage between ordered waypoints.
#[derive(Parser, Debug)]
#[command(name = "router_cli", about = "Ship voyage router: shortest-distance and fuel-optimal route planning")]
struct Args {
    /// Waypoints as "lat,lon" pairs, in order, e.g. "35.0994,129.0336" "33.4996,126.5312"
    #[arg(required = true, num_args = 2..)]
    waypoints: Vec<String>,

    /// Directory holding the seven weather *.bin files; falls back to WEATHER_DATA_PATH.
    #[arg(long)]
    weather_dir: Option<String>,

    /// Ship speed through water, m/s.
    #[arg(long, default_value_t = VoyageConfig::default().ship_speed_mps)]
    ship_speed_mps: f64,

    /// Target grid cell resolution, km.
    #[arg(long, default_value_t = VoyageConfig::default().grid_cell_size_km)]
    grid_cell_size_km: f64,

    /// Waypoint-snapping search radius, km.
    #[arg(long, default_value_t = VoyageConfig::default().max_snap_radius_km)]
    max_snap_radius_km: f64,

    /// Voyage start time, Unix seconds.
    #[arg(long, default_value_t = VoyageConfig::default().start_time_unix)]
    start_time_unix: i64,

    /// Skip the shortest-distance strategy.
    #[arg(long)]
    no_shortest: bool,

    /// Skip the fuel-optimal strategy.
    #[arg(long)]
    no_optimized: bool,
}

fn parse_waypoint(s: &str) -> Result<GeoCoordinate, String> {
    let (lat_str, lon_str) = s.split_once(',').ok_or_else(|| format!("expected \"lat,lon\", got {s:?}"))?;
    let latitude: f64 = lat_str.trim().parse().map_err(|_| format!("invalid latitude in {s:?}"))?;
    let longitude: f64 = lon_str.trim().parse().map_err(|_| format!("invalid longitude in {s:?}"))?;
    Ok(GeoCoordinate::new(latitude, longitude))
}

fn main() {
    env_logger::init();
    let args = Args::parse();

    let waypoints: Vec<GeoCoordinate> = match args.waypoints.iter().map(|s| parse_waypoint(s)).collect() {
        Ok(w) => w,
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(1);
        }
    };

    let config = VoyageConfig {
        ship_speed_mps: args.ship_speed_mps,
        grid_cell_size_km: args.grid_cell_size_km,
        max_snap_radius_km: args.max_snap_radius_km,
        start_time_unix: args.start_time_unix,
        calculate_shortest: !args.no_shortest,
        calculate_optimized: !args.no_optimized,
        ..VoyageConfig::default()
    };

    // The default collaborators are dependency-light stand-ins: a uniform
    // deep-ocean bathymetry grid and an empty coastline, since reading a
    // real GeoTIFF/shapefile is out of scope here. A deployment
    // wires its own `BathymetrySource`/`CoastlineSource` here instead.
    let bounds = BoundingBox::from_points(&waypoints).unwrap_or(BoundingBox::new(-90.0, 90.0, -180.0, 180.0));
    let bathymetry = InMemoryBathymetry::new(bounds, 2000, 2000, vec![-4000.0; 2000 * 2000]);
    let coastline = InMemoryCoastline::default();
    let rasterizer = ScanlinePolygonRasterizer;
    let ship_dynamics = PolynomialShipDynamics::default();
    let weather = WeatherStore::load_from_dir_or_env(args.weather_dir.as_deref().map(std::path::Path::new));

    let router = ShipRouter::with_sources(&bathymetry, &coastline, &rasterizer, &ship_dynamics, weather);
    let result = router.calculate_route(&waypoints, &config);

    match serde_json::to_string_pretty(&result) {
        Ok(json) => println!("{json}"),
        Err(e) => {
            eprintln!("error: failed to serialize result: {e}");
            std::process::exit(1);
        }
    }

    if !result.success {
        std::process::exit(1);
    }
}
