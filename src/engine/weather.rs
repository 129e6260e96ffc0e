//! Nearest-bin weather interpolation over the little-endian binary layout
//! described below, and the `WeatherStore` that loads the seven
//! named variable files.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use byteorder::{LittleEndian, ReadBytesExt};
use log::warn;
use serde::{Deserialize, Serialize};

use crate::engine::geo::GeoCoordinate;
use crate::error::RouterError;

/// Values at or below this sentinel, or any non-finite value, mean
/// "missing" and resolve to `0.0`.
const MISSING_SENTINEL: f64 = -9000.0;

/// Environment variable read when a caller does not pass an explicit
/// weather directory.
pub const WEATHER_DATA_PATH_ENV: &str = "WEATHER_DATA_PATH";

/// One variable's time/lon/lat grid, read directly from the binary layout
/// below: a little-endian header followed by `numTime*numLon*numLat`
/// float32 values ordered `[time][lon][lat]`.
#[derive(Debug, Clone, PartialEq)]
pub struct WeatherDataInput {
    pub start_time_unix: u32,
    pub num_time: u32,
    pub time_bin_hours: u32,
    pub start_lon: f32,
    pub num_lon: u32,
    pub lon_bin: f32,
    pub start_lat: f32,
    pub num_lat: u32,
    pub lat_bin: f32,
    pub values: Vec<f32>,
}

impl WeatherDataInput {
    fn linear_index(&self, t_unix: i64, lon: f64, lat: f64) -> Result<usize, RouterError> {
        let elapsed_s = t_unix as f64 - self.start_time_unix as f64;
        if elapsed_s < 0.0 {
            return Err(RouterError::TimeBeforeRange);
        }
        let mut t_idx = (elapsed_s / 3600.0 / self.time_bin_hours as f64).floor() as i64;
        t_idx = t_idx.rem_euclid(self.num_time.max(1) as i64);

        let lon_rel = ((lon - self.start_lon as f64) % 360.0 + 360.0) % 360.0;
        let lon_idx = ((lon_rel / self.lon_bin as f64) + 1e-9)
            .floor()
            .clamp(0.0, self.num_lon as f64 - 1.0) as i64;

        let lat_idx = if self.lat_bin > 0.0 {
            (((self.start_lat as f64 - lat) / self.lat_bin as f64) + 1e-9).floor()
        } else {
            (((lat - self.start_lat as f64) / self.lat_bin as f64) + 1e-9).floor()
        }
        .clamp(0.0, self.num_lat as f64 - 1.0) as i64;

        Ok(((t_idx as usize * self.num_lon as usize) + lon_idx as usize) * self.num_lat as usize + lat_idx as usize)
    }

    /// Nearest-bin lookup with the missing-value policy applied.
    pub fn value_at(&self, t_unix: i64, lon: f64, lat: f64) -> Result<f64, RouterError> {
        let idx = self.linear_index(t_unix, lon, lat)?;
        let raw = self.values.get(idx).copied().unwrap_or(f32::NAN) as f64;
        if !raw.is_finite() || raw < MISSING_SENTINEL {
            Ok(0.0)
        } else {
            Ok(raw)
        }
    }
}

/// Reads one `*.bin` weather file in the little-endian layout above.
pub fn read_weather_file(path: &Path) -> std::io::Result<WeatherDataInput> {
    let file = File::open(path)?;
    let mut r = BufReader::new(file);

    let start_time_unix = r.read_u32::<LittleEndian>()?;
    let num_time = r.read_u32::<LittleEndian>()?;
    let time_bin_hours = r.read_u32::<LittleEndian>()?;
    let start_lon = r.read_f32::<LittleEndian>()?;
    let num_lon = r.read_u32::<LittleEndian>()?;
    let lon_bin = r.read_f32::<LittleEndian>()?;
    let start_lat = r.read_f32::<LittleEndian>()?;
    let num_lat = r.read_u32::<LittleEndian>()?;
    let lat_bin = r.read_f32::<LittleEndian>()?;

    let expected = num_time as usize * num_lon as usize * num_lat as usize;
    let mut values = Vec::with_capacity(expected);
    let mut buf = [0u8; 4];
    loop {
        match r.read_exact(&mut buf) {
            Ok(()) => values.push(f32::from_le_bytes(buf)),
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
            Err(e) => return Err(e),
        }
    }

    Ok(WeatherDataInput {
        start_time_unix,
        num_time,
        time_bin_hours,
        start_lon,
        num_lon,
        lon_bin,
        start_lat,
        num_lat,
        lat_bin,
        values,
    })
}

/// A fully-resolved weather snapshot at one `(t, lat, lon)` query.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Weather {
    pub wind_dir_deg: f64,
    pub wind_spd_mps: f64,
    pub current_dir_deg: f64,
    pub current_spd_mps: f64,
    pub wave_dir_deg: f64,
    pub wave_height_m: f64,
    pub wave_period_s: f64,
}

impl Weather {
    pub fn zero() -> Self {
        Self {
            wind_dir_deg: 0.0,
            wind_spd_mps: 0.0,
            current_dir_deg: 0.0,
            current_spd_mps: 0.0,
            wave_dir_deg: 0.0,
            wave_height_m: 0.0,
            wave_period_s: 0.0,
        }
    }
}

/// Loaded weather tables, one per named variable. A missing file leaves its
/// slot `None` and every lookup against it returns `0.0` instead of
/// propagating an error.
#[derive(Debug, Clone, Default)]
pub struct WeatherStore {
    wind_dir: Option<WeatherDataInput>,
    wind_spd: Option<WeatherDataInput>,
    curr_dir: Option<WeatherDataInput>,
    curr_spd: Option<WeatherDataInput>,
    wave_dir: Option<WeatherDataInput>,
    wave_hgt: Option<WeatherDataInput>,
    wave_prd: Option<WeatherDataInput>,
}

const VARIABLE_FILES: [&str; 7] =
    ["WindDir.bin", "WindSpd.bin", "CurrDir.bin", "CurrSpd.bin", "WaveDir.bin", "WaveHgt.bin", "WavePrd.bin"];

impl WeatherStore {
    /// Loads the seven named files from `dir`. A missing file is logged and
    /// the corresponding variable contributes `0.0` to every lookup; this
    /// never fails the load itself.
    pub fn load(dir: &Path) -> Self {
        let mut store = Self::default();
        for name in VARIABLE_FILES {
            let path = dir.join(name);
            match read_weather_file(&path) {
                Ok(table) => store.set(name, table),
                Err(e) => warn!("weather file {:?} unavailable ({}); variable defaults to 0.0", path, e),
            }
        }
        store
    }

    /// Resolves the weather directory from an explicit path or the
    /// `WEATHER_DATA_PATH` environment variable, then loads it. Returns an
    /// empty store (every variable contributing `0.0`) if neither is set.
    pub fn load_from_dir_or_env(dir: Option<&Path>) -> Self {
        match dir {
            Some(d) => Self::load(d),
            None => match std::env::var(WEATHER_DATA_PATH_ENV) {
                Ok(v) => Self::load(Path::new(&v)),
                Err(_) => {
                    warn!("no weather directory given and {WEATHER_DATA_PATH_ENV} is unset; all weather fields default to 0.0");
                    Self::default()
                }
            },
        }
    }

    fn set(&mut self, name: &str, table: WeatherDataInput) {
        match name {
            "WindDir.bin" => self.wind_dir = Some(table),
            "WindSpd.bin" => self.wind_spd = Some(table),
            "CurrDir.bin" => self.curr_dir = Some(table),
            "CurrSpd.bin" => self.curr_spd = Some(table),
            "WaveDir.bin" => self.wave_dir = Some(table),
            "WaveHgt.bin" => self.wave_hgt = Some(table),
            "WavePrd.bin" => self.wave_prd = Some(table),
            _ => unreachable!("unknown weather variable file {name}"),
        }
    }

    fn lookup(table: &Option<WeatherDataInput>, t_unix: i64, g: &GeoCoordinate) -> Result<f64, RouterError> {
        match table {
            Some(t) => t.value_at(t_unix, g.longitude, g.latitude),
            None => Ok(0.0),
        }
    }

    /// Assembles a [`Weather`] record from seven independent table lookups.
    pub fn query(&self, t_unix: i64, g: &GeoCoordinate) -> Result<Weather, RouterError> {
        Ok(Weather {
            wind_dir_deg: Self::lookup(&self.wind_dir, t_unix, g)?,
            wind_spd_mps: Self::lookup(&self.wind_spd, t_unix, g)?,
            current_dir_deg: Self::lookup(&self.curr_dir, t_unix, g)?,
            current_spd_mps: Self::lookup(&self.curr_spd, t_unix, g)?,
            wave_dir_deg: Self::lookup(&self.wave_dir, t_unix, g)?,
            wave_height_m: Self::lookup(&self.wave_hgt, t_unix, g)?,
            wave_period_s: Self::lookup(&self.wave_prd, t_unix, g)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(start_time: u32, num_time: u32, time_bin: u32) -> WeatherDataInput {
        WeatherDataInput {
            start_time_unix: start_time,
            num_time,
            time_bin_hours: time_bin,
            start_lon: 0.0,
            num_lon: 4,
            lon_bin: 90.0,
            start_lat: 90.0,
            num_lat: 2,
            lat_bin: 90.0,
            values: (0..(num_time * 4 * 2)).map(|i| i as f32).collect(),
        }
    }

    #[test]
    fn time_query_at_start_yields_index_zero() {
        let t = table(1000, 3, 1);
        let v0 = t.value_at(1000, 0.0, 90.0).unwrap();
        let v_direct = t.values[0] as f64;
        assert_eq!(v0, v_direct);
    }

    #[test]
    fn negative_elapsed_fails() {
        let t = table(1000, 3, 1);
        assert_eq!(t.value_at(500, 0.0, 0.0), Err(RouterError::TimeBeforeRange));
    }

    #[test]
    fn longitude_wraps_without_branching() {
        let t = table(0, 1, 1);
        let a = t.value_at(0, 180.0, 0.0).unwrap();
        let b = t.value_at(0, -180.0, 0.0).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn missing_sentinel_reads_as_zero() {
        let mut t = table(0, 1, 1);
        t.values[0] = -9999.0;
        assert_eq!(t.value_at(0, 0.0, 90.0).unwrap(), 0.0);
    }

    #[test]
    fn non_finite_reads_as_zero() {
        let mut t = table(0, 1, 1);
        t.values[0] = f32::NAN;
        assert_eq!(t.value_at(0, 0.0, 90.0).unwrap(), 0.0);
    }

    #[test]
    fn empty_store_is_all_zero() {
        let store = WeatherStore::default();
        let g = GeoCoordinate::new(10.0, 20.0);
        let w = store.query(0, &g).unwrap();
        assert_eq!(w, Weather::zero());
    }
}
