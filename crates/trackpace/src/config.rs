//! Configuration types for simulated sessions.

use std::path::Path;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::frame::LatLon;

/// Shape of the idealized path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PathShape {
    /// Closed stadium loop, wrapped as many laps as needed.
    #[default]
    Track,
    /// Open path with a procedurally drifting heading.
    Random,
}

/// Per-session randomization of the path and the samples.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackConfig {
    /// Whether spatial jitter is applied to waypoints.
    pub noise_enabled: bool,
    /// Maximum jitter per local axis in meters.
    pub noise_range_meters: f64,
    /// Half-width of the per-sample speed factor, e.g. 0.05 for ±5%.
    pub speed_variation_fraction: f64,
    /// Distance the path center is moved from the configured center.
    pub center_offset_meters: f64,
    /// Added to the path's base rotation.
    pub rotation_offset_degrees: f64,
    /// Whether the runner wanders between lanes on the closed loop.
    pub lane_drift_enabled: bool,
}

impl Default for TrackConfig {
    fn default() -> Self {
        Self {
            noise_enabled: true,
            noise_range_meters: 1.5,
            speed_variation_fraction: 0.05,
            center_offset_meters: 0.0,
            rotation_offset_degrees: 0.0,
            lane_drift_enabled: true,
        }
    }
}

impl TrackConfig {
    /// Largest center offset drawn by [`TrackConfig::randomized`].
    pub const MAX_RANDOM_CENTER_OFFSET_M: f64 = 8.0;
    /// Largest rotation offset drawn by [`TrackConfig::randomized`].
    pub const MAX_RANDOM_ROTATION_DEG: f64 = 6.0;

    /// A configuration with noise, lane drift and pace variation switched off.
    pub fn deterministic() -> Self {
        Self {
            noise_enabled: false,
            speed_variation_fraction: 0.0,
            lane_drift_enabled: false,
            ..Default::default()
        }
    }

    /// Draws fresh center and rotation offsets, keeping everything else.
    pub fn randomized(self, rng: &mut impl Rng) -> Self {
        Self {
            center_offset_meters: rng.gen_range(0.0..Self::MAX_RANDOM_CENTER_OFFSET_M),
            rotation_offset_degrees: rng
                .gen_range(-Self::MAX_RANDOM_ROTATION_DEG..Self::MAX_RANDOM_ROTATION_DEG),
            ..self
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.noise_enabled {
            ConfigError::check_positive("noise_range_meters", self.noise_range_meters)?;
        }
        let v = self.speed_variation_fraction;
        if !v.is_finite() {
            return Err(ConfigError::NotFinite {
                field: "speed_variation_fraction",
                value: v,
            });
        }
        if !(0.0..1.0).contains(&v) {
            return Err(ConfigError::OutOfRange {
                field: "speed_variation_fraction",
                value: v,
                min: 0.0,
                max: 1.0,
            });
        }
        if !self.center_offset_meters.is_finite() || self.center_offset_meters < 0.0 {
            return Err(ConfigError::OutOfRange {
                field: "center_offset_meters",
                value: self.center_offset_meters,
                min: 0.0,
                max: f64::INFINITY,
            });
        }
        if !self.rotation_offset_degrees.is_finite() {
            return Err(ConfigError::NotFinite {
                field: "rotation_offset_degrees",
                value: self.rotation_offset_degrees,
            });
        }
        Ok(())
    }
}

/// Heartbeat interval state, owned by the pacer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeartbeatConfig {
    pub base_interval_seconds: f64,
    pub min_interval_seconds: f64,
    pub max_interval_seconds: f64,
    /// Recomputed after every round-trip. Starts at the base interval.
    #[serde(skip)]
    pub current_interval_seconds: f64,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self::new(1.0, 0.8, 3.0)
    }
}

impl HeartbeatConfig {
    pub fn new(base: f64, min: f64, max: f64) -> Self {
        Self {
            base_interval_seconds: base,
            min_interval_seconds: min,
            max_interval_seconds: max,
            current_interval_seconds: base,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        ConfigError::check_positive("min_interval_seconds", self.min_interval_seconds)?;
        ConfigError::check_positive("max_interval_seconds", self.max_interval_seconds)?;
        ConfigError::check_positive("base_interval_seconds", self.base_interval_seconds)?;

        let (min, max) = (self.min_interval_seconds, self.max_interval_seconds);
        if min > max {
            return Err(ConfigError::IntervalBounds { min, max });
        }
        let base = self.base_interval_seconds;
        if base < min || base > max {
            return Err(ConfigError::BaseOutsideBounds { base, min, max });
        }
        Ok(())
    }
}

/// Axis-aligned rectangle the path center must fall inside.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoFence {
    pub name: String,
    pub south: f64,
    pub north: f64,
    pub west: f64,
    pub east: f64,
}

impl GeoFence {
    pub fn new(name: impl Into<String>, south: f64, north: f64, west: f64, east: f64) -> Self {
        Self {
            name: name.into(),
            south,
            north,
            west,
            east,
        }
    }

    /// Strict containment; points on the border are outside.
    pub fn contains(&self, point: &LatLon) -> bool {
        self.south < point.lat
            && point.lat < self.north
            && self.west < point.lon
            && point.lon < self.east
    }
}

/// Where and how the path is laid out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathConfig {
    pub shape: PathShape,
    /// Nominal perimeter of one lap of the closed loop.
    pub lap_length_meters: f64,
    pub center: LatLon,
    /// Orientation of the loop's long axis before the session offset.
    pub base_rotation_degrees: f64,
    /// Distance between consecutive waypoints. Derived from pace and the
    /// base heartbeat interval when unset.
    pub sample_spacing_meters: Option<f64>,
    /// Random paths steer back toward the center beyond this radius.
    pub wander_radius_meters: f64,
    /// Allowed areas for the center. Empty means unrestricted.
    pub geo_fences: Vec<GeoFence>,
}

impl PathConfig {
    /// Whether `center` lies inside at least one configured fence.
    pub fn center_is_fenced(&self) -> bool {
        self.geo_fences.is_empty() || self.geo_fences.iter().any(|f| f.contains(&self.center))
    }
}

impl Default for PathConfig {
    fn default() -> Self {
        Self {
            shape: PathShape::Track,
            lap_length_meters: 400.0,
            // Campus stadium infield
            center: LatLon::new(31.3190935, 121.3931965),
            base_rotation_degrees: 90.0,
            sample_spacing_meters: None,
            wander_radius_meters: 300.0,
            geo_fences: Vec::new(),
        }
    }
}

/// Everything needed to run one session, as stored on disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub target_distance_meters: f64,
    /// Target pace in minutes per kilometer.
    pub pace_min_per_km: f64,
    /// Hard cap on the target distance.
    pub max_distance_meters: f64,
    /// Consecutive failed submissions that abort the session.
    pub failure_threshold: u32,
    /// Fixed seed for reproducible sessions. Random when unset.
    pub seed: Option<u64>,
    /// Draw fresh center/rotation offsets at session start.
    pub randomize_track: bool,
    pub path: PathConfig,
    pub track: TrackConfig,
    pub heartbeat: HeartbeatConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            target_distance_meters: 5000.0,
            pace_min_per_km: 6.5,
            max_distance_meters: 8000.0,
            failure_threshold: 3,
            seed: None,
            randomize_track: true,
            path: PathConfig::default(),
            track: TrackConfig::default(),
            heartbeat: HeartbeatConfig::default(),
        }
    }
}

impl SessionConfig {
    /// Loads a configuration from a JSON file. Missing fields take defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let mut config: SessionConfig = serde_json::from_str(json)?;
        let hb = &mut config.heartbeat;
        hb.current_interval_seconds = hb.base_interval_seconds;
        Ok(config)
    }

    /// Applies `TRACKPACE_DISTANCE`, `TRACKPACE_PACE` and `TRACKPACE_SEED`.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(distance) = read_env("TRACKPACE_DISTANCE")? {
            self.target_distance_meters = distance;
        }
        if let Some(pace) = read_env("TRACKPACE_PACE")? {
            self.pace_min_per_km = pace;
        }
        if let Some(seed) = read_env("TRACKPACE_SEED")? {
            self.seed = Some(seed);
        }
        Ok(())
    }

    /// Target average speed in meters per second.
    pub fn target_pace_mps(&self) -> f64 {
        1000.0 / (self.pace_min_per_km * 60.0)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        ConfigError::check_positive("pace_min_per_km", self.pace_min_per_km)?;
        ConfigError::check_positive("max_distance_meters", self.max_distance_meters)?;
        if self.failure_threshold == 0 {
            return Err(ConfigError::InvalidThreshold);
        }
        self.track.validate()?;
        self.heartbeat.validate()
    }
}

fn read_env<T: std::str::FromStr>(var: &'static str) -> Result<Option<T>, ConfigError> {
    match std::env::var(var) {
        Ok(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Env { var, value }),
        Err(_) => Ok(None),
    }
}
