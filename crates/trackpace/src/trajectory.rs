//! Trajectory synthesis.
//!
//! Combines the path geometry, spatial jitter and pace profile into the
//! ordered [`Sample`]s a session submits.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{PathConfig, TrackConfig};
use crate::error::{ConfigError, GeometryError, SessionError};
use crate::frame::LatLon;
use crate::geometry::{GeometryModel, Walk};
use crate::jitter::NoiseInjector;
use crate::pace::{MAX_DURATION_DRIFT, PaceProfile};

/// Seconds of running between waypoints when no spacing is configured.
pub const DEFAULT_SAMPLE_SECONDS: f64 = 1.0;

/// A final, jittered and paced position record.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub index: usize,
    pub latitude: f64,
    pub longitude: f64,
    /// Seconds since session start.
    pub timestamp: f64,
    /// Meters per second.
    pub instantaneous_speed: f64,
    /// Meters covered up to and including this sample.
    pub cumulative_distance: f64,
}

impl Sample {
    pub fn position(&self) -> LatLon {
        LatLon::new(self.latitude, self.longitude)
    }
}

/// Builds reproducible trajectories for one session.
#[derive(Debug, Clone)]
pub struct TrajectorySynthesizer {
    geometry: GeometryModel,
    injector: NoiseInjector,
    pace: PaceProfile,
    target_m: f64,
    jitter_seed: u64,
    pace_seed: u64,
    /// Applied to every timestamp so total time stays near nominal.
    time_scale: f64,
}

impl TrajectorySynthesizer {
    /// # Arguments
    /// * `target_m` - Total distance to cover in meters
    /// * `pace_mps` - Target average speed in m/s
    /// * `seed` - Source of all randomness; equal seeds give equal trajectories
    pub fn new(
        target_m: f64,
        pace_mps: f64,
        path: &PathConfig,
        track: &TrackConfig,
        seed: u64,
    ) -> Result<Self, SessionError> {
        if !target_m.is_finite() || target_m <= 0.0 {
            return Err(GeometryError::InvalidDistance(target_m).into());
        }
        ConfigError::check_positive("target_pace_mps", pace_mps)?;
        track.validate()?;

        // Independent streams so e.g. toggling noise leaves pace untouched.
        let mut seeds = StdRng::seed_from_u64(seed);
        let geometry_seed = seeds.r#gen();
        let jitter_seed = seeds.r#gen();
        let pace_seed = seeds.r#gen();

        let spacing = path
            .sample_spacing_meters
            .unwrap_or(pace_mps * DEFAULT_SAMPLE_SECONDS);
        let geometry = GeometryModel::new(path, track, spacing, geometry_seed)?;

        let mut synthesizer = Self {
            geometry,
            injector: NoiseInjector::new(track),
            pace: PaceProfile::new(pace_mps, track.speed_variation_fraction),
            target_m,
            jitter_seed,
            pace_seed,
            time_scale: 1.0,
        };
        synthesizer.time_scale = synthesizer.measure_time_scale();
        Ok(synthesizer)
    }

    /// Runs the stream once unscaled and returns the factor that brings its
    /// total time back to nominal, or 1.0 when it drifted no more than
    /// [`MAX_DURATION_DRIFT`].
    fn measure_time_scale(&self) -> f64 {
        let Some(last) = self.trajectory().last() else {
            return 1.0;
        };
        let drift = self.pace.duration_drift(self.target_m, last.timestamp);
        if drift.abs() <= MAX_DURATION_DRIFT {
            return 1.0;
        }
        let scale = 1.0 / (1.0 + drift);
        debug!("Rescaling trajectory timing by {scale:.4} (drift {drift:.3})");
        scale
    }

    pub fn geometry(&self) -> &GeometryModel {
        &self.geometry
    }

    pub fn pace(&self) -> &PaceProfile {
        &self.pace
    }

    pub fn target_distance(&self) -> f64 {
        self.target_m
    }

    /// Factor applied to raw segment times, 1.0 unless the raw stream
    /// drifted more than [`MAX_DURATION_DRIFT`] from nominal.
    pub fn time_scale(&self) -> f64 {
        self.time_scale
    }

    /// A fresh lazy trajectory. Every call yields the same sequence, with
    /// timing already corrected by [`TrajectorySynthesizer::time_scale`].
    pub fn trajectory(&self) -> Trajectory {
        Trajectory {
            walk: self.geometry.walk(),
            injector: self.injector.clone(),
            pace: self.pace.clone(),
            jitter_rng: StdRng::seed_from_u64(self.jitter_seed),
            pace_rng: StdRng::seed_from_u64(self.pace_seed),
            target_m: self.target_m,
            time_scale: self.time_scale,
            prev: None,
            done: false,
        }
    }

    /// Collects the whole trajectory.
    pub fn synthesize(&self) -> Vec<Sample> {
        self.trajectory().collect()
    }
}

/// Lazy, finite sample stream produced by [`TrajectorySynthesizer::trajectory`].
pub struct Trajectory {
    walk: Walk,
    injector: NoiseInjector,
    pace: PaceProfile,
    jitter_rng: StdRng,
    pace_rng: StdRng,
    target_m: f64,
    time_scale: f64,
    prev: Option<Sample>,
    done: bool,
}

impl Iterator for Trajectory {
    type Item = Sample;

    fn next(&mut self) -> Option<Sample> {
        if self.done {
            return None;
        }

        let waypoint = self.walk.next()?;
        let pos = self.injector.apply(&waypoint, &mut self.jitter_rng);
        let speed = self.pace.sample_speed(&mut self.pace_rng) / self.time_scale;

        let sample = match self.prev {
            None => Sample {
                index: 0,
                latitude: pos.lat,
                longitude: pos.lon,
                timestamp: 0.0,
                instantaneous_speed: speed,
                cumulative_distance: 0.0,
            },
            Some(prev) => {
                let mut segment = prev.position().distance_to(&pos);
                let mut cumulative = prev.cumulative_distance + segment;
                if cumulative >= self.target_m {
                    // Hold position and speed, clip the distance.
                    segment = self.target_m - prev.cumulative_distance;
                    cumulative = self.target_m;
                    self.done = true;
                }
                Sample {
                    index: prev.index + 1,
                    latitude: pos.lat,
                    longitude: pos.lon,
                    timestamp: prev.timestamp + segment / speed,
                    instantaneous_speed: speed,
                    cumulative_distance: cumulative,
                }
            }
        };

        self.prev = Some(sample);
        Some(sample)
    }
}

impl std::iter::FusedIterator for Trajectory {}

/// Summary figures for a finished or partial trajectory.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrajectoryStats {
    /// Distance credited by the samples.
    pub total_distance: f64,
    /// Great-circle length of the polyline through the samples.
    pub path_length: f64,
    pub duration: f64,
    /// Meters per second.
    pub average_speed: f64,
    /// Minutes per kilometer.
    pub average_pace: f64,
    pub point_count: usize,
}

impl TrajectoryStats {
    pub fn from_samples(samples: &[Sample]) -> Option<Self> {
        let first = samples.first()?;
        let last = samples.last()?;

        let path_length = samples
            .windows(2)
            .map(|w| w[0].position().distance_to(&w[1].position()))
            .sum();
        let duration = last.timestamp - first.timestamp;
        let total_distance = last.cumulative_distance - first.cumulative_distance;
        let average_speed = if duration > 0.0 {
            total_distance / duration
        } else {
            0.0
        };
        let average_pace = if average_speed > 0.0 {
            1000.0 / (average_speed * 60.0)
        } else {
            0.0
        };

        Some(Self {
            total_distance,
            path_length,
            duration,
            average_speed,
            average_pace,
            point_count: samples.len(),
        })
    }
}

/// Formats seconds as `hh:mm:ss`. Negative or non-finite input gives zero.
pub fn format_elapsed(seconds: f64) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 {
        seconds.floor() as u64
    } else {
        0
    };
    format!(
        "{:02}:{:02}:{:02}",
        total / 3600,
        (total % 3600) / 60,
        total % 60
    )
}
