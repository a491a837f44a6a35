//! Per-sample running speed.

use rand::Rng;
use rand::distributions::{Distribution, Uniform};

/// Largest relative deviation of total elapsed time from the nominal
/// duration before a corrective rescale is applied.
pub const MAX_DURATION_DRIFT: f64 = 0.05;

/// Instantaneous speed around a target average.
///
/// Each sample's speed is `base × factor`, with the factor drawn
/// independently from `[1 − v, 1 + v]`. Elapsed time is derived from each
/// segment's own speed, so the total stays close to distance / base.
#[derive(Debug, Clone)]
pub struct PaceProfile {
    base_speed: f64,
    variation: f64,
    factor: Option<Uniform<f64>>,
}

impl PaceProfile {
    /// # Arguments
    /// * `base_speed` - Target average speed in m/s
    /// * `variation` - Half-width of the speed factor, in `[0, 1)`
    pub fn new(base_speed: f64, variation: f64) -> Self {
        let factor = (variation > 0.0)
            .then(|| Uniform::new_inclusive(1.0 - variation, 1.0 + variation));
        Self {
            base_speed,
            variation,
            factor,
        }
    }

    /// Profile for a pace given in minutes per kilometer (e.g. 6.5 for 6:30/km).
    pub fn with_pace(pace_min_per_km: f64, variation: f64) -> Self {
        Self::new(1000.0 / (pace_min_per_km * 60.0), variation)
    }

    pub fn base_speed(&self) -> f64 {
        self.base_speed
    }

    pub fn variation(&self) -> f64 {
        self.variation
    }

    /// Draws the next instantaneous speed in m/s.
    pub fn sample_speed(&self, rng: &mut impl Rng) -> f64 {
        match &self.factor {
            Some(factor) => self.base_speed * factor.sample(rng),
            None => self.base_speed,
        }
    }

    /// Duration of `distance_m` run at the base speed.
    pub fn nominal_duration(&self, distance_m: f64) -> f64 {
        distance_m / self.base_speed
    }

    /// Relative deviation of `elapsed_s` from the nominal duration.
    pub fn duration_drift(&self, distance_m: f64, elapsed_s: f64) -> f64 {
        let nominal = self.nominal_duration(distance_m);
        if nominal > 0.0 {
            (elapsed_s - nominal) / nominal
        } else {
            0.0
        }
    }
}
