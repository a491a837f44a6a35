//! Bounded spatial jitter.

use rand::Rng;
use rand::distributions::{Distribution, Uniform};

use crate::config::TrackConfig;
use crate::frame::LatLon;
use crate::geometry::Waypoint;

/// Perturbs ideal waypoints by a uniform offset of at most
/// `noise_range_meters` along each local axis.
#[derive(Debug, Clone)]
pub struct NoiseInjector {
    axis: Option<Uniform<f64>>,
}

impl NoiseInjector {
    pub fn new(config: &TrackConfig) -> Self {
        let axis = (config.noise_enabled && config.noise_range_meters > 0.0).then(|| {
            let r = config.noise_range_meters;
            Uniform::new_inclusive(-r, r)
        });
        Self { axis }
    }

    pub fn is_enabled(&self) -> bool {
        self.axis.is_some()
    }

    /// Returns the perturbed position of `waypoint`. Identity when disabled.
    pub fn apply(&self, waypoint: &Waypoint, rng: &mut impl Rng) -> LatLon {
        let ideal = waypoint.position();
        match &self.axis {
            Some(axis) => {
                let east = axis.sample(rng);
                let north = axis.sample(rng);
                ideal.offset_by(east, north)
            }
            None => ideal,
        }
    }
}
