//! Latency-driven heartbeat pacing.

use std::time::Duration;

use tracing::trace;

use crate::config::HeartbeatConfig;
use crate::error::ConfigError;

/// Round-trips slower than this stretch the interval.
pub const SLOW_RTT_SECONDS: f64 = 2.0;
/// Round-trips faster than this shrink the interval.
pub const FAST_RTT_SECONDS: f64 = 0.5;
pub const SLOW_DOWN_FACTOR: f64 = 1.2;
pub const SPEED_UP_FACTOR: f64 = 0.9;

/// Computes the interval that follows `previous` after observing `rtt`.
///
/// A missing, negative or non-finite round-trip leaves the interval as is.
/// The result always lies in `[min, max]`.
pub fn next_interval(previous: f64, rtt: Option<f64>, min: f64, max: f64) -> f64 {
    let next = match rtt {
        Some(rtt) if rtt.is_finite() && rtt >= 0.0 => {
            if rtt > SLOW_RTT_SECONDS {
                previous * SLOW_DOWN_FACTOR
            } else if rtt < FAST_RTT_SECONDS {
                previous * SPEED_UP_FACTOR
            } else {
                previous
            }
        }
        _ => previous,
    };
    next.clamp(min, max)
}

/// Owns the heartbeat interval for the life of a session.
#[derive(Debug, Clone)]
pub struct AdaptivePacer {
    config: HeartbeatConfig,
}

impl AdaptivePacer {
    /// Starts at the base interval.
    pub fn new(mut config: HeartbeatConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        config.current_interval_seconds = config.base_interval_seconds;
        Ok(Self { config })
    }

    pub fn current_interval_seconds(&self) -> f64 {
        self.config.current_interval_seconds
    }

    pub fn current_interval(&self) -> Duration {
        Duration::from_secs_f64(self.config.current_interval_seconds)
    }

    pub fn config(&self) -> &HeartbeatConfig {
        &self.config
    }

    /// Feeds one round-trip measurement. `None` means it failed.
    pub fn observe(&mut self, rtt: Option<Duration>) -> f64 {
        let rtt = rtt.map(|d| d.as_secs_f64());
        self.apply(rtt)
    }

    /// Same as [`AdaptivePacer::observe`] for a measurement in seconds.
    pub fn observe_seconds(&mut self, rtt: Option<f64>) -> f64 {
        self.apply(rtt)
    }

    /// Slows down as if the last round-trip had been slow.
    pub fn back_off(&mut self) -> f64 {
        let c = &mut self.config;
        c.current_interval_seconds = (c.current_interval_seconds * SLOW_DOWN_FACTOR)
            .clamp(c.min_interval_seconds, c.max_interval_seconds);
        c.current_interval_seconds
    }

    fn apply(&mut self, rtt: Option<f64>) -> f64 {
        let c = &mut self.config;
        let previous = c.current_interval_seconds;
        c.current_interval_seconds = next_interval(
            previous,
            rtt,
            c.min_interval_seconds,
            c.max_interval_seconds,
        );
        trace!(
            rtt = ?rtt,
            previous,
            next = c.current_interval_seconds,
            "heartbeat interval updated"
        );
        c.current_interval_seconds
    }
}
