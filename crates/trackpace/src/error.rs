//! Error types for trajectory synthesis and session driving.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::session::SessionResult;

/// Invalid distance-versus-path configuration. Always fatal.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GeometryError {
    #[error("target distance must be a positive finite number of meters, got {0}")]
    InvalidDistance(f64),

    #[error("lap length must be a positive finite number of meters, got {0}")]
    InvalidLapLength(f64),

    #[error("sample spacing must be a positive finite number of meters, got {0}")]
    InvalidSpacing(f64),

    #[error("target distance {target:.0} m exceeds the session limit of {limit:.0} m")]
    Unreachable { target: f64, limit: f64 },

    #[error("path center ({lat:.6}, {lon:.6}) is outside every configured geo-fence")]
    OutsideGeoFence { lat: f64, lon: f64 },
}

/// Invalid configuration values, detected before the sample loop starts.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{field} must be finite, got {value}")]
    NotFinite { field: &'static str, value: f64 },

    #[error("{field} must be positive, got {value}")]
    NotPositive { field: &'static str, value: f64 },

    #[error("{field} must be within [{min}, {max}), got {value}")]
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("minimum interval {min}s is greater than maximum interval {max}s")]
    IntervalBounds { min: f64, max: f64 },

    #[error("base interval {base}s lies outside [{min}s, {max}s]")]
    BaseOutsideBounds { base: f64, min: f64, max: f64 },

    #[error("failure threshold must be at least 1")]
    InvalidThreshold,

    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid value for {var}: {value:?}")]
    Env { var: &'static str, value: String },
}

impl ConfigError {
    pub(crate) fn check_positive(field: &'static str, value: f64) -> Result<(), ConfigError> {
        if !value.is_finite() {
            return Err(ConfigError::NotFinite { field, value });
        }
        if value <= 0.0 {
            return Err(ConfigError::NotPositive { field, value });
        }
        Ok(())
    }
}

/// What went wrong with a single submission attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum FailureKind {
    /// The collaborator answered but refused the sample.
    Rejected(Option<String>),
    /// The collaborator asked us to slow down.
    RateLimited,
    /// The request never produced a response (network error, timeout).
    Transport(String),
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::Rejected(Some(msg)) => write!(f, "rejected: {msg}"),
            FailureKind::Rejected(None) => write!(f, "rejected"),
            FailureKind::RateLimited => write!(f, "rate limited"),
            FailureKind::Transport(msg) => write!(f, "transport error: {msg}"),
        }
    }
}

/// A single failed submission. Absorbed by the driver and retried once.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("sample {sample_index} ({cumulative_distance:.1} m) attempt {attempt} failed: {kind}")]
pub struct SubmissionFailure {
    pub sample_index: usize,
    pub cumulative_distance: f64,
    pub attempt: u32,
    pub kind: FailureKind,
}

/// Why a session ended before its final sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AbortReason {
    /// Too many submissions failed in a row.
    ConsecutiveFailures { count: u32 },
    /// The caller raised the stop signal.
    Cancelled,
}

impl fmt::Display for AbortReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AbortReason::ConsecutiveFailures { count } => {
                write!(f, "{count} consecutive submission failures")
            }
            AbortReason::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Errors propagated to the caller of a session.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("invalid configuration: {0}")]
    Configuration(#[from] ConfigError),

    #[error("invalid path: {0}")]
    Geometry(#[from] GeometryError),

    #[error(
        "session aborted at sample {sample_index} after {cumulative_distance:.1} m: {reason}"
    )]
    Aborted {
        reason: AbortReason,
        sample_index: usize,
        cumulative_distance: f64,
        last_failure: Option<SubmissionFailure>,
        partial: SessionResult,
    },
}

impl SessionError {
    /// Progress made before the error, if the sample loop was entered.
    pub fn partial_result(&self) -> Option<&SessionResult> {
        match self {
            SessionError::Aborted { partial, .. } => Some(partial),
            _ => None,
        }
    }
}
