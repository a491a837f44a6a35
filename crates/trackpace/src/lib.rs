//! Synthetic running sessions.
//!
//! This crate generates plausible running trajectories (a jittered, paced
//! sequence of GPS samples covering a target distance) and streams them
//! sample by sample to a network collaborator, adapting the heartbeat
//! interval to the observed round-trip latency.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use trackpace::prelude::*;
//!
//! let mut submitter = LoopbackSubmitter::new(7);
//! let cancel = CancellationToken::new();
//!
//! let result = SessionDriver::builder(5000.0, 2.5)
//!     .track(TrackConfig::default())
//!     .heartbeat(HeartbeatConfig::new(1.0, 0.8, 3.0))
//!     .seed(42)
//!     .build()?
//!     .run(&mut submitter, &cancel)
//!     .await?;
//! ```

pub mod config;
pub mod error;
pub mod frame;
pub mod geometry;
pub mod gpx;
pub mod jitter;
pub mod pace;
pub mod pacer;
pub mod session;
pub mod trajectory;

pub mod prelude {
    //! Convenient re-exports for common usage.

    pub use crate::config::{
        GeoFence, HeartbeatConfig, PathConfig, PathShape, SessionConfig, TrackConfig,
    };
    pub use crate::error::{AbortReason, ConfigError, GeometryError, SessionError};
    pub use crate::frame::LatLon;
    pub use crate::geometry::{GeometryModel, TrackLayout, Waypoint};
    pub use crate::jitter::NoiseInjector;
    pub use crate::pace::PaceProfile;
    pub use crate::pacer::{AdaptivePacer, next_interval};
    pub use crate::session::{
        LoopbackSubmitter, SessionDriver, SessionOutcome, SessionResult, SubmitError,
        SubmitResponse, SubmitStatus, Submitter, run_session,
    };
    pub use crate::trajectory::{Sample, TrajectoryStats, TrajectorySynthesizer};
    pub use tokio_util::sync::CancellationToken;
}
