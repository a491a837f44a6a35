//! Sequential submission of a synthesized trajectory.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::submitter::{SubmitStatus, Submitter};
use crate::config::{HeartbeatConfig, PathConfig, SessionConfig, TrackConfig};
use crate::error::{
    AbortReason, ConfigError, FailureKind, GeometryError, SessionError, SubmissionFailure,
};
use crate::pacer::AdaptivePacer;
use crate::trajectory::{Sample, TrajectorySynthesizer, format_elapsed};

/// How a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SessionOutcome {
    Completed,
    Aborted(AbortReason),
}

/// Progress reported to the caller, complete or partial.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionResult {
    pub session_id: Uuid,
    /// Cumulative distance of the last accepted sample, in meters.
    pub total_distance: f64,
    /// Trajectory time of the last accepted sample, in seconds.
    pub elapsed_seconds: f64,
    /// Wall-clock duration of the session.
    pub wall_seconds: f64,
    /// Samples the collaborator accepted.
    pub sample_count: usize,
    /// Samples given up on after their retry failed.
    pub dropped_samples: usize,
    pub outcome: SessionOutcome,
}

/// Builder for [`SessionDriver`].
#[derive(Debug, Clone)]
pub struct SessionDriverBuilder {
    target_m: f64,
    pace_mps: f64,
    track: TrackConfig,
    heartbeat: HeartbeatConfig,
    path: PathConfig,
    seed: Option<u64>,
    failure_threshold: u32,
    max_distance_m: f64,
}

impl SessionDriverBuilder {
    pub fn track(mut self, track: TrackConfig) -> Self {
        self.track = track;
        self
    }

    pub fn heartbeat(mut self, heartbeat: HeartbeatConfig) -> Self {
        self.heartbeat = heartbeat;
        self
    }

    pub fn path(mut self, path: PathConfig) -> Self {
        self.path = path;
        self
    }

    /// Fixes the random seed so the session is reproducible.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = threshold;
        self
    }

    pub fn max_distance(mut self, meters: f64) -> Self {
        self.max_distance_m = meters;
        self
    }

    /// Validates everything up front. Nothing is submitted on error.
    pub fn build(mut self) -> Result<SessionDriver, SessionError> {
        if self.failure_threshold == 0 {
            return Err(ConfigError::InvalidThreshold.into());
        }
        let pacer = AdaptivePacer::new(self.heartbeat.clone())?;
        if self.target_m > self.max_distance_m {
            return Err(GeometryError::Unreachable {
                target: self.target_m,
                limit: self.max_distance_m,
            }
            .into());
        }

        // Roughly one waypoint per heartbeat at the target pace.
        self.path
            .sample_spacing_meters
            .get_or_insert(self.pace_mps * self.heartbeat.base_interval_seconds);

        let seed = self.seed.unwrap_or_else(|| rand::thread_rng().r#gen());
        let synthesizer = TrajectorySynthesizer::new(
            self.target_m,
            self.pace_mps,
            &self.path,
            &self.track,
            seed,
        )?;

        Ok(SessionDriver {
            session_id: Uuid::new_v4(),
            seed,
            synthesizer,
            pacer,
            failure_threshold: self.failure_threshold,
        })
    }
}

/// Streams one trajectory to a [`Submitter`], pacing by observed latency.
pub struct SessionDriver {
    session_id: Uuid,
    seed: u64,
    synthesizer: TrajectorySynthesizer,
    pacer: AdaptivePacer,
    failure_threshold: u32,
}

impl SessionDriver {
    pub const DEFAULT_FAILURE_THRESHOLD: u32 = 3;
    pub const DEFAULT_MAX_DISTANCE_M: f64 = 8000.0;

    pub fn builder(target_distance_meters: f64, target_pace_mps: f64) -> SessionDriverBuilder {
        SessionDriverBuilder {
            target_m: target_distance_meters,
            pace_mps: target_pace_mps,
            track: TrackConfig::default(),
            heartbeat: HeartbeatConfig::default(),
            path: PathConfig::default(),
            seed: None,
            failure_threshold: Self::DEFAULT_FAILURE_THRESHOLD,
            max_distance_m: Self::DEFAULT_MAX_DISTANCE_M,
        }
    }

    /// Builds a driver from a stored configuration.
    ///
    /// With `randomize_track` set, center and rotation offsets are drawn
    /// from the session seed, so a fixed seed still reproduces the session.
    pub fn from_config(config: &SessionConfig) -> Result<Self, SessionError> {
        config.validate()?;

        let seed = config.seed.unwrap_or_else(|| rand::thread_rng().r#gen());
        let mut rng = StdRng::seed_from_u64(seed);
        let track = if config.randomize_track {
            config.track.clone().randomized(&mut rng)
        } else {
            config.track.clone()
        };

        Self::builder(config.target_distance_meters, config.target_pace_mps())
            .track(track)
            .heartbeat(config.heartbeat.clone())
            .path(config.path.clone())
            .seed(rng.r#gen())
            .failure_threshold(config.failure_threshold)
            .max_distance(config.max_distance_meters)
            .build()
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn synthesizer(&self) -> &TrajectorySynthesizer {
        &self.synthesizer
    }

    pub fn pacer(&self) -> &AdaptivePacer {
        &self.pacer
    }

    /// Runs the session to completion, abort or cancellation.
    ///
    /// Samples go out strictly in order, each after the previous one's
    /// round-trip has been fed to the pacer. A failed sample is retried
    /// once and then dropped, except the final one, which is retried until
    /// it succeeds or the failure threshold aborts the session.
    /// Cancellation interrupts the wait before a submission; a submission
    /// already in flight is allowed to finish and the session stops before
    /// the next one.
    pub async fn run<S>(
        &mut self,
        submitter: &mut S,
        cancel: &CancellationToken,
    ) -> Result<SessionResult, SessionError>
    where
        S: Submitter + ?Sized,
    {
        info!(
            session_id = %self.session_id,
            target_m = self.synthesizer.target_distance(),
            pace_mps = self.synthesizer.pace().base_speed(),
            spacing_m = self.synthesizer.geometry().spacing(),
            shape = ?self.synthesizer.geometry().shape(),
            "Starting session"
        );

        let mut progress = Progress::new(self.session_id);
        let mut consecutive_failures = 0u32;
        let mut last_failure: Option<SubmissionFailure> = None;

        let target_m = self.synthesizer.target_distance();
        for sample in self.synthesizer.trajectory() {
            let is_final = sample.cumulative_distance >= target_m;
            let mut attempt = 1u32;
            loop {
                if cancel.is_cancelled() {
                    return Err(progress.abort(AbortReason::Cancelled, &sample, last_failure));
                }

                let wait = self.pacer.current_interval();
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        info!(session_id = %self.session_id, index = sample.index, "Session cancelled");
                        return Err(progress.abort(AbortReason::Cancelled, &sample, last_failure));
                    }
                    _ = tokio::time::sleep(wait) => {}
                }

                let sent = Instant::now();
                let result = submitter.submit(&sample).await;
                let rtt = sent.elapsed();

                let failure = match result {
                    Ok(response) => match response.status {
                        SubmitStatus::RateLimited => {
                            // Back-off replaces the latency rule for this round-trip.
                            self.pacer.back_off();
                            Some(FailureKind::RateLimited)
                        }
                        status => {
                            self.pacer.observe(Some(rtt));
                            (status == SubmitStatus::Failure)
                                .then(|| FailureKind::Rejected(response.message))
                        }
                    },
                    Err(e) => {
                        self.pacer.observe(None);
                        Some(FailureKind::Transport(e.to_string()))
                    }
                };

                let Some(kind) = failure else {
                    consecutive_failures = 0;
                    progress.accept(&sample);
                    debug!(
                        index = sample.index,
                        distance_m = sample.cumulative_distance,
                        rtt_ms = rtt.as_millis() as u64,
                        next_interval_s = self.pacer.current_interval_seconds(),
                        "Sample accepted"
                    );
                    break;
                };

                consecutive_failures += 1;
                let failure = SubmissionFailure {
                    sample_index: sample.index,
                    cumulative_distance: sample.cumulative_distance,
                    attempt,
                    kind,
                };
                warn!(
                    session_id = %self.session_id,
                    consecutive = consecutive_failures,
                    "{failure}"
                );
                last_failure = Some(failure);

                if consecutive_failures >= self.failure_threshold {
                    let reason = AbortReason::ConsecutiveFailures {
                        count: consecutive_failures,
                    };
                    return Err(progress.abort(reason, &sample, last_failure));
                }
                // The final sample carries the target distance and is never given up on.
                if attempt == 1 || is_final {
                    attempt += 1;
                    continue;
                }
                progress.dropped += 1;
                break;
            }
        }

        let result = progress.finish(SessionOutcome::Completed);
        info!(
            session_id = %self.session_id,
            distance_m = result.total_distance,
            elapsed = %format_elapsed(result.elapsed_seconds),
            samples = result.sample_count,
            dropped = result.dropped_samples,
            "Session completed"
        );
        Ok(result)
    }
}

/// Runs a session with default path settings and a random seed.
pub async fn run_session<S>(
    submitter: &mut S,
    target_distance_meters: f64,
    target_pace_mps: f64,
    track_config: TrackConfig,
    heartbeat_config: HeartbeatConfig,
    cancel: CancellationToken,
) -> Result<SessionResult, SessionError>
where
    S: Submitter + ?Sized,
{
    SessionDriver::builder(target_distance_meters, target_pace_mps)
        .track(track_config)
        .heartbeat(heartbeat_config)
        .build()?
        .run(submitter, &cancel)
        .await
}

struct Progress {
    session_id: Uuid,
    started: Instant,
    last_accepted: Option<Sample>,
    accepted: usize,
    dropped: usize,
}

impl Progress {
    fn new(session_id: Uuid) -> Self {
        Self {
            session_id,
            started: Instant::now(),
            last_accepted: None,
            accepted: 0,
            dropped: 0,
        }
    }

    fn accept(&mut self, sample: &Sample) {
        self.last_accepted = Some(*sample);
        self.accepted += 1;
    }

    fn finish(&self, outcome: SessionOutcome) -> SessionResult {
        let (total_distance, elapsed_seconds) = self
            .last_accepted
            .map_or((0.0, 0.0), |s| (s.cumulative_distance, s.timestamp));
        SessionResult {
            session_id: self.session_id,
            total_distance,
            elapsed_seconds,
            wall_seconds: self.started.elapsed().as_secs_f64(),
            sample_count: self.accepted,
            dropped_samples: self.dropped,
            outcome,
        }
    }

    fn abort(
        &self,
        reason: AbortReason,
        current: &Sample,
        last_failure: Option<SubmissionFailure>,
    ) -> SessionError {
        let partial = self.finish(SessionOutcome::Aborted(reason));
        SessionError::Aborted {
            reason,
            sample_index: current.index,
            cumulative_distance: partial.total_distance,
            last_failure,
            partial,
        }
    }
}
