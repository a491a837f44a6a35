//! The network collaborator that receives samples.

use std::time::Duration;

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::OffsetDateTime;
use tracing::trace;

use crate::trajectory::Sample;

/// How the collaborator answered a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmitStatus {
    Success,
    Failure,
    RateLimited,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmitResponse {
    pub status: SubmitStatus,
    /// Server clock in milliseconds since the Unix epoch, when reported.
    pub server_timestamp: Option<i64>,
    pub message: Option<String>,
}

impl SubmitResponse {
    pub fn success() -> Self {
        Self {
            status: SubmitStatus::Success,
            server_timestamp: None,
            message: None,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            status: SubmitStatus::Failure,
            server_timestamp: None,
            message: Some(message.into()),
        }
    }

    pub fn rate_limited() -> Self {
        Self {
            status: SubmitStatus::RateLimited,
            server_timestamp: None,
            message: None,
        }
    }

    pub fn with_server_timestamp(mut self, millis: i64) -> Self {
        self.server_timestamp = Some(millis);
        self
    }
}

/// A submission that produced no response at all.
#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
    #[error("{0}")]
    Transport(String),
}

/// Accepts one sample per call. Timeouts are the implementor's job.
#[async_trait]
pub trait Submitter: Send {
    async fn submit(&mut self, sample: &Sample) -> Result<SubmitResponse, SubmitError>;
}

/// In-process collaborator with simulated latency and failures.
///
/// Used for dry runs and tests; records every sample it accepts.
pub struct LoopbackSubmitter {
    latency: Duration,
    latency_jitter: Duration,
    failure_probability: f64,
    rate_limit_probability: f64,
    timeout: Option<Duration>,
    rng: StdRng,
    accepted: Vec<Sample>,
}

impl LoopbackSubmitter {
    pub fn new(seed: u64) -> Self {
        Self {
            latency: Duration::from_millis(150),
            latency_jitter: Duration::from_millis(100),
            failure_probability: 0.0,
            rate_limit_probability: 0.0,
            timeout: None,
            rng: StdRng::seed_from_u64(seed),
            accepted: Vec::new(),
        }
    }

    /// Sets the base latency and the maximum random extra on top of it.
    pub fn with_latency(mut self, latency: Duration, jitter: Duration) -> Self {
        self.latency = latency;
        self.latency_jitter = jitter;
        self
    }

    /// Sets the probabilities of answering `Failure` and `RateLimited`.
    pub fn with_failures(mut self, failure: f64, rate_limited: f64) -> Self {
        self.failure_probability = failure.clamp(0.0, 1.0);
        self.rate_limit_probability = rate_limited.clamp(0.0, 1.0);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn accepted(&self) -> &[Sample] {
        &self.accepted
    }

    fn draw_latency(&mut self) -> Duration {
        let extra = self.latency_jitter.as_secs_f64();
        if extra > 0.0 {
            self.latency + Duration::from_secs_f64(self.rng.gen_range(0.0..extra))
        } else {
            self.latency
        }
    }
}

#[async_trait]
impl Submitter for LoopbackSubmitter {
    async fn submit(&mut self, sample: &Sample) -> Result<SubmitResponse, SubmitError> {
        let latency = self.draw_latency();
        let delay = tokio::time::sleep(latency);
        match self.timeout {
            Some(limit) => tokio::time::timeout(limit, delay)
                .await
                .map_err(|_| SubmitError::Timeout(limit))?,
            None => delay.await,
        }

        let roll: f64 = self.rng.r#gen();
        let response = if roll < self.failure_probability {
            SubmitResponse::failure("simulated rejection")
        } else if roll < self.failure_probability + self.rate_limit_probability {
            SubmitResponse::rate_limited()
        } else {
            self.accepted.push(*sample);
            let now_ms = (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64;
            SubmitResponse::success().with_server_timestamp(now_ms)
        };

        trace!(index = sample.index, ?latency, status = ?response.status, "loopback submit");
        Ok(response)
    }
}
