//! End-to-end session tests against scripted collaborators.
//!
//! Time is paused, so heartbeat waits complete instantly while tokio's
//! clock still advances by the waited amount.

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use trackpace::prelude::*;

/// Replays a fixed list of outcomes, then succeeds forever.
struct ScriptedSubmitter {
    script: VecDeque<Result<SubmitResponse, SubmitError>>,
    latency: Duration,
    calls: Vec<usize>,
    cancel_after: Option<(usize, CancellationToken)>,
    /// Every submission of this index is rejected.
    reject_index: Option<usize>,
}

impl ScriptedSubmitter {
    fn new(script: Vec<Result<SubmitResponse, SubmitError>>) -> Self {
        Self {
            script: script.into(),
            latency: Duration::ZERO,
            calls: Vec::new(),
            cancel_after: None,
            reject_index: None,
        }
    }

    fn always_ok() -> Self {
        Self::new(Vec::new())
    }

    fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }
}

#[async_trait]
impl Submitter for ScriptedSubmitter {
    async fn submit(&mut self, sample: &Sample) -> Result<SubmitResponse, SubmitError> {
        self.calls.push(sample.index);
        if let Some((n, token)) = &self.cancel_after
            && self.calls.len() == *n
        {
            token.cancel();
        }
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        if self.reject_index == Some(sample.index) {
            return Ok(SubmitResponse::failure("rejected"));
        }
        self.script
            .pop_front()
            .unwrap_or_else(|| Ok(SubmitResponse::success()))
    }
}

fn failure() -> Result<SubmitResponse, SubmitError> {
    Ok(SubmitResponse::failure("nope"))
}

fn driver(target: f64, threshold: u32) -> SessionDriver {
    SessionDriver::builder(target, 2.5)
        .track(TrackConfig::deterministic())
        .heartbeat(HeartbeatConfig::new(1.0, 0.8, 3.0))
        .failure_threshold(threshold)
        .seed(1)
        .build()
        .unwrap()
}

#[tokio::test(start_paused = true)]
async fn test_completes_and_reports_totals() {
    let mut sub = ScriptedSubmitter::always_ok();
    let mut d = driver(100.0, 3);
    let expected = d.synthesizer().synthesize();

    let result = d.run(&mut sub, &CancellationToken::new()).await.unwrap();

    assert_eq!(result.outcome, SessionOutcome::Completed);
    assert_eq!(result.total_distance, 100.0);
    assert!((result.elapsed_seconds - 40.0).abs() < 1e-6);
    assert_eq!(result.sample_count, expected.len());
    assert_eq!(result.dropped_samples, 0);

    // Strictly ordered, each sample once
    let indices: Vec<usize> = (0..expected.len()).collect();
    assert_eq!(sub.calls, indices);
}

#[tokio::test(start_paused = true)]
async fn test_aborts_on_third_consecutive_failure() {
    let mut sub = ScriptedSubmitter::new((0..5).map(|_| failure()).collect());
    let err = driver(100.0, 3)
        .run(&mut sub, &CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(sub.calls.len(), 3);
    match err {
        SessionError::Aborted {
            reason,
            last_failure,
            partial,
            ..
        } => {
            assert_eq!(reason, AbortReason::ConsecutiveFailures { count: 3 });
            assert_eq!(last_failure.unwrap().attempt, 1);
            assert_eq!(partial.sample_count, 0);
            assert_eq!(partial.outcome, SessionOutcome::Aborted(reason));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test(start_paused = true)]
async fn test_single_failure_retries_same_sample() {
    let mut sub = ScriptedSubmitter::new(vec![Ok(SubmitResponse::success()), failure()]);
    let result = driver(20.0, 3)
        .run(&mut sub, &CancellationToken::new())
        .await
        .unwrap();

    // Sample 1 is sent twice, then the session moves on.
    assert_eq!(&sub.calls[..3], &[0, 1, 1]);
    assert_eq!(sub.calls[3], 2);
    assert_eq!(result.dropped_samples, 0);
    assert_eq!(result.total_distance, 20.0);
}

#[tokio::test(start_paused = true)]
async fn test_failed_retry_drops_sample_and_advances() {
    let mut sub = ScriptedSubmitter::new(vec![failure(), failure()]);
    let result = driver(20.0, 3)
        .run(&mut sub, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(&sub.calls[..3], &[0, 0, 1]);
    assert_eq!(result.dropped_samples, 1);
    assert_eq!(result.outcome, SessionOutcome::Completed);
}

#[tokio::test(start_paused = true)]
async fn test_final_sample_is_never_dropped() {
    let mut d = driver(20.0, 3);
    let last = d.synthesizer().synthesize().len() - 1;
    let mut sub = ScriptedSubmitter::always_ok();
    sub.reject_index = Some(last);

    let err = d.run(&mut sub, &CancellationToken::new()).await.unwrap_err();

    // Retried past the single retry until the threshold tripped.
    assert_eq!(sub.calls.iter().filter(|&&i| i == last).count(), 3);
    match err {
        SessionError::Aborted {
            reason,
            sample_index,
            last_failure,
            partial,
            ..
        } => {
            assert_eq!(reason, AbortReason::ConsecutiveFailures { count: 3 });
            assert_eq!(sample_index, last);
            assert_eq!(last_failure.unwrap().attempt, 3);
            assert!(partial.total_distance < 20.0);
            assert_eq!(partial.dropped_samples, 0);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test(start_paused = true)]
async fn test_final_sample_retried_until_accepted() {
    let mut d = driver(20.0, 3);
    let last = d.synthesizer().synthesize().len() - 1;
    let mut script: Vec<_> = (0..last).map(|_| Ok(SubmitResponse::success())).collect();
    script.push(failure());
    script.push(failure());
    let mut sub = ScriptedSubmitter::new(script);

    let result = d.run(&mut sub, &CancellationToken::new()).await.unwrap();

    assert_eq!(&sub.calls[last..], &[last, last, last]);
    assert_eq!(result.outcome, SessionOutcome::Completed);
    assert_eq!(result.total_distance, 20.0);
    assert_eq!(result.dropped_samples, 0);
}

#[tokio::test(start_paused = true)]
async fn test_wide_speed_variation_keeps_elapsed_near_nominal() {
    let mut d = SessionDriver::builder(2000.0, 2.5)
        .track(TrackConfig {
            speed_variation_fraction: 0.9,
            ..Default::default()
        })
        .heartbeat(HeartbeatConfig::new(1.0, 0.8, 3.0))
        .seed(4)
        .build()
        .unwrap();
    let mut sub = ScriptedSubmitter::always_ok();

    let result = d.run(&mut sub, &CancellationToken::new()).await.unwrap();

    let nominal = 2000.0 / 2.5;
    let drift = (result.elapsed_seconds - nominal) / nominal;
    assert!(drift.abs() <= 0.05, "drift {drift}");
    assert_eq!(result.total_distance, 2000.0);
}

#[tokio::test(start_paused = true)]
async fn test_transport_errors_count_as_failures() {
    let script = (0..3)
        .map(|_| Err(SubmitError::Timeout(Duration::from_secs(5))))
        .collect();
    let mut sub = ScriptedSubmitter::new(script);
    let err = driver(100.0, 3)
        .run(&mut sub, &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        SessionError::Aborted {
            reason: AbortReason::ConsecutiveFailures { count: 3 },
            ..
        }
    ));
}

#[tokio::test(start_paused = true)]
async fn test_cancel_before_start_submits_nothing() {
    let mut sub = ScriptedSubmitter::always_ok();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = driver(100.0, 3).run(&mut sub, &cancel).await.unwrap_err();

    assert!(sub.calls.is_empty());
    let partial = err.partial_result().unwrap();
    assert_eq!(partial.sample_count, 0);
    assert_eq!(partial.outcome, SessionOutcome::Aborted(AbortReason::Cancelled));
}

#[tokio::test(start_paused = true)]
async fn test_cancel_mid_submission_finishes_round_trip() {
    let cancel = CancellationToken::new();
    let mut sub = ScriptedSubmitter::always_ok().with_latency(Duration::from_millis(300));
    sub.cancel_after = Some((4, cancel.clone()));

    let err = driver(100.0, 3).run(&mut sub, &cancel).await.unwrap_err();

    // The fourth submission completed and counted; no fifth was sent.
    assert_eq!(sub.calls.len(), 4);
    match err {
        SessionError::Aborted {
            reason,
            sample_index,
            partial,
            ..
        } => {
            assert_eq!(reason, AbortReason::Cancelled);
            assert_eq!(sample_index, 4);
            assert_eq!(partial.sample_count, 4);
            assert!(partial.total_distance > 0.0);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test(start_paused = true)]
async fn test_cancel_during_wait() {
    let cancel = CancellationToken::new();
    let stopper = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(3500)).await;
        stopper.cancel();
    });

    let mut sub = ScriptedSubmitter::always_ok();
    let err = driver(100.0, 3).run(&mut sub, &cancel).await.unwrap_err();

    assert!(matches!(
        err,
        SessionError::Aborted {
            reason: AbortReason::Cancelled,
            ..
        }
    ));
    // Fast round-trips shrink the interval from 1.0s toward 0.8s
    assert!((3..=4).contains(&sub.calls.len()), "calls {}", sub.calls.len());
}

#[tokio::test(start_paused = true)]
async fn test_slow_round_trips_stretch_interval() {
    let mut sub = ScriptedSubmitter::always_ok().with_latency(Duration::from_millis(2500));
    let mut d = driver(10.0, 3);
    d.run(&mut sub, &CancellationToken::new()).await.unwrap();

    // Every round-trip was slow, so the interval only grew.
    assert!(d.pacer().current_interval_seconds() > 1.0);
    assert!(d.pacer().current_interval_seconds() <= 3.0);
}

#[tokio::test(start_paused = true)]
async fn test_rate_limit_backs_off() {
    let mut sub = ScriptedSubmitter::new(vec![Ok(SubmitResponse::rate_limited())])
        .with_latency(Duration::from_millis(1000));
    let mut d = SessionDriver::builder(2.0, 2.5)
        .track(TrackConfig::deterministic())
        .heartbeat(HeartbeatConfig::new(1.0, 0.8, 3.0))
        .seed(1)
        .build()
        .unwrap();

    let result = d.run(&mut sub, &CancellationToken::new()).await.unwrap();

    // Neutral round-trips leave the interval alone; only the back-off moved it.
    assert!((d.pacer().current_interval_seconds() - 1.2).abs() < 1e-9);
    assert_eq!(&sub.calls[..2], &[0, 0]);
    assert_eq!(result.total_distance, 2.0);
}

#[tokio::test(start_paused = true)]
async fn test_slow_rate_limited_reply_only_backs_off() {
    let mut sub = ScriptedSubmitter::new(vec![Ok(SubmitResponse::rate_limited())])
        .with_latency(Duration::from_millis(2500));
    let mut d = SessionDriver::builder(2.0, 2.5)
        .track(TrackConfig::deterministic())
        .heartbeat(HeartbeatConfig::new(1.0, 0.8, 3.0))
        .seed(1)
        .build()
        .unwrap();

    d.run(&mut sub, &CancellationToken::new()).await.unwrap();

    // Back-off, then two slow successes: 1.2 × 1.2 × 1.2.
    assert_eq!(sub.calls, vec![0, 0, 1]);
    assert!((d.pacer().current_interval_seconds() - 1.728).abs() < 1e-9);
}

#[tokio::test(start_paused = true)]
async fn test_run_session_with_loopback() {
    let mut sub = LoopbackSubmitter::new(3)
        .with_latency(Duration::from_millis(50), Duration::from_millis(50));
    let result = run_session(
        &mut sub,
        250.0,
        2.5,
        TrackConfig::default(),
        HeartbeatConfig::new(1.0, 0.8, 3.0),
        CancellationToken::new(),
    )
    .await
    .unwrap();

    assert_eq!(result.total_distance, 250.0);
    assert_eq!(sub.accepted().len(), result.sample_count);
    let accepted = sub.accepted();
    for w in accepted.windows(2) {
        assert!(w[1].timestamp > w[0].timestamp);
    }
}

#[tokio::test(start_paused = true)]
async fn test_invalid_config_never_submits() {
    let mut sub = ScriptedSubmitter::always_ok();
    let err = run_session(
        &mut sub,
        1000.0,
        2.5,
        TrackConfig {
            noise_range_meters: -2.0,
            ..Default::default()
        },
        HeartbeatConfig::default(),
        CancellationToken::new(),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, SessionError::Configuration(_)));
    assert!(sub.calls.is_empty());
}
