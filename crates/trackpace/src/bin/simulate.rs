//! Runs one session against the in-process loopback collaborator.
//!
//! Run with:
//! ```text
//! TRACKPACE_CONFIG=session.json cargo run -p trackpace --bin simulate
//! ```
//!
//! Ctrl+C stops the session before the next heartbeat.

use std::time::Duration;

use time::OffsetDateTime;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;
use trackpace::config::SessionConfig;
use trackpace::error::{AbortReason, SessionError};
use trackpace::gpx::generate_gpx;
use trackpace::session::{LoopbackSubmitter, SessionDriver, SessionResult};
use trackpace::trajectory::{TrajectoryStats, format_elapsed};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let mut config = match std::env::var("TRACKPACE_CONFIG") {
        Ok(path) => {
            tracing::info!("Loading configuration from {path}");
            SessionConfig::from_file(&path)?
        }
        Err(_) => SessionConfig::default(),
    };
    config.apply_env_overrides()?;

    let mut driver = SessionDriver::from_config(&config)?;
    let samples = driver.synthesizer().synthesize();
    if let Some(stats) = TrajectoryStats::from_samples(&samples) {
        tracing::info!(
            "Planned {:.2} km in {} ({:.2} min/km, {} points, seed {})",
            stats.total_distance / 1000.0,
            format_elapsed(stats.duration),
            stats.average_pace,
            stats.point_count,
            driver.seed()
        );
    }

    if let Ok(path) = std::env::var("TRACKPACE_GPX_OUT") {
        let bytes = generate_gpx(&samples, "Simulated Run", OffsetDateTime::now_utc());
        std::fs::write(&path, bytes)?;
        tracing::info!("Wrote GPX to {path}");
    }

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Stop requested");
            ctrl_c.cancel();
        }
    });

    let mut submitter = LoopbackSubmitter::new(driver.seed())
        .with_latency(Duration::from_millis(120), Duration::from_millis(200))
        .with_timeout(Duration::from_secs(5));

    report(driver.run(&mut submitter, &cancel).await)
}

/// Logs the session outcome. Only a user cancellation counts as a clean exit.
fn report(outcome: Result<SessionResult, SessionError>) -> anyhow::Result<()> {
    match outcome {
        Ok(result) => {
            tracing::info!("Session completed!");
            tracing::info!("  Distance: {:.2} km", result.total_distance / 1000.0);
            tracing::info!("  Elapsed: {}", format_elapsed(result.elapsed_seconds));
            tracing::info!("  Samples: {}", result.sample_count);
            tracing::info!("  Dropped: {}", result.dropped_samples);
            Ok(())
        }
        Err(SessionError::Aborted {
            reason: AbortReason::Cancelled,
            partial,
            ..
        }) => {
            tracing::warn!(
                "Session cancelled after {:.2} km, {} samples",
                partial.total_distance / 1000.0,
                partial.sample_count
            );
            Ok(())
        }
        Err(e) => {
            if let Some(partial) = e.partial_result() {
                tracing::error!(
                    "Session aborted after {:.2} km, {} samples",
                    partial.total_distance / 1000.0,
                    partial.sample_count
                );
            }
            Err(e.into())
        }
    }
}
