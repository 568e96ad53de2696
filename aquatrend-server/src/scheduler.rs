//! Background timers.
//!
//! Per configured owner, one loop samples the sensors into the current hour
//! and one loop re-aggregates the current day, week and month. Both stop when
//! the cancellation token fires.

use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use crate::config::PipelineConfig;
use crate::pipeline::{self, PipelineContext, hourly, seed};

/// Handle to the running loops.
pub struct Scheduler {
    tracker: TaskTracker,
    cancel: CancellationToken,
}

impl Scheduler {
    /// Seed (if enabled) and start the loops for every configured owner.
    pub fn spawn(ctx: PipelineContext, config: &PipelineConfig, cancel: CancellationToken) -> Self {
        let tracker = TaskTracker::new();
        let sample_every = Duration::from_secs(config.sample_interval_secs);
        let refresh_every = Duration::from_secs(config.refresh_interval_secs);

        for owner in &config.owners {
            tracker.spawn(sampler_loop(
                ctx.clone(),
                owner.clone(),
                sample_every,
                config.seed_on_start,
                cancel.clone(),
            ));
            tracker.spawn(refresh_loop(
                ctx.clone(),
                owner.clone(),
                refresh_every,
                cancel.clone(),
            ));
        }
        tracker.close();

        info!(
            owners = config.owners.len(),
            sample_interval_secs = config.sample_interval_secs,
            refresh_interval_secs = config.refresh_interval_secs,
            "scheduler started"
        );
        Self { tracker, cancel }
    }

    /// Cancel every loop and wait for them to finish their current tick.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        self.tracker.wait().await;
        info!("scheduler stopped");
    }
}

async fn sampler_loop(
    ctx: PipelineContext,
    owner: String,
    every: Duration,
    seed_first: bool,
    cancel: CancellationToken,
) {
    if seed_first {
        seed::ensure_seeded(&ctx, &owner).await;
    }

    let mut interval = tokio::time::interval(every);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            () = cancel.cancelled() => break,
            _ = interval.tick() => {
                if hourly::sample(&ctx, &owner).await.is_some() {
                    debug!(owner = %owner, "sampler tick");
                }
            }
        }
    }
    debug!(owner = %owner, "sampler stopped");
}

async fn refresh_loop(
    ctx: PipelineContext,
    owner: String,
    every: Duration,
    cancel: CancellationToken,
) {
    let mut interval = tokio::time::interval(every);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            () = cancel.cancelled() => break,
            _ = interval.tick() => {
                if let Err(e) = pipeline::refresh_current(&ctx, &owner).await {
                    warn!(owner = %owner, error = %e, "refresh failed");
                }
            }
        }
    }
    debug!(owner = %owner, "refresh stopped");
}
