//! Inactivity reaper: periodic background sweep closing idle sessions.
//!
//! One tokio task per process. It sleeps on an interval and exits when its
//! own token or the parent shutdown token is cancelled.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::ReaperConfig;
use crate::session::{SessionError, SessionStore};

pub struct InactivityReaper {
    sessions: Arc<SessionStore>,
    interval: Duration,
    inactive_after: TimeDelta,
}

impl InactivityReaper {
    pub fn new(sessions: Arc<SessionStore>, config: &ReaperConfig) -> Self {
        Self {
            sessions,
            interval: config.interval,
            inactive_after: TimeDelta::from_std(config.inactive_after).unwrap_or(TimeDelta::MAX),
        }
    }

    /// Close sessions idle since before `now - inactive_after`.
    pub async fn sweep_at(&self, now: DateTime<Utc>) -> Result<usize, SessionError> {
        let cutoff = now.checked_sub_signed(self.inactive_after).unwrap_or(DateTime::<Utc>::MIN_UTC);
        let closed = self.sessions.close_inactive(cutoff, now).await?;
        if closed > 0 {
            info!(closed, %cutoff, "reaper: closed inactive sessions");
        } else {
            debug!(%cutoff, "reaper: nothing to close");
        }
        Ok(closed)
    }

    pub async fn sweep(&self) -> Result<usize, SessionError> {
        self.sweep_at(Utc::now()).await
    }

    /// Start the periodic task. The first sweep runs one interval after start.
    pub fn spawn(self, shutdown: &CancellationToken) -> ReaperHandle {
        let token = shutdown.child_token();
        let task_token = token.clone();
        let join = tokio::spawn(async move { self.run(task_token).await });
        ReaperHandle { token, join }
    }

    async fn run(self, shutdown: CancellationToken) {
        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(interval = ?self.interval, inactive_after = %self.inactive_after, "reaper running");

        loop {
            tokio::select! {
                biased;

                _ = shutdown.cancelled() => {
                    info!("reaper shutting down");
                    break;
                }

                _ = ticker.tick() => {
                    if let Err(e) = self.sweep().await {
                        warn!(error = %e, "reaper: sweep failed");
                    }
                }
            }
        }
    }
}

/// Stop handle for a spawned reaper.
pub struct ReaperHandle {
    token: CancellationToken,
    join: JoinHandle<()>,
}

impl ReaperHandle {
    /// Signal the task and wait for it to finish its current sweep.
    pub async fn stop(self) {
        self.token.cancel();
        if let Err(e) = self.join.await {
            warn!(error = %e, "reaper task ended abnormally");
        }
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }
}
