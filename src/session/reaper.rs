//! Retention sweep for abandoned drafts.
//!
//! Runs on its own task for the lifetime of the process. A failed cycle is
//! logged and the next attempt waits for the normal interval.

use crate::env;
use crate::session::error::SessionError;
use crate::session::model::SessionId;
use crate::session::store::SessionStore;
use chrono::{DateTime, NaiveDate, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration as StdDuration;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

const MIN_PERIOD: StdDuration = StdDuration::from_millis(1);

/// Configuration for the draft retention sweep
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaperConfig {
    pub enabled: bool,
    pub interval_hours: u64,
    pub retention_days: i64,
}

impl Default for ReaperConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_hours: env::reaper::DEFAULT_INTERVAL_HOURS,
            retention_days: env::reaper::DEFAULT_RETENTION_DAYS,
        }
    }
}

/// Result of one sweep
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub cutoff: NaiveDate,
    pub deleted: Vec<SessionId>,
}

/// Deletes draft sessions whose date is older than the retention window
pub struct DraftReaper {
    store: SessionStore,
    period: StdDuration,
    retention_days: i64,
}

impl DraftReaper {
    pub fn new(store: SessionStore, config: &ReaperConfig) -> Self {
        let hours = config
            .interval_hours
            .clamp(1, env::reaper::MAX_INTERVAL_HOURS);
        Self {
            store,
            period: StdDuration::from_secs(hours.saturating_mul(3600)),
            retention_days: config.retention_days,
        }
    }

    /// Override the sweep interval; never shorter than a millisecond
    pub fn with_period(mut self, period: StdDuration) -> Self {
        self.period = period.max(MIN_PERIOD);
        self
    }

    pub fn period(&self) -> StdDuration {
        self.period
    }

    /// Drafts dated strictly before this day are expired
    pub fn cutoff(&self, now: DateTime<Utc>) -> Result<NaiveDate, SessionError> {
        if self.retention_days < 0 {
            return Err(SessionError::InvalidRetention(self.retention_days));
        }

        TimeDelta::try_days(self.retention_days)
            .and_then(|retention| now.checked_sub_signed(retention))
            .map(|oldest| oldest.date_naive())
            .ok_or(SessionError::InvalidRetention(self.retention_days))
    }

    /// Run one sweep at `now`. Selection and deletion are one batch.
    pub async fn sweep_once(&self, now: DateTime<Utc>) -> Result<SweepReport, SessionError> {
        let cutoff = self.cutoff(now)?;
        let deleted = self.store.delete_expired_drafts(cutoff).await?;

        if deleted.is_empty() {
            debug!(%cutoff, "Draft sweep found nothing to delete");
        } else {
            info!(
                %cutoff,
                deleted = deleted.len(),
                "Draft sweep deleted expired drafts"
            );
        }

        Ok(SweepReport { cutoff, deleted })
    }

    /// Sessions the next sweep at `now` would delete
    pub async fn preview(&self, now: DateTime<Utc>) -> Result<SweepReport, SessionError> {
        let cutoff = self.cutoff(now)?;
        let deleted = self.store.expired_drafts(cutoff).await?;
        Ok(SweepReport { cutoff, deleted })
    }

    /// Sweep on every tick until `cancel` fires.
    ///
    /// Cancellation is only observed between sweeps; a sweep that has
    /// started runs to completion.
    pub async fn run(self, cancel: CancellationToken) {
        let mut ticker = interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            "Draft reaper started with interval: {} hours, retention: {} days",
            self.period.as_secs() / 3600,
            self.retention_days
        );

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!("Draft reaper shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.sweep_once(Utc::now()).await {
                        error!("Draft sweep failed: {}", e);
                    }
                }
            }
        }
    }

    /// Spawn [`run`](Self::run) on its own task
    pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(cancel))
    }
}
