//! Physical removal of expired orders and their files.
//!
//! Expiry is enforced twice: every read filters on `created_at > now - T`,
//! and the reaper deletes what the filter already hides. The reaper can run
//! late or not at all without any expired order becoming visible.

use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::instrument;

use printdrop_core::OrderTtl;

use crate::error::AppError;
use crate::services::Backends;

/// Outcome of one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepReport {
    pub orders_removed: usize,
    pub files_removed: usize,
    pub files_failed: usize,
}

impl SweepReport {
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.orders_removed == 0 && self.files_removed == 0 && self.files_failed == 0
    }
}

/// Deletes expired orders, then their stored files.
pub struct Reaper<'a> {
    backends: &'a Backends,
    ttl: OrderTtl,
}

impl<'a> Reaper<'a> {
    #[must_use]
    pub const fn new(backends: &'a Backends, ttl: OrderTtl) -> Self {
        Self { backends, ttl }
    }

    /// Remove every order created at or before `now - T`.
    ///
    /// Order rows go first, in one statement, so a concurrent reader either
    /// sees an order with all its files or no order. File deletions that fail
    /// are logged and counted, not retried: the keys are unreachable anyway.
    ///
    /// # Errors
    ///
    /// Returns a repository error if the order deletion fails. File deletion
    /// failures never fail the sweep.
    #[instrument(skip(self))]
    pub async fn sweep(&self, now: DateTime<Utc>) -> Result<SweepReport, AppError> {
        let cutoff = self.ttl.cutoff(now);
        let expired = self.backends.orders.delete_expired(cutoff).await?;
        if expired.is_empty() {
            return Ok(SweepReport::default());
        }

        let keys: Vec<_> = expired
            .iter()
            .flat_map(|order| order.files.iter().map(|f| f.storage_key.clone()))
            .collect();

        let results = join_all(keys.iter().map(|key| self.backends.content.delete(key))).await;

        let mut report = SweepReport {
            orders_removed: expired.len(),
            ..SweepReport::default()
        };
        for (key, result) in keys.iter().zip(results) {
            match result {
                Ok(()) => report.files_removed += 1,
                Err(e) => {
                    report.files_failed += 1;
                    tracing::warn!(key = %key, error = %e, "Failed to delete expired file");
                }
            }
        }

        tracing::info!(
            orders_removed = report.orders_removed,
            files_removed = report.files_removed,
            files_failed = report.files_failed,
            "Expired orders reaped"
        );
        Ok(report)
    }
}

/// Sweep every `interval` until the returned task is aborted.
#[must_use]
pub fn spawn_periodic(backends: Backends, ttl: OrderTtl, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        tracing::info!(interval = ?interval, ttl = %ttl, "Periodic reaper started");

        loop {
            ticker.tick().await;
            let now = backends.clock.now();
            if let Err(e) = Reaper::new(&backends, ttl).sweep(now).await {
                tracing::warn!(error = %e, "Periodic sweep failed");
            }
        }
    })
}
