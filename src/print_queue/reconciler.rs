//! Periodic reconciliation of Queued jobs against the OS spooler.
//!
//! Spoolers expose no portable completion event, so the reconciler polls:
//! a Queued job whose spooler id no longer shows up in the active set has
//! finished printing and is completed.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::store::JobStore;
use crate::printer::SpoolerQueue;
use crate::metrics;

/// Result of a single reconciliation pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// The spooler query failed; nothing was changed.
    QueryFailed,
    /// The backend cannot see the spooler; nothing to reconcile.
    Unmonitored,
    /// Number of jobs completed this tick.
    Reconciled(usize),
}

impl TickOutcome {
    fn label(&self) -> &'static str {
        match self {
            TickOutcome::QueryFailed => "query_failed",
            TickOutcome::Unmonitored => "unmonitored",
            TickOutcome::Reconciled(0) => "idle",
            TickOutcome::Reconciled(_) => "completed",
        }
    }
}

pub struct Reconciler {
    store: Arc<JobStore>,
    interval: Duration,
}

impl Reconciler {
    pub fn new(store: Arc<JobStore>, interval: Duration) -> Self {
        Self { store, interval }
    }

    /// One pass: query the spooler, then complete every Queued job it no
    /// longer lists.
    pub async fn tick(&self) -> TickOutcome {
        let outcome = match self.store.backend().active_job_ids().await {
            Err(e) => {
                debug!("Spooler query failed, skipping reconciliation: {}", e);
                TickOutcome::QueryFailed
            }
            Ok(SpoolerQueue::Unmonitored) => TickOutcome::Unmonitored,
            Ok(SpoolerQueue::Active(active)) => {
                TickOutcome::Reconciled(self.store.complete_finished(&active).len())
            }
        };
        metrics::record_reconcile_tick(outcome.label());
        outcome
    }

    /// Poll until `shutdown` is cancelled. Call from a spawned task.
    pub async fn run(&self, shutdown: CancellationToken) {
        info!(
            "Reconciler starting (interval={}ms)",
            self.interval.as_millis()
        );

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick fires immediately; skip it so startup is not raced.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.tick().await;
                }
                _ = shutdown.cancelled() => {
                    info!("Reconciler shutting down");
                    break;
                }
            }
        }
    }
}
