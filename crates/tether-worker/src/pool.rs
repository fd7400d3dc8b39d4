use std::sync::Arc;
use std::time::Duration;
use tether_core::{LinkStore, OwnerId, ShortCode};
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinSet;
use tracing::{error, info, warn};
use typed_builder::TypedBuilder;

pub const WORKERS_ENV: &str = "TETHER_DELETE_WORKERS";
pub const TIMEOUT_ENV: &str = "TETHER_DELETE_TIMEOUT_SECS";

const DEFAULT_WORKERS: usize = 10;
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20);

/// Concurrency parameters for a [`DeletePool`].
#[derive(Debug, Clone, TypedBuilder)]
pub struct PoolSettings {
    /// How many workers pull from the queue concurrently.
    #[builder(default = DEFAULT_WORKERS)]
    pub workers: usize,
    /// Deadline for one bulk-delete run, measured from acceptance.
    #[builder(default = DEFAULT_TIMEOUT)]
    pub timeout: Duration,
}

impl PoolSettings {
    /// Reads settings from `TETHER_DELETE_WORKERS` and
    /// `TETHER_DELETE_TIMEOUT_SECS`. A missing variable takes the default
    /// silently; an unusable value is logged and falls back.
    pub fn from_env() -> Self {
        let workers = match std::env::var(WORKERS_ENV) {
            Err(_) => DEFAULT_WORKERS,
            Ok(raw) => match raw.parse::<usize>() {
                Ok(count) if count > 0 => count,
                _ => {
                    warn!(
                        var = WORKERS_ENV,
                        value = %raw,
                        fallback = DEFAULT_WORKERS,
                        "unusable delete worker count, using fallback"
                    );
                    DEFAULT_WORKERS
                }
            },
        };

        let timeout = match std::env::var(TIMEOUT_ENV) {
            Err(_) => DEFAULT_TIMEOUT,
            Ok(raw) => match raw.parse::<u64>() {
                Ok(secs) if secs > 0 => Duration::from_secs(secs),
                _ => {
                    warn!(
                        var = TIMEOUT_ENV,
                        value = %raw,
                        fallback_secs = DEFAULT_TIMEOUT.as_secs(),
                        "unusable delete timeout, using fallback"
                    );
                    DEFAULT_TIMEOUT
                }
            },
        };

        Self { workers, timeout }
    }
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Outcome of one bulk-delete run.
///
/// `completed` counts backend calls that returned success, which includes
/// the contract's silent no-ops (unknown codes, foreign owners). When
/// `cancelled` is set, `completed + failed` may be short of `requested`;
/// the remaining items were never dispatched.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DeleteReport {
    pub requested: usize,
    pub completed: usize,
    pub failed: usize,
    pub cancelled: bool,
}

/// Bounded-concurrency fan-out engine for soft deletes.
///
/// Each [`DeletePool::run`] call builds its own queue and worker set and
/// tears them down when it returns; the pool value itself is just the
/// store handle plus settings and is cheap to clone.
///
/// Individual delete failures are logged and counted, never retried and
/// never surfaced past the report: the HTTP boundary has already answered
/// "accepted" by the time any of this executes.
pub struct DeletePool<S> {
    store: Arc<S>,
    settings: PoolSettings,
}

impl<S> Clone for DeletePool<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            settings: self.settings.clone(),
        }
    }
}

impl<S: LinkStore> DeletePool<S> {
    pub fn new(store: Arc<S>, settings: PoolSettings) -> Self {
        Self { store, settings }
    }

    /// Fire-and-forget entry point: spawns [`DeletePool::run`] and logs its
    /// report. Returns immediately; completion is observable only in logs.
    pub fn spawn(&self, owner: OwnerId, codes: Vec<ShortCode>) {
        let pool = self.clone();
        tokio::spawn(async move {
            let report = pool.run(owner, codes).await;
            info!(
                requested = report.requested,
                completed = report.completed,
                failed = report.failed,
                cancelled = report.cancelled,
                "bulk delete finished"
            );
        });
    }

    /// Runs one bulk delete to completion (or deadline) and reports.
    ///
    /// Items are preloaded into a queue sized to the batch, then pulled by
    /// up to `settings.workers` workers, each invoking the store's
    /// idempotent single-record delete. Ordering across items is
    /// unspecified. If the deadline elapses first, in-flight workers finish
    /// their current item, nothing further is dispatched, and the report
    /// comes back with `cancelled` set instead of an error.
    pub async fn run(&self, owner: OwnerId, codes: Vec<ShortCode>) -> DeleteReport {
        let total = codes.len();
        let mut report = DeleteReport {
            requested: total,
            ..DeleteReport::default()
        };
        if total == 0 {
            return report;
        }

        // Capacity equals the batch size, so feeding never blocks.
        let (queue_tx, queue_rx) = mpsc::channel(total);
        for code in codes {
            let _ = queue_tx.send(code).await;
        }
        drop(queue_tx);
        let queue = Arc::new(Mutex::new(queue_rx));

        let (cancel_tx, cancel_rx) = watch::channel(false);

        let mut workers: JoinSet<(usize, usize)> = JoinSet::new();
        for _ in 0..self.settings.workers.clamp(1, total) {
            let queue = Arc::clone(&queue);
            let cancel = cancel_rx.clone();
            let store = Arc::clone(&self.store);
            let owner = owner.clone();

            workers.spawn(async move {
                let mut completed = 0usize;
                let mut failed = 0usize;
                loop {
                    // Cancellation is observed between items only; a
                    // delete already handed to the backend runs to its end.
                    if *cancel.borrow() {
                        break;
                    }
                    let Some(code) = queue.lock().await.recv().await else {
                        break;
                    };
                    match store.delete(&owner, &code).await {
                        Ok(()) => completed += 1,
                        Err(err) => {
                            failed += 1;
                            error!(owner = %owner, code = %code, %err, "soft delete failed");
                        }
                    }
                }
                (completed, failed)
            });
        }
        drop(cancel_rx);

        let deadline = tokio::time::sleep(self.settings.timeout);
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                joined = workers.join_next() => match joined {
                    Some(Ok((completed, failed))) => {
                        report.completed += completed;
                        report.failed += failed;
                    }
                    Some(Err(err)) => error!(%err, "delete worker panicked"),
                    None => break,
                },
                _ = &mut deadline, if !report.cancelled => {
                    report.cancelled = true;
                    let _ = cancel_tx.send(true);
                    info!(
                        timeout = ?self.settings.timeout,
                        "bulk delete deadline elapsed, draining in-flight workers"
                    );
                }
            }
        }

        report
    }
}
