//! Drains the offline queue against the backend whenever the process is online.
//!
//! States: idle and draining. At most one drain cycle runs per manager; a
//! `sync()` call that finds the manager draining (or offline) returns an empty
//! report without touching storage. Entries are attempted strictly one at a
//! time in `created_at` order.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use crate::connectivity::{Connectivity, Subscription};
use crate::error::QueueError;
use crate::models::{EntryUpdate, QueueEntry, QueueStatus};
use crate::store::QueueStore;
use crate::transport::Transport;

use super::{RetryPolicy, SyncCallbacks, SyncReport};

pub struct SyncManager {
    store: Arc<dyn QueueStore>,
    transport: Arc<dyn Transport>,
    connectivity: Connectivity,
    callbacks: Arc<dyn SyncCallbacks>,
    policy: RetryPolicy,
    syncing: AtomicBool,
    /// Set by `sync()` calls; makes an in-flight cycle take another pass
    /// before going idle so entries enqueued meanwhile are not stranded.
    rerun: AtomicBool,
    subscription: Mutex<Option<Subscription>>,
}

/// Outcome of a single attempt on one entry.
enum Attempt {
    Delivered,
    Requeued,
    Exhausted,
}

/// Holds the draining flag for the lifetime of a cycle.
struct DrainGuard<'a>(&'a AtomicBool);

impl<'a> DrainGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| DrainGuard(flag))
    }
}

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl SyncManager {
    pub fn new(
        store: Arc<dyn QueueStore>,
        transport: Arc<dyn Transport>,
        connectivity: Connectivity,
        callbacks: Arc<dyn SyncCallbacks>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            store,
            transport,
            connectivity,
            callbacks,
            policy,
            syncing: AtomicBool::new(false),
            rerun: AtomicBool::new(false),
            subscription: Mutex::new(None),
        }
    }

    pub fn is_syncing(&self) -> bool {
        self.syncing.load(Ordering::Acquire)
    }

    pub fn is_online(&self) -> bool {
        self.connectivity.is_online()
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Observe connectivity transitions and drain immediately if online.
    ///
    /// Going online triggers a sync; going offline only notifies callbacks.
    /// Calling `start` again replaces the previous subscription.
    pub fn start(self: &Arc<Self>) {
        let manager = Arc::clone(self);
        let subscription = self.connectivity.on_change(move |online| {
            manager.callbacks.on_online_change(online);
            if online {
                manager.spawn_sync();
            }
        });

        *self
            .subscription
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(subscription);

        tracing::info!("Sync manager started");

        if self.connectivity.is_online() {
            self.spawn_sync();
        }
    }

    /// Stop observing connectivity. An in-flight drain runs to completion.
    pub fn stop(&self) {
        let subscription = self
            .subscription
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        if let Some(subscription) = subscription {
            subscription.unsubscribe();
            tracing::info!("Sync manager stopped");
        }
    }

    /// Run a drain cycle on a background task.
    pub fn spawn_sync(self: &Arc<Self>) {
        let manager = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(e) = manager.sync().await {
                tracing::error!("Sync aborted: {e}");
            }
        });
    }

    /// Drain the queue until no pending entry remains.
    ///
    /// Request failures are absorbed into retry bookkeeping. Storage and
    /// logic errors end the cycle and are returned after `on_sync_complete`
    /// has been called with the partial totals.
    pub async fn sync(&self) -> Result<SyncReport, QueueError> {
        if !self.connectivity.is_online() {
            tracing::debug!("Sync skipped: offline");
            return Ok(SyncReport::default());
        }

        self.rerun.store(true, Ordering::SeqCst);
        let Some(guard) = DrainGuard::acquire(&self.syncing) else {
            tracing::debug!("Sync skipped: already draining");
            return Ok(SyncReport::default());
        };

        self.callbacks.on_sync_start();
        tracing::debug!("Sync started");

        let mut report = SyncReport::default();
        let result = self.drain_until_settled(guard, &mut report).await;

        self.callbacks
            .on_sync_complete(report.processed, report.failed);

        match &result {
            Ok(()) => tracing::info!(
                "Sync complete (processed={}, failed={})",
                report.processed,
                report.failed
            ),
            Err(e) => tracing::error!(
                "Sync stopped after processed={}, failed={}: {e}",
                report.processed,
                report.failed
            ),
        }

        result.map(|()| report)
    }

    /// Drain, release the flag, and go again if a `sync()` call arrived meanwhile.
    async fn drain_until_settled<'a>(
        &'a self,
        mut guard: DrainGuard<'a>,
        report: &mut SyncReport,
    ) -> Result<(), QueueError> {
        loop {
            self.rerun.store(false, Ordering::SeqCst);
            self.drain(report).await?;
            drop(guard);

            if !self.rerun.load(Ordering::SeqCst) {
                return Ok(());
            }
            guard = match DrainGuard::acquire(&self.syncing) {
                Some(guard) => guard,
                None => return Ok(()),
            };
        }
    }

    async fn drain(&self, report: &mut SyncReport) -> Result<(), QueueError> {
        while let Some(entry) = self.store.dequeue_oldest_pending().await? {
            let outcome = self.attempt(&entry).await?;

            let backoff = match outcome {
                Attempt::Delivered => {
                    report.processed += 1;
                    None
                }
                Attempt::Requeued => {
                    report.failed += 1;
                    Some(self.policy.backoff(entry.retries))
                }
                Attempt::Exhausted => {
                    report.failed += 1;
                    None
                }
            };

            let counts = self.store.count_by_status().await?;
            self.callbacks.on_queue_change(counts.pending, counts.failed);

            if let Some(delay) = backoff {
                tracing::debug!("Backing off {delay:?} before next attempt");
                tokio::time::sleep(delay).await;
            }
        }
        Ok(())
    }

    async fn attempt(&self, entry: &QueueEntry) -> Result<Attempt, QueueError> {
        self.store
            .update_entry(&entry.id, EntryUpdate::status(QueueStatus::Processing))
            .await?;

        tracing::debug!(
            "Processing queue entry {} ({} {} {}, retries={})",
            entry.id,
            entry.action,
            entry.method,
            entry.endpoint,
            entry.retries
        );

        match self.transport.send(entry).await {
            Ok(()) => {
                self.store.remove_entry(&entry.id).await?;
                Ok(Attempt::Delivered)
            }
            Err(e) => {
                let retries = entry.retries + 1;
                if self.policy.is_exhausted(retries) {
                    self.store
                        .update_entry(
                            &entry.id,
                            EntryUpdate::status(QueueStatus::Failed).with_retries(retries),
                        )
                        .await?;
                    tracing::warn!(
                        "Queue entry {} ({}) failed permanently after {retries} attempts: {e}",
                        entry.id,
                        entry.action
                    );
                    Ok(Attempt::Exhausted)
                } else {
                    self.store
                        .update_entry(
                            &entry.id,
                            EntryUpdate::status(QueueStatus::Pending).with_retries(retries),
                        )
                        .await?;
                    tracing::warn!(
                        "Queue entry {} ({}) attempt {retries} failed: {e}",
                        entry.id,
                        entry.action
                    );
                    Ok(Attempt::Requeued)
                }
            }
        }
    }
}
