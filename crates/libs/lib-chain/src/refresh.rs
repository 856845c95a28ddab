//! # Refresh Driver
//!
//! Re-runs one aggregation on a fixed interval and on demand. Overlapping passes
//! collapse into one: a request arriving while a pass of the same generation is in
//! flight is dropped. A request made after an invalidation waits for the stale pass
//! to end and then runs. The latest snapshot is published on a `watch` channel.

use crate::aggregator::{Aggregation, ReadAggregator};
use crate::contracts::ContractRegistry;
use async_trait::async_trait;
use lib_core::AppError;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// A new snapshot was published.
    Completed,
    /// Another pass of the same generation was already in flight.
    Skipped,
    /// The connection changed while the pass ran, so its result was dropped.
    Discarded,
    Failed(AppError),
}

/// Something the write path and the session can poke after state changed.
#[async_trait]
pub trait RefreshTrigger: Send + Sync {
    async fn refresh(&self) -> RefreshOutcome;

    /// Drop the current snapshot and any pass still in flight.
    fn invalidate(&self);
}

pub struct RefreshDriver<A: Aggregation> {
    query: A,
    registry: Arc<ContractRegistry>,
    in_flight: AtomicBool,
    idle: Notify,
    generation: AtomicU64,
    /// Generation the pass in flight started under.
    running: AtomicU64,
    snapshot_tx: watch::Sender<Option<A::Output>>,
}

impl<A: Aggregation> RefreshDriver<A> {
    pub fn new(query: A, registry: Arc<ContractRegistry>) -> Arc<Self> {
        let (snapshot_tx, _) = watch::channel(None);
        Arc::new(Self {
            query,
            registry,
            in_flight: AtomicBool::new(false),
            idle: Notify::new(),
            generation: AtomicU64::new(0),
            running: AtomicU64::new(0),
            snapshot_tx,
        })
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<A::Output>> {
        self.snapshot_tx.subscribe()
    }

    pub fn latest(&self) -> Option<A::Output> {
        self.snapshot_tx.borrow().clone()
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Run one aggregation pass unless one of the same generation is running.
    pub async fn refresh(&self) -> RefreshOutcome {
        let requested = self.generation.load(Ordering::Acquire);
        let _guard = loop {
            let idle = self.idle.notified();
            if let Some(guard) = InFlight::acquire(&self.in_flight, &self.idle) {
                break guard;
            }
            if self.running.load(Ordering::Acquire) >= requested {
                debug!(query = self.query.name(), "refresh already in flight, dropping request");
                return RefreshOutcome::Skipped;
            }
            debug!(query = self.query.name(), "stale pass in flight, waiting to supersede it");
            idle.await;
        };

        let generation = self.generation.load(Ordering::Acquire);
        self.running.store(generation, Ordering::Release);
        let (handles, result) = match self.registry.require().await {
            Ok(handles) => {
                let result = self.query.run(&ReadAggregator::new(Arc::clone(&handles))).await;
                (Some(handles), result)
            }
            Err(e) => (None, Err(e)),
        };

        let rebound = match &handles {
            Some(handles) => !self.registry.is_current(handles).await,
            None => false,
        };
        if rebound || self.generation.load(Ordering::Acquire) != generation {
            debug!(query = self.query.name(), "connection changed during refresh, discarding");
            return RefreshOutcome::Discarded;
        }

        match result {
            Ok(snapshot) => {
                self.snapshot_tx.send_replace(Some(snapshot));
                debug!(query = self.query.name(), "snapshot published");
                RefreshOutcome::Completed
            }
            Err(e) => {
                warn!(query = self.query.name(), error = %e, "refresh failed");
                RefreshOutcome::Failed(e)
            }
        }
    }

    pub fn invalidate(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
        self.snapshot_tx.send_replace(None);
    }

    /// Refresh now and then every `interval` until the handle is dropped.
    ///
    /// The task holds only a weak reference, so dropping the driver also ends it.
    pub fn start_polling(self: &Arc<Self>, interval: Duration) -> PollHandle {
        let driver = Arc::downgrade(self);
        let name = self.query.name();
        info!(query = name, interval_secs = interval.as_secs(), "polling started");

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                let Some(driver) = driver.upgrade() else {
                    break;
                };
                driver.refresh().await;
            }
            debug!(query = name, "polling task finished");
        });
        PollHandle { task }
    }
}

#[async_trait]
impl<A: Aggregation> RefreshTrigger for RefreshDriver<A> {
    async fn refresh(&self) -> RefreshOutcome {
        RefreshDriver::refresh(self).await
    }

    fn invalidate(&self) {
        RefreshDriver::invalidate(self)
    }
}

/// Clears the in-flight flag even when the pass is cancelled, and wakes requests
/// waiting on a stale pass.
struct InFlight<'a> {
    flag: &'a AtomicBool,
    idle: &'a Notify,
}

impl<'a> InFlight<'a> {
    fn acquire(flag: &'a AtomicBool, idle: &'a Notify) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag, idle })
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
        self.idle.notify_waiters();
    }
}

/// Polling subscription. Dropping it stops the timer and cancels a pass in flight.
#[derive(Debug)]
pub struct PollHandle {
    task: JoinHandle<()>,
}

impl PollHandle {
    pub fn is_active(&self) -> bool {
        !self.task.is_finished()
    }

    /// Stop polling now. Same as dropping the handle.
    pub fn cancel(self) {
        drop(self);
    }
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}
