// src/watcher.rs
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use log::{debug, warn};
use parking_lot::Mutex;

use crate::config::Config;
use crate::error::BackfillError;
use crate::matchmaker::MatchClient;
use crate::models::backfill::Team;

/// Where the polling loop currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchState {
    Idle,
    Running,
    /// Terminal. Reached on "backfill not found" or teardown; the loop never
    /// restarts.
    Stopped,
}

type Observer = Arc<dyn Fn(&[Team]) + Send + Sync + 'static>;

/// Identity of one registered observer, for explicit unregistration.
#[derive(Debug)]
pub struct ObserverHandle(u64);

struct Registry {
    observers: Vec<(u64, Observer)>,
    next_id: u64,
    state: WatchState,
}

/// Single-flight background poller reconciling backfill state. The first
/// observer registration starts the loop; later registrations only join the
/// fan-out. Change detection is strictly the `updated_at` watermark, never a
/// deep compare of match properties.
#[derive(Clone)]
pub struct BackfillWatcher {
    inner: Arc<Inner>,
}

struct Inner {
    matchmaker: MatchClient,
    registry: Mutex<Registry>,
    /// Last-observed `updated_at`. `None` until the first successful poll,
    /// which records the baseline without notifying anyone.
    watermark: Mutex<Option<i64>>,
    poll_interval: Duration,
}

impl BackfillWatcher {
    pub fn new(matchmaker: MatchClient, config: &Config) -> Self {
        Self {
            inner: Arc::new(Inner {
                matchmaker,
                registry: Mutex::new(Registry {
                    observers: Vec::new(),
                    next_id: 0,
                    state: WatchState::Idle,
                }),
                watermark: Mutex::new(None),
                poll_interval: config.poll_interval,
            }),
        }
    }

    /// Registers `callback` to run on every observed backfill update.
    /// Observers fire sequentially in registration order, on the watcher's
    /// own task. The flag check and loop start form one critical section so
    /// two racing registrations cannot spawn two loops.
    pub fn watch<F>(&self, callback: F) -> ObserverHandle
    where
        F: Fn(&[Team]) + Send + Sync + 'static,
    {
        let mut registry = self.inner.registry.lock();
        let id = registry.next_id;
        registry.next_id += 1;
        registry.observers.push((id, Arc::new(callback)));

        if registry.state == WatchState::Idle {
            registry.state = WatchState::Running;
            let inner = Arc::clone(&self.inner);
            tokio::spawn(async move { inner.run().await });
        }
        ObserverHandle(id)
    }

    /// Removes a previously registered observer. The loop keeps running even
    /// with zero observers left.
    pub fn unwatch(&self, handle: &ObserverHandle) {
        self.inner
            .registry
            .lock()
            .observers
            .retain(|(id, _)| *id != handle.0);
    }

    pub fn state(&self) -> WatchState {
        self.inner.registry.lock().state
    }
}

impl Inner {
    async fn run(&self) {
        let token = self.matchmaker.token().clone();
        loop {
            if token.is_cancelled() {
                break;
            }
            match self.matchmaker.get_backfill().await {
                Err(err) if err.is_not_found() => {
                    debug!("backfill not found, watch stopped");
                    break;
                }
                Err(err) => {
                    warn!("failed to poll backfill: {}", err);
                }
                Ok(backfill) => {
                    let last_seen = *self.watermark.lock();
                    match last_seen {
                        None => {
                            *self.watermark.lock() = Some(backfill.updated_at);
                        }
                        Some(last_seen) if backfill.updated_at != last_seen => {
                            match backfill.teams() {
                                Ok(teams) => {
                                    self.notify(&teams);
                                    *self.watermark.lock() = Some(backfill.updated_at);
                                }
                                Err(err) => {
                                    // Watermark stays put; the next tick
                                    // repeats the same comparison until the
                                    // payload parses.
                                    warn!(
                                        "backfill match properties did not decode: {}",
                                        err
                                    );
                                }
                            }
                        }
                        Some(_) => {}
                    }
                }
            }
            tokio::select! {
                _ = tokio::time::sleep(self.poll_interval) => {}
                _ = token.cancelled() => break,
            }
        }
        self.registry.lock().state = WatchState::Stopped;
    }

    fn notify(&self, teams: &[Team]) {
        // Snapshot outside the invocation so a callback touching the registry
        // cannot deadlock.
        let observers: Vec<Observer> = self
            .registry
            .lock()
            .observers
            .iter()
            .map(|(_, observer)| Arc::clone(observer))
            .collect();
        for observer in observers {
            if catch_unwind(AssertUnwindSafe(|| observer(teams))).is_err() {
                warn!("a backfill observer panicked; watch continues");
            }
        }
    }
}
