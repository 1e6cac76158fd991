//! The fleet monitor: sweep scheduling, the sweep pipeline, and stats.
//!
//! One sweep runs immediately on start, then one per configured interval
//! until stopped. Each sweep is fetch -> evaluate -> dispatch -> record the
//! snapshot for the next sweep's recovery check. A sweep whose predecessor
//! is still running is skipped by an explicit in-progress guard rather than
//! overlapping it.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Mutex;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::config::MonitorConfig;
use crate::dispatch::{DeliveryOutcome, EventDispatcher};
use crate::error::Result;
use crate::fetch::StatusFetcher;
use crate::rules::RuleEvaluator;
use crate::types::FleetStatusSnapshot;

/// Counters describing monitor activity since construction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MonitorStats {
    /// Sweeps that ran to completion.
    pub sweeps_completed: u64,
    /// Sweeps skipped by the in-progress guard.
    pub sweeps_skipped: u64,
    /// Sweeps aborted because the snapshot fetch failed.
    pub fetch_failures: u64,
    /// Events produced by the rule evaluator.
    pub events_emitted: u64,
    /// Events accepted by a consumer.
    pub events_delivered: u64,
    /// Events dropped for want of a delivery address.
    pub events_dropped: u64,
    /// Events whose single delivery attempt failed.
    pub events_failed: u64,
}

#[derive(Default)]
struct Counters {
    sweeps_completed: AtomicU64,
    sweeps_skipped: AtomicU64,
    fetch_failures: AtomicU64,
    events_emitted: AtomicU64,
    events_delivered: AtomicU64,
    events_dropped: AtomicU64,
    events_failed: AtomicU64,
}

/// State owned exclusively by the sweep in flight.
struct SweepState {
    evaluator: RuleEvaluator,
    last_snapshot: Option<FleetStatusSnapshot>,
}

/// Recurring fleet health monitor.
///
/// Cheap to clone; clones share the same evaluator state, stats, and
/// running flag.
#[derive(Clone)]
pub struct FleetMonitor {
    config: MonitorConfig,
    fetcher: Arc<dyn StatusFetcher>,
    dispatcher: Arc<EventDispatcher>,
    sweep_state: Arc<Mutex<SweepState>>,
    counters: Arc<Counters>,
    running: Arc<AtomicBool>,
    cancel: Arc<Mutex<Option<CancellationToken>>>,
}

impl FleetMonitor {
    /// Create a monitor. Fails if the configuration does not validate.
    pub fn new(
        config: MonitorConfig,
        fetcher: Arc<dyn StatusFetcher>,
        dispatcher: EventDispatcher,
    ) -> Result<Self> {
        config.validate()?;

        let evaluator = RuleEvaluator::new(config.thresholds.clone());
        Ok(Self {
            config,
            fetcher,
            dispatcher: Arc::new(dispatcher),
            sweep_state: Arc::new(Mutex::new(SweepState {
                evaluator,
                last_snapshot: None,
            })),
            counters: Arc::new(Counters::default()),
            running: Arc::new(AtomicBool::new(false)),
            cancel: Arc::new(Mutex::new(None)),
        })
    }

    /// Start the monitor: one sweep immediately, then one per interval.
    ///
    /// Idempotent: calling while already running logs and returns.
    pub async fn start(&self) {
        if self.running.swap(true, Ordering::SeqCst) {
            info!("fleet monitor already running; start ignored");
            return;
        }

        let cancel = CancellationToken::new();
        *self.cancel.lock().await = Some(cancel.clone());

        info!(
            interval_ms = self.config.sweep_interval.as_millis() as u64,
            "fleet monitor started"
        );

        // First sweep before arming the timer, so a fresh monitor reports
        // state immediately rather than waiting a full interval.
        self.run_sweep().await;

        let monitor = self.clone();
        tokio::spawn(async move {
            let mut ticker = interval(monitor.config.sweep_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // The first tick of a tokio interval completes immediately and
            // is already covered by the sweep above.
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        info!("fleet monitor loop shutting down");
                        break;
                    }
                    _ = ticker.tick() => {
                        monitor.run_sweep().await;
                    }
                }
            }
        });
    }

    /// Stop the monitor. A sweep in flight finishes; no further sweep is
    /// scheduled.
    pub async fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            debug!("fleet monitor not running; stop ignored");
            return;
        }

        if let Some(cancel) = self.cancel.lock().await.take() {
            cancel.cancel();
        }
        info!("fleet monitor stopped");
    }

    /// Whether the monitor is currently running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Run one sweep on demand, honoring the in-progress guard.
    ///
    /// Works whether or not the interval scheduler is running.
    pub async fn force_sweep(&self) {
        self.run_sweep().await;
    }

    /// Snapshot of the activity counters.
    pub fn stats(&self) -> MonitorStats {
        MonitorStats {
            sweeps_completed: self.counters.sweeps_completed.load(Ordering::Relaxed),
            sweeps_skipped: self.counters.sweeps_skipped.load(Ordering::Relaxed),
            fetch_failures: self.counters.fetch_failures.load(Ordering::Relaxed),
            events_emitted: self.counters.events_emitted.load(Ordering::Relaxed),
            events_delivered: self.counters.events_delivered.load(Ordering::Relaxed),
            events_dropped: self.counters.events_dropped.load(Ordering::Relaxed),
            events_failed: self.counters.events_failed.load(Ordering::Relaxed),
        }
    }

    /// The previous sweep's snapshot, if any sweep has completed.
    pub async fn last_snapshot(&self) -> Option<FleetStatusSnapshot> {
        self.sweep_state.lock().await.last_snapshot.clone()
    }

    /// Execute one sweep: fetch, evaluate, dispatch, record.
    async fn run_sweep(&self) {
        // In-progress guard: never overlap a sweep that is still running.
        let Ok(mut state) = self.sweep_state.try_lock() else {
            self.counters.sweeps_skipped.fetch_add(1, Ordering::Relaxed);
            info!("previous sweep still in progress; skipping");
            return;
        };

        let snapshot = match self.fetcher.fetch_snapshot().await {
            Ok(snapshot) => snapshot,
            Err(fetch_error) => {
                // Abort this sweep entirely: no rules run, the recovery
                // baseline stays untouched, and the scheduler carries on.
                self.counters.fetch_failures.fetch_add(1, Ordering::Relaxed);
                error!(error = %fetch_error, "snapshot fetch failed; sweep aborted");
                return;
            }
        };

        let now = Utc::now();
        let SweepState {
            evaluator,
            last_snapshot,
        } = &mut *state;
        let events = evaluator.evaluate(&snapshot, last_snapshot.as_ref(), now);
        self.counters
            .events_emitted
            .fetch_add(events.len() as u64, Ordering::Relaxed);

        for event in &events {
            let counter = match self.dispatcher.dispatch(event).await {
                DeliveryOutcome::Delivered => &self.counters.events_delivered,
                DeliveryOutcome::Dropped => &self.counters.events_dropped,
                DeliveryOutcome::Failed => &self.counters.events_failed,
            };
            counter.fetch_add(1, Ordering::Relaxed);
        }

        state.last_snapshot = Some(snapshot);
        self.counters.sweeps_completed.fetch_add(1, Ordering::Relaxed);

        debug!(events = events.len(), "sweep completed");
    }
}
