//! Keeps a recurring reminder series topped up.
//!
//! The monitor owns the lifecycle of one series:
//!
//! ```text
//! Uninitialized -> Scheduling -> Scheduled(n) -> TopUpping -> Scheduled(n')
//!                                     \-> (cancel) -> Uninitialized
//! ```
//!
//! Only one batch runs at a time. A call arriving while a batch is in flight
//! does nothing instead of queueing a second batch.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::{BatchScheduler, DEFAULT_HORIZON_DAYS, NotificationContent, ScheduleRequest, SchedulingOutcome};

/// Default minutes between reminders.
pub const DEFAULT_INTERVAL_MINUTES: u32 = 30;

/// Default pending count below which a top-up runs.
pub const DEFAULT_TOP_UP_THRESHOLD: usize = 10;

/// Default period between top-up checks (one hour).
pub const DEFAULT_CHECK_PERIOD_SECS: u64 = 3600;

/// The initializer leaves a series alone when more than this many
/// notifications are already pending.
pub const INITIAL_SKIP_ABOVE: usize = 10;

/// Produces the content of a batch. Shared with the periodic check task.
pub type ContentFactory = Arc<dyn Fn() -> NotificationContent + Send + Sync>;

/// Tunables for the monitor. Unset fields fall back to the defaults above.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MonitorConfig {
    pub interval_minutes: Option<u32>,
    pub horizon_days: Option<u32>,
    pub threshold: Option<usize>,
    pub check_period_secs: Option<u64>,
}

impl MonitorConfig {
    pub fn interval_minutes(&self) -> u32 {
        self.interval_minutes.unwrap_or(DEFAULT_INTERVAL_MINUTES)
    }

    pub fn horizon_days(&self) -> u32 {
        self.horizon_days.unwrap_or(DEFAULT_HORIZON_DAYS)
    }

    pub fn threshold(&self) -> usize {
        self.threshold.unwrap_or(DEFAULT_TOP_UP_THRESHOLD)
    }

    pub fn check_period(&self) -> Duration {
        Duration::from_secs(
            self.check_period_secs
                .unwrap_or(DEFAULT_CHECK_PERIOD_SECS)
                .max(1),
        )
    }
}

/// Where the reminder series stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeriesState {
    Uninitialized,
    /// A full batch is being submitted.
    Scheduling,
    /// The platform held `count` notifications when last asked.
    Scheduled { count: usize },
    /// An additive batch is being submitted on top of `count`.
    TopUpping { count: usize },
}

impl SeriesState {
    /// Whether a batch is currently being submitted.
    pub fn in_flight(&self) -> bool {
        matches!(self, SeriesState::Scheduling | SeriesState::TopUpping { .. })
    }
}

/// Marks a batch as in flight for as long as it lives.
///
/// Dropping it without [`InFlight::finish`] puts the previous state back, so
/// the series is never left stuck in flight by an early return.
struct InFlight<'a> {
    state: &'a Mutex<SeriesState>,
    previous: SeriesState,
    finished: bool,
}

impl<'a> InFlight<'a> {
    fn begin(state: &'a Mutex<SeriesState>, top_up: bool) -> Option<Self> {
        let mut current = state.lock().unwrap_or_else(PoisonError::into_inner);
        if current.in_flight() {
            return None;
        }

        let previous = *current;
        *current = match (top_up, previous) {
            (true, SeriesState::Scheduled { count }) => SeriesState::TopUpping { count },
            (true, _) => SeriesState::TopUpping { count: 0 },
            (false, _) => SeriesState::Scheduling,
        };

        Some(Self {
            state,
            previous,
            finished: false,
        })
    }

    fn finish(mut self, count: usize) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = SeriesState::Scheduled { count };
        self.finished = true;
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if !self.finished {
            *self.state.lock().unwrap_or_else(PoisonError::into_inner) = self.previous;
        }
    }
}

/// Checks the pending count and tops the series up when it runs low.
pub struct RescheduleMonitor {
    scheduler: Arc<BatchScheduler>,
    config: MonitorConfig,
    state: Mutex<SeriesState>,
}

impl RescheduleMonitor {
    pub fn new(scheduler: Arc<BatchScheduler>, config: MonitorConfig) -> Self {
        Self {
            scheduler,
            config,
            state: Mutex::new(SeriesState::Uninitialized),
        }
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    pub fn state(&self) -> SeriesState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Start the series when content first becomes available.
    ///
    /// Leaves a live series alone: nothing happens when more than
    /// [`INITIAL_SKIP_ABOVE`] notifications are pending, and pending
    /// notifications are only cancelled when there are none. Returns `None`
    /// when no batch ran.
    #[tracing::instrument(skip(self, content_factory))]
    pub async fn initialize<F>(&self, content_factory: F) -> Option<SchedulingOutcome>
    where
        F: FnOnce() -> NotificationContent,
    {
        let Some(guard) = InFlight::begin(&self.state, false) else {
            debug!("batch already in flight, skipping initial schedule");
            return None;
        };

        if !self.scheduler.gate().ensure_permission().await {
            return None;
        }

        let existing = self.scheduler.scheduled_count().await;
        if existing > INITIAL_SKIP_ABOVE {
            info!(existing, "notifications already scheduled, skipping initial schedule");
            guard.finish(existing);
            return None;
        }

        let request = ScheduleRequest::new(self.config.interval_minutes())
            .with_horizon_days(self.config.horizon_days())
            .with_cancel_existing(existing == 0);
        let outcome = self.scheduler.schedule(&request, content_factory).await;

        guard.finish(self.scheduler.scheduled_count().await);
        Some(outcome)
    }

    /// Run an additive batch when fewer than `threshold` notifications are
    /// pending.
    ///
    /// Returns whether a batch ran. Pending notifications are never
    /// cancelled here.
    #[tracing::instrument(skip(self, content_factory))]
    pub async fn check_and_top_up<F>(
        &self,
        interval_minutes: u32,
        content_factory: F,
        threshold: usize,
    ) -> bool
    where
        F: FnOnce() -> NotificationContent,
    {
        let Some(guard) = InFlight::begin(&self.state, true) else {
            debug!("batch already in flight, skipping top-up check");
            return false;
        };

        let count = self.scheduler.scheduled_count().await;
        debug!(count, threshold, "pending notifications");
        if count >= threshold {
            guard.finish(count);
            return false;
        }

        info!(count, threshold, "pending notifications below threshold, topping up");
        let request = ScheduleRequest::top_up(interval_minutes)
            .with_horizon_days(self.config.horizon_days());
        self.scheduler.schedule(&request, content_factory).await;

        guard.finish(self.scheduler.scheduled_count().await);
        true
    }

    /// Run one batch unless another is already in flight.
    ///
    /// Returns `None` without touching the platform when a batch is running.
    #[tracing::instrument(skip(self, content_factory), fields(interval_minutes = request.interval_minutes))]
    pub async fn schedule<F>(
        &self,
        request: &ScheduleRequest,
        content_factory: F,
    ) -> Option<SchedulingOutcome>
    where
        F: FnOnce() -> NotificationContent,
    {
        let Some(guard) = InFlight::begin(&self.state, !request.cancel_existing) else {
            debug!("batch already in flight, skipping schedule");
            return None;
        };

        let outcome = self.scheduler.schedule(request, content_factory).await;

        guard.finish(self.scheduler.scheduled_count().await);
        Some(outcome)
    }

    /// Cancel every pending notification and reset the series.
    pub async fn cancel_all(&self) {
        self.scheduler.cancel_all().await;

        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if !state.in_flight() {
            *state = SeriesState::Uninitialized;
        }
    }

    /// Check now and then once per configured period, until the returned
    /// handle is stopped or dropped.
    pub fn spawn_periodic(self: Arc<Self>, content_factory: ContentFactory) -> PeriodicCheck {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let period = self.config.check_period();
        let interval_minutes = self.config.interval_minutes();
        let threshold = self.config.threshold();

        let handle = tokio::spawn(async move {
            info!(period_secs = period.as_secs(), "periodic top-up check started");
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;

                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            break;
                        }
                    }

                    _ = ticker.tick() => {
                        let factory = Arc::clone(&content_factory);
                        self.check_and_top_up(interval_minutes, move || factory(), threshold)
                            .await;
                    }
                }
            }

            info!("periodic top-up check stopped");
        });

        PeriodicCheck {
            shutdown_tx,
            handle: Some(handle),
        }
    }
}

/// Handle to the periodic top-up task.
///
/// Dropping the handle signals the task to stop; [`PeriodicCheck::stop`]
/// additionally waits for it.
pub struct PeriodicCheck {
    shutdown_tx: watch::Sender<bool>,
    handle: Option<JoinHandle<()>>,
}

impl PeriodicCheck {
    /// Signal the task and wait until it has exited.
    pub async fn stop(mut self) {
        let _ = self.shutdown_tx.send(true);
        if let Some(handle) = self.handle.take()
            && let Err(e) = handle.await
        {
            warn!(error = %e, "periodic top-up task ended abnormally");
        }
    }

    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().is_none_or(|h| h.is_finished())
    }
}

impl Drop for PeriodicCheck {
    fn drop(&mut self) {
        let _ = self.shutdown_tx.send(true);
    }
}
