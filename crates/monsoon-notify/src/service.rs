//! Notification operations offered to the UI and data layers.
//!
//! Nothing here returns an error: every failure below this boundary is
//! logged and turned into an empty or neutral value.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{error, info};

use crate::content::{overall_alert_content, weather_alert_content};
use crate::{
    AlertTracker, BatchScheduler, Clock, ContentFactory, MonitorConfig, NotificationCenter,
    NotificationContent, PeriodicCheck, Platform, RescheduleMonitor, ScheduleRequest,
    ScheduledHandle, SchedulingOutcome, Trigger, WeatherAlert,
};

/// Entry point for everything notification related.
pub struct NotificationService {
    center: Arc<dyn NotificationCenter>,
    scheduler: Arc<BatchScheduler>,
    monitor: Arc<RescheduleMonitor>,
}

impl NotificationService {
    pub fn new(
        center: Arc<dyn NotificationCenter>,
        platform: Platform,
        clock: Arc<dyn Clock>,
        config: MonitorConfig,
    ) -> Self {
        let scheduler = Arc::new(BatchScheduler::new(Arc::clone(&center), platform, clock));
        let monitor = Arc::new(RescheduleMonitor::new(Arc::clone(&scheduler), config));
        Self {
            center,
            scheduler,
            monitor,
        }
    }

    pub fn scheduler(&self) -> &Arc<BatchScheduler> {
        &self.scheduler
    }

    pub fn monitor(&self) -> &Arc<RescheduleMonitor> {
        &self.monitor
    }

    pub async fn ensure_permission(&self) -> bool {
        self.scheduler.gate().ensure_permission().await
    }

    /// Schedule a recurring series and return the handles in slot order.
    pub async fn schedule<F>(
        &self,
        interval_minutes: u32,
        content_factory: F,
        cancel_existing: bool,
    ) -> Vec<ScheduledHandle>
    where
        F: FnOnce() -> NotificationContent,
    {
        let request = ScheduleRequest::new(interval_minutes)
            .with_horizon_days(self.monitor.config().horizon_days())
            .with_cancel_existing(cancel_existing);
        self.schedule_batch(&request, content_factory).await.handles
    }

    /// Schedule a recurring series and report the full outcome.
    ///
    /// Empty when another batch is already in flight.
    pub async fn schedule_batch<F>(&self, request: &ScheduleRequest, content_factory: F) -> SchedulingOutcome
    where
        F: FnOnce() -> NotificationContent,
    {
        self.monitor
            .schedule(request, content_factory)
            .await
            .unwrap_or_default()
    }

    pub async fn check_and_top_up<F>(
        &self,
        interval_minutes: u32,
        content_factory: F,
        threshold: usize,
    ) -> bool
    where
        F: FnOnce() -> NotificationContent,
    {
        self.monitor
            .check_and_top_up(interval_minutes, content_factory, threshold)
            .await
    }

    /// Start the series once content is available.
    pub async fn initialize<F>(&self, content_factory: F) -> Option<SchedulingOutcome>
    where
        F: FnOnce() -> NotificationContent,
    {
        self.monitor.initialize(content_factory).await
    }

    /// Begin the hourly top-up checks; stop the returned handle on teardown.
    pub fn start_periodic_checks(&self, content_factory: ContentFactory) -> PeriodicCheck {
        Arc::clone(&self.monitor).spawn_periodic(content_factory)
    }

    pub async fn get_scheduled_count(&self) -> usize {
        self.scheduler.scheduled_count().await
    }

    pub async fn cancel_all(&self) {
        self.monitor.cancel_all().await;
    }

    /// Show a notification right away.
    pub async fn send_now(&self, content: &NotificationContent) -> Option<ScheduledHandle> {
        self.send(content, Trigger::Immediate).await
    }

    /// Show a notification once, `seconds` from now.
    pub async fn schedule_after(
        &self,
        content: &NotificationContent,
        seconds: u64,
    ) -> Option<ScheduledHandle> {
        self.send(content, Trigger::After { seconds }).await
    }

    /// Notify about every alert that became active since the last call.
    ///
    /// Returns how many notifications were sent.
    pub async fn announce_new_alerts(
        &self,
        tracker: &mut AlertTracker,
        alerts: &[WeatherAlert],
        now: DateTime<Utc>,
    ) -> usize {
        let fresh = tracker.new_alerts(alerts, now);
        let mut sent = 0;
        for alert in fresh {
            if self.send_now(&weather_alert_content(alert)).await.is_some() {
                sent += 1;
            }
        }
        if sent > 0 {
            info!(sent, "announced new alerts");
        }
        sent
    }

    /// Notify about the overall alert when its level or comment changed.
    ///
    /// An empty comment sends nothing; an empty level counts as `none`.
    pub async fn announce_overall(
        &self,
        tracker: &mut AlertTracker,
        level: &str,
        comment: &str,
        location: Option<&str>,
    ) -> Option<ScheduledHandle> {
        if comment.is_empty() {
            return None;
        }
        let level = if level.is_empty() { "none" } else { level };
        if !tracker.overall_changed(level, comment) {
            return None;
        }
        self.send_now(&overall_alert_content(level, comment, location))
            .await
    }

    async fn send(&self, content: &NotificationContent, trigger: Trigger) -> Option<ScheduledHandle> {
        if !self.ensure_permission().await {
            return None;
        }

        match self.center.schedule(content, trigger).await {
            Ok(handle) => Some(handle),
            Err(e) => {
                error!(error = %e, title = %content.title, "failed to send notification");
                None
            }
        }
    }
}
