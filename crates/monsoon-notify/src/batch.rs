//! Batch scheduling of recurring reminders.

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::capacity::max_count;
use crate::slots::{first_aligned_slot, plan_slot, slot_count, within_lead_window};
use crate::{
    Clock, NotificationCenter, NotificationContent, PermissionGate, Platform, ScheduleRequest,
    SchedulerError, SchedulingOutcome, Submission, TimeSlot, Trigger,
};

/// Back-to-back rejections after which a batch gives up, taking the run as
/// a sign that the device quota is full.
pub const MAX_CONSECUTIVE_FAILURES: usize = 5;

/// Per-slot errors logged before the log goes quiet.
const LOGGED_FAILURES: usize = 5;

/// Places a bounded series of one-shot notifications on aligned time slots.
pub struct BatchScheduler {
    center: Arc<dyn NotificationCenter>,
    gate: PermissionGate,
    clock: Arc<dyn Clock>,
}

impl BatchScheduler {
    pub fn new(center: Arc<dyn NotificationCenter>, platform: Platform, clock: Arc<dyn Clock>) -> Self {
        let gate = PermissionGate::new(Arc::clone(&center), platform);
        Self::with_gate(center, gate, clock)
    }

    pub fn with_gate(
        center: Arc<dyn NotificationCenter>,
        gate: PermissionGate,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            center,
            gate,
            clock,
        }
    }

    pub fn gate(&self) -> &PermissionGate {
        &self.gate
    }

    pub fn platform(&self) -> &Platform {
        self.gate.platform()
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Most notifications one batch may submit on this platform.
    pub fn capacity(&self) -> usize {
        max_count(self.platform())
    }

    /// Schedule one batch of reminders.
    ///
    /// `content_factory` is called once; every slot of the batch carries the
    /// same title and body. Never fails: missing permission, an invalid
    /// request or a platform error before the first slot give an empty
    /// outcome, and rejected slots are counted in the outcome.
    #[tracing::instrument(
        skip(self, content_factory),
        fields(
            platform = %self.platform(),
            interval_minutes = request.interval_minutes,
            cancel_existing = request.cancel_existing,
        )
    )]
    pub async fn schedule<F>(&self, request: &ScheduleRequest, content_factory: F) -> SchedulingOutcome
    where
        F: FnOnce() -> NotificationContent,
    {
        if !self.gate.ensure_permission().await {
            debug!("no notification permission, skipping batch");
            return SchedulingOutcome::empty();
        }

        match self.run_batch(request, content_factory).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(error = %e, "scheduling batch aborted");
                SchedulingOutcome::empty()
            }
        }
    }

    /// Number of notifications the platform still holds, or zero if it
    /// cannot be asked.
    pub async fn scheduled_count(&self) -> usize {
        match self.center.list_scheduled().await {
            Ok(handles) => handles.len(),
            Err(e) => {
                warn!(error = %e, "failed to list scheduled notifications");
                0
            }
        }
    }

    /// Cancel every pending notification on the device.
    pub async fn cancel_all(&self) {
        if let Err(e) = self.center.cancel_all().await {
            error!(error = %e, "failed to cancel scheduled notifications");
        }
    }

    async fn run_batch<F>(
        &self,
        request: &ScheduleRequest,
        content_factory: F,
    ) -> Result<SchedulingOutcome, SchedulerError>
    where
        F: FnOnce() -> NotificationContent,
    {
        request.validate()?;
        let interval = request.interval_minutes;

        if request.cancel_existing {
            self.center.cancel_all().await?;
            debug!("cancelled existing notifications");
        }

        let wanted = slot_count(interval, request.horizon_days);
        let capacity = self.capacity();
        if wanted > capacity {
            warn!(
                wanted,
                capacity, "series exceeds the platform limit, scheduling only the first slots"
            );
        }
        let count = wanted.min(capacity);
        let days_covered = (count as u64 * u64::from(interval)).div_ceil(24 * 60);
        info!(count, interval, days_covered, capacity, "scheduling recurring notifications");

        let content = content_factory();
        let first = first_aligned_slot(interval, &self.clock.now());

        let mut outcome = SchedulingOutcome {
            planned: count,
            ..SchedulingOutcome::default()
        };
        let mut consecutive_failures = 0;

        for index in 0..count {
            let slot = plan_slot(&first, index, interval, &self.clock.now());
            if !within_lead_window(slot.seconds_from_now) {
                outcome.skipped_count += 1;
                continue;
            }

            match self.submit(&content, &slot, interval).await {
                Submission::Submitted(handle) => {
                    if index < 3 || index % 50 == 0 {
                        debug!(slot = index + 1, at = %slot.target.format("%H:%M"), handle = %handle, "scheduled notification");
                    }
                    outcome.handles.push(handle);
                    outcome.success_count += 1;
                    consecutive_failures = 0;
                }
                Submission::Rejected(reason) => {
                    outcome.error_count += 1;
                    consecutive_failures += 1;
                    if outcome.error_count <= LOGGED_FAILURES {
                        warn!(slot = index + 1, error = %reason, "failed to schedule notification");
                    }
                    if consecutive_failures >= MAX_CONSECUTIVE_FAILURES {
                        outcome.stopped_early = index + 1 < count;
                        warn!(
                            consecutive_failures,
                            scheduled = outcome.success_count,
                            "stopping batch, platform limit likely reached"
                        );
                        break;
                    }
                }
            }
        }

        info!(
            scheduled = outcome.success_count,
            planned = outcome.planned,
            errors = outcome.error_count,
            skipped = outcome.skipped_count,
            "recurring notifications scheduled"
        );

        Ok(outcome)
    }

    async fn submit(
        &self,
        content: &NotificationContent,
        slot: &TimeSlot,
        interval_minutes: u32,
    ) -> Submission {
        let payload = content.for_slot(slot, interval_minutes);
        let trigger = Trigger::After {
            seconds: slot.seconds_from_now.unsigned_abs(),
        };

        match self.center.schedule(&payload, trigger).await {
            Ok(handle) => Submission::Submitted(handle),
            Err(reason) => Submission::Rejected(reason),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::slots::{MIN_LEAD_SECONDS, slot_instant};
    use crate::{
        InMemoryNotificationCenter, ManualClock, PermissionStatus, PlatformError, ScheduledHandle,
    };
    use async_trait::async_trait;
    use chrono::{DateTime, FixedOffset, TimeZone};
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn at(hour: u32, minute: u32, second: u32) -> DateTime<FixedOffset> {
        FixedOffset::east_opt(7 * 3600)
            .unwrap()
            .with_ymd_and_hms(2025, 6, 14, hour, minute, second)
            .unwrap()
    }

    fn content() -> NotificationContent {
        NotificationContent::new("✅ Weather status", "Light rain this evening")
            .with_data("type", "recurring_weather_update")
    }

    fn setup(
        platform: Platform,
        now: DateTime<FixedOffset>,
        configure: impl FnOnce(InMemoryNotificationCenter) -> InMemoryNotificationCenter,
    ) -> (Arc<InMemoryNotificationCenter>, BatchScheduler) {
        let clock: Arc<dyn Clock> = Arc::new(ManualClock::new(now));
        let center = Arc::new(configure(
            InMemoryNotificationCenter::new(Arc::clone(&clock))
                .with_permission(PermissionStatus::Granted),
        ));
        let scheduler = BatchScheduler::new(center.clone(), platform, clock);
        (center, scheduler)
    }

    async fn prefill(center: &InMemoryNotificationCenter, count: usize) {
        for _ in 0..count {
            center
                .schedule(
                    &NotificationContent::new("other", "b"),
                    Trigger::After { seconds: 600 },
                )
                .await
                .unwrap();
        }
    }

    #[tokio::test]
    async fn test_ios_batch_is_capped() {
        let (center, scheduler) = setup(Platform::Ios, at(14, 23, 0), |c| c);

        let outcome = scheduler.schedule(&ScheduleRequest::new(30), content).await;

        assert_eq!(outcome.planned, 64);
        assert_eq!(outcome.success_count, 64);
        assert_eq!(outcome.error_count, 0);
        assert_eq!(outcome.handles.len(), 64);
        assert!(!outcome.stopped_early);
        assert_eq!(center.pending_count().await, 64);
    }

    #[tokio::test]
    async fn test_android_batch_is_capped() {
        let (center, scheduler) = setup(Platform::Android, at(14, 23, 0), |c| c);

        let outcome = scheduler.schedule(&ScheduleRequest::new(30), content).await;

        assert_eq!(outcome.success_count, 200);
        assert_eq!(center.pending_count().await, 200);
    }

    #[tokio::test]
    async fn test_daily_interval_fits_without_cap() {
        let (_center, scheduler) = setup(Platform::Android, at(14, 23, 0), |c| c);

        let outcome = scheduler.schedule(&ScheduleRequest::new(1440), content).await;

        assert_eq!(outcome.planned, 30);
        assert_eq!(outcome.success_count, 30);
        assert_eq!(outcome.skipped_count, 0);
    }

    #[tokio::test]
    async fn test_slots_follow_alignment_and_order() {
        let now = at(14, 23, 0);
        let (center, scheduler) = setup(Platform::Ios, now, |c| c);

        let outcome = scheduler.schedule(&ScheduleRequest::new(30), content).await;
        let pending = center.pending().await;

        let handles: Vec<_> = pending.iter().map(|n| n.handle.clone()).collect();
        assert_eq!(outcome.handles, handles);

        assert_eq!(pending[0].fire_at, at(14, 30, 0));
        assert_eq!(pending[1].fire_at, at(15, 0, 0));
        for pair in pending.windows(2) {
            assert_eq!((pair[1].fire_at - pair[0].fire_at).num_minutes(), 30);
        }

        let first = first_aligned_slot(30, &now);
        assert_eq!(pending[63].fire_at, slot_instant(&first, 63, 30));
    }

    #[tokio::test]
    async fn test_every_slot_carries_same_content_and_metadata() {
        let (center, scheduler) = setup(Platform::Ios, at(14, 23, 0), |c| c);
        let calls = AtomicUsize::new(0);

        scheduler
            .schedule(&ScheduleRequest::new(30), || {
                calls.fetch_add(1, Ordering::SeqCst);
                content()
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        let pending = center.pending().await;
        assert!(pending.iter().all(|n| n.content.title == "✅ Weather status"));
        assert!(pending.iter().all(|n| n.content.data["type"] == "recurring_weather_update"));
        assert!(pending.iter().all(|n| n.content.data["intervalMinutes"] == 30));
        assert_eq!(pending[0].content.data["scheduledTime"], "2025-06-14T07:30:00.000Z");
    }

    #[tokio::test]
    async fn test_slot_inside_minimum_lead_is_skipped() {
        let (center, scheduler) = setup(Platform::Ios, at(14, 29, 30), |c| c);

        let outcome = scheduler.schedule(&ScheduleRequest::new(30), content).await;

        assert_eq!(outcome.skipped_count, 1);
        assert_eq!(outcome.success_count, 63);
        let pending = center.pending().await;
        assert_eq!(pending[0].fire_at, at(15, 0, 0));
        assert!(pending.iter().all(|n| (n.fire_at - at(14, 29, 30)).num_seconds() >= MIN_LEAD_SECONDS));
    }

    #[tokio::test]
    async fn test_every_submission_failing_stops_at_ceiling() {
        let (center, scheduler) =
            setup(Platform::Ios, at(14, 23, 0), |c| c.with_failing_submissions());

        let outcome = scheduler.schedule(&ScheduleRequest::new(30), content).await;

        assert_eq!(outcome.success_count, 0);
        assert_eq!(outcome.error_count, MAX_CONSECUTIVE_FAILURES);
        assert!(outcome.handles.is_empty());
        assert!(outcome.stopped_early);
        assert_eq!(center.schedule_attempts().await, MAX_CONSECUTIVE_FAILURES);
    }

    #[tokio::test]
    async fn test_device_quota_yields_partial_success() {
        let (center, scheduler) = setup(Platform::Android, at(14, 23, 0), |c| c.with_quota(20));

        let outcome = scheduler.schedule(&ScheduleRequest::new(30), content).await;

        assert_eq!(outcome.success_count, 20);
        assert_eq!(outcome.error_count, 5);
        assert!(outcome.stopped_early);
        assert_eq!(center.pending_count().await, 20);
    }

    #[tokio::test]
    async fn test_cancel_existing_replaces_series() {
        let (center, scheduler) = setup(Platform::Ios, at(14, 23, 0), |c| c);
        prefill(&center, 10).await;

        scheduler.schedule(&ScheduleRequest::new(30), content).await;

        let count = scheduler.scheduled_count().await;
        assert!(count <= slot_count(30, 30).min(max_count(&Platform::Ios)));
        assert_eq!(count, 64);
        assert!(center.pending().await.iter().all(|n| n.content.title != "other"));
    }

    #[tokio::test]
    async fn test_additive_batch_keeps_existing() {
        let (center, scheduler) = setup(Platform::Ios, at(14, 23, 0), |c| c);
        prefill(&center, 10).await;

        scheduler.schedule(&ScheduleRequest::top_up(30), content).await;

        assert_eq!(center.pending_count().await, 74);
    }

    #[tokio::test]
    async fn test_invalid_interval_has_no_side_effects() {
        let (center, scheduler) = setup(Platform::Ios, at(14, 23, 0), |c| c);
        prefill(&center, 3).await;

        let outcome = scheduler.schedule(&ScheduleRequest::new(0), content).await;
        assert_eq!(outcome, SchedulingOutcome::empty());

        let outcome = scheduler.schedule(&ScheduleRequest::new(1441), content).await;
        assert_eq!(outcome, SchedulingOutcome::empty());

        assert_eq!(center.pending_count().await, 3);
        assert_eq!(center.schedule_attempts().await, 3);
    }

    #[tokio::test]
    async fn test_denied_permission_schedules_nothing() {
        let (center, scheduler) = setup(Platform::Ios, at(14, 23, 0), |c| {
            c.with_permission(PermissionStatus::Denied)
        });
        prefill(&center, 2).await;

        let outcome = scheduler.schedule(&ScheduleRequest::new(30), content).await;

        assert_eq!(outcome, SchedulingOutcome::empty());
        // Existing notifications are not cancelled either.
        assert_eq!(center.pending_count().await, 2);
    }

    /// Rejects every other submission.
    struct AlternatingCenter {
        inner: InMemoryNotificationCenter,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl NotificationCenter for AlternatingCenter {
        async fn permission_status(&self) -> Result<PermissionStatus, PlatformError> {
            Ok(PermissionStatus::Granted)
        }

        async fn request_permission(&self) -> Result<PermissionStatus, PlatformError> {
            Ok(PermissionStatus::Granted)
        }

        async fn create_channel(&self, channel: &crate::ChannelConfig) -> Result<(), PlatformError> {
            self.inner.create_channel(channel).await
        }

        async fn schedule(
            &self,
            content: &NotificationContent,
            trigger: Trigger,
        ) -> Result<ScheduledHandle, PlatformError> {
            if self.calls.fetch_add(1, Ordering::SeqCst) % 2 == 1 {
                return Err(PlatformError::InvalidArgument("flaky".to_string()));
            }
            self.inner.schedule(content, trigger).await
        }

        async fn list_scheduled(&self) -> Result<Vec<ScheduledHandle>, PlatformError> {
            self.inner.list_scheduled().await
        }

        async fn cancel_all(&self) -> Result<(), PlatformError> {
            self.inner.cancel_all().await
        }
    }

    #[tokio::test]
    async fn test_success_resets_consecutive_failures() {
        let clock: Arc<dyn Clock> = Arc::new(ManualClock::new(at(14, 23, 0)));
        let center = Arc::new(AlternatingCenter {
            inner: InMemoryNotificationCenter::new(Arc::clone(&clock)),
            calls: AtomicUsize::new(0),
        });
        let scheduler = BatchScheduler::new(center, Platform::Ios, clock);

        let outcome = scheduler.schedule(&ScheduleRequest::new(30), content).await;

        assert_eq!(outcome.success_count, 32);
        assert_eq!(outcome.error_count, 32);
        assert!(!outcome.stopped_early);
    }
}
