//! Recurring local notifications for Monsoon.
//!
//! This crate keeps a rolling series of weather reminders queued on the
//! device:
//! - Aligns slots to clock boundaries of the chosen interval
//! - Caps each batch at the platform's pending-notification limit
//! - Tops the series up when the pending count runs low
//! - Announces new weather alerts as one-off notifications

mod alerts;
mod batch;
pub mod capacity;
mod center;
mod content;
mod error;
mod memory;
mod monitor;
mod permission;
mod service;
pub mod slots;
mod types;

pub use alerts::AlertTracker;
pub use batch::{BatchScheduler, MAX_CONSECUTIVE_FAILURES};
pub use center::{Clock, ManualClock, NotificationCenter, SystemClock};
pub use content::{
    AlertLevel, AlertSeverity, FALLBACK_BODY, WeatherAlert, overall_alert_content,
    recurring_update_content, weather_alert_content,
};
pub use error::{PlatformError, SchedulerError};
pub use memory::{InMemoryNotificationCenter, PendingNotification};
pub use monitor::{
    ContentFactory, DEFAULT_CHECK_PERIOD_SECS, DEFAULT_INTERVAL_MINUTES, DEFAULT_TOP_UP_THRESHOLD,
    INITIAL_SKIP_ABOVE, MonitorConfig, PeriodicCheck, RescheduleMonitor, SeriesState,
};
pub use permission::{ChannelConfig, Importance, PermissionGate, WEATHER_CHANNEL_ID};
pub use service::NotificationService;
pub use types::{
    DEFAULT_HORIZON_DAYS, MAX_INTERVAL_MINUTES, NotificationContent, PermissionStatus, Platform,
    ScheduleRequest, ScheduledHandle, SchedulingOutcome, Submission, TimeSlot, Trigger,
};
