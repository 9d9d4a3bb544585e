//! Notification scheduling types.

use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, FixedOffset, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{PlatformError, SchedulerError};

/// Default number of days a batch tries to cover.
pub const DEFAULT_HORIZON_DAYS: u32 = 30;

/// Longest accepted interval between reminders (one day).
pub const MAX_INTERVAL_MINUTES: u32 = 1440;

/// Title, body and opaque data of a local notification.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NotificationContent {
    pub title: String,
    pub body: String,
    #[serde(default)]
    pub data: Map<String, Value>,
}

impl NotificationContent {
    /// Create content with an empty data map.
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
            data: Map::new(),
        }
    }

    /// Attach a data entry.
    pub fn with_data(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }

    /// Copy of this content carrying the metadata of one recurring slot.
    pub fn for_slot(&self, slot: &TimeSlot, interval_minutes: u32) -> Self {
        let mut content = self.clone();
        content.data.insert(
            "scheduledTime".to_string(),
            Value::String(
                slot.target
                    .with_timezone(&Utc)
                    .to_rfc3339_opts(SecondsFormat::Millis, true),
            ),
        );
        content
            .data
            .insert("intervalMinutes".to_string(), Value::from(interval_minutes));
        content
    }
}

/// Parameters of one recurring batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleRequest {
    /// Minutes between consecutive reminders.
    pub interval_minutes: u32,
    /// How many days ahead the batch tries to cover.
    pub horizon_days: u32,
    /// Clear every pending notification before scheduling.
    pub cancel_existing: bool,
}

impl ScheduleRequest {
    /// Request covering the default horizon, replacing whatever is pending.
    pub fn new(interval_minutes: u32) -> Self {
        Self {
            interval_minutes,
            horizon_days: DEFAULT_HORIZON_DAYS,
            cancel_existing: true,
        }
    }

    /// Additive request that keeps pending notifications.
    pub fn top_up(interval_minutes: u32) -> Self {
        Self {
            cancel_existing: false,
            ..Self::new(interval_minutes)
        }
    }

    pub fn with_horizon_days(mut self, days: u32) -> Self {
        self.horizon_days = days;
        self
    }

    pub fn with_cancel_existing(mut self, cancel_existing: bool) -> Self {
        self.cancel_existing = cancel_existing;
        self
    }

    /// Check the interval and horizon bounds.
    pub fn validate(&self) -> Result<(), SchedulerError> {
        if self.interval_minutes == 0 || self.interval_minutes > MAX_INTERVAL_MINUTES {
            return Err(SchedulerError::InvalidInterval(self.interval_minutes));
        }
        if self.horizon_days == 0 {
            return Err(SchedulerError::InvalidHorizon(self.horizon_days));
        }
        Ok(())
    }
}

/// One future instant of a recurring series.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeSlot {
    /// Position in the series, starting at zero.
    pub index: usize,
    /// Wall-clock instant the notification should fire at.
    pub target: DateTime<FixedOffset>,
    /// Whole seconds between the submission instant and `target`.
    pub seconds_from_now: i64,
}

/// Opaque identifier the platform returns for a scheduled notification.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScheduledHandle(String);

impl ScheduledHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ScheduledHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// When a one-shot notification fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// Present right away.
    Immediate,
    /// Fire once after the given delay.
    After { seconds: u64 },
}

/// Result of handing one slot to the platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submission {
    Submitted(ScheduledHandle),
    Rejected(PlatformError),
}

/// What one batch achieved.
///
/// Built fresh per batch and handed back to the caller. The platform store
/// stays the source of truth for what is still pending.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SchedulingOutcome {
    /// Handles in slot order.
    pub handles: Vec<ScheduledHandle>,
    /// Slots planned after the capacity cap.
    pub planned: usize,
    pub success_count: usize,
    pub error_count: usize,
    /// Slots dropped for falling outside the lead-time window.
    pub skipped_count: usize,
    /// Whether the consecutive-failure ceiling ended the batch.
    pub stopped_early: bool,
}

impl SchedulingOutcome {
    pub fn empty() -> Self {
        Self::default()
    }
}

/// Notification permission as reported by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionStatus {
    Granted,
    Denied,
    Undetermined,
}

/// Operating system the client runs on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    Ios,
    Android,
    /// Anything else; treated with the most conservative limits.
    Other(String),
}

impl Platform {
    /// The platform this binary was built for.
    pub fn current() -> Self {
        if cfg!(target_os = "ios") {
            Platform::Ios
        } else if cfg!(target_os = "android") {
            Platform::Android
        } else {
            Platform::Other(std::env::consts::OS.to_string())
        }
    }

    /// Whether notifications must be routed through a channel.
    pub fn uses_channels(&self) -> bool {
        matches!(self, Platform::Android)
    }
}

impl FromStr for Platform {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_lowercase().as_str() {
            "ios" => Platform::Ios,
            "android" => Platform::Android,
            other => Platform::Other(other.to_string()),
        })
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Platform::Ios => f.write_str("ios"),
            Platform::Android => f.write_str("android"),
            Platform::Other(name) => f.write_str(name),
        }
    }
}
