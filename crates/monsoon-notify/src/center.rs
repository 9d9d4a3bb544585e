//! The platform notification store and the wall clock.

use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Duration, FixedOffset, Local};

use crate::{
    ChannelConfig, NotificationContent, PermissionStatus, PlatformError, ScheduledHandle, Trigger,
};

/// Local notification primitives offered by the operating system.
///
/// Every call is a round-trip to the platform; the scheduler awaits each one
/// before issuing the next.
#[async_trait]
pub trait NotificationCenter: Send + Sync {
    /// Current notification permission.
    async fn permission_status(&self) -> Result<PermissionStatus, PlatformError>;

    /// Prompt the user for permission and report the answer.
    async fn request_permission(&self) -> Result<PermissionStatus, PlatformError>;

    /// Create or update a notification channel. Idempotent per channel id.
    async fn create_channel(&self, channel: &ChannelConfig) -> Result<(), PlatformError>;

    /// Schedule a one-shot notification.
    async fn schedule(
        &self,
        content: &NotificationContent,
        trigger: Trigger,
    ) -> Result<ScheduledHandle, PlatformError>;

    /// Handles of every notification still pending.
    async fn list_scheduled(&self) -> Result<Vec<ScheduledHandle>, PlatformError>;

    /// Cancel every pending notification, whoever scheduled it.
    async fn cancel_all(&self) -> Result<(), PlatformError>;
}

/// Source of the current wall-clock time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<FixedOffset>;
}

/// The device clock, in the UTC offset currently in effect.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<FixedOffset> {
        Local::now().fixed_offset()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<FixedOffset>>,
}

impl ManualClock {
    pub fn new(now: DateTime<FixedOffset>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn set(&self, now: DateTime<FixedOffset>) {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner) = now;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<FixedOffset> {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
