//! In-memory notification store.
//!
//! Behaves like the device store closely enough to exercise the scheduler
//! without a phone: pending notifications carry their fire time, a quota can
//! be imposed, and submissions can be made to fail.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, FixedOffset};
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::{
    ChannelConfig, Clock, NotificationCenter, NotificationContent, PermissionStatus,
    PlatformError, ScheduledHandle, Trigger,
};

/// A notification waiting to fire.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingNotification {
    pub handle: ScheduledHandle,
    pub content: NotificationContent,
    pub fire_at: DateTime<FixedOffset>,
}

#[derive(Debug)]
struct StoreState {
    pending: Vec<PendingNotification>,
    delivered: Vec<NotificationContent>,
    permission: PermissionStatus,
    grant_on_request: bool,
    quota: Option<usize>,
    fail_submissions: bool,
    permission_requests: usize,
    schedule_attempts: usize,
    channels: Vec<ChannelConfig>,
    channel_creations: usize,
}

/// Notification store kept entirely in memory.
pub struct InMemoryNotificationCenter {
    clock: Arc<dyn Clock>,
    state: RwLock<StoreState>,
}

impl InMemoryNotificationCenter {
    /// Empty store whose permission is still undetermined and will be granted
    /// when requested.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            state: RwLock::new(StoreState {
                pending: Vec::new(),
                delivered: Vec::new(),
                permission: PermissionStatus::Undetermined,
                grant_on_request: true,
                quota: None,
                fail_submissions: false,
                permission_requests: 0,
                schedule_attempts: 0,
                channels: Vec::new(),
                channel_creations: 0,
            }),
        }
    }

    pub fn with_permission(mut self, status: PermissionStatus) -> Self {
        self.state.get_mut().permission = status;
        self
    }

    /// Answer given when permission is requested.
    pub fn with_grant_on_request(mut self, grant: bool) -> Self {
        self.state.get_mut().grant_on_request = grant;
        self
    }

    /// Reject submissions once this many notifications are pending.
    pub fn with_quota(mut self, quota: usize) -> Self {
        self.state.get_mut().quota = Some(quota);
        self
    }

    /// Reject every submission.
    pub fn with_failing_submissions(mut self) -> Self {
        self.state.get_mut().fail_submissions = true;
        self
    }

    pub async fn set_failing_submissions(&self, fail: bool) {
        self.state.write().await.fail_submissions = fail;
    }

    pub async fn set_permission(&self, status: PermissionStatus) {
        self.state.write().await.permission = status;
    }

    /// Pending notifications in submission order.
    pub async fn pending(&self) -> Vec<PendingNotification> {
        self.state.read().await.pending.clone()
    }

    pub async fn pending_count(&self) -> usize {
        self.state.read().await.pending.len()
    }

    /// Notifications already presented to the user.
    pub async fn delivered(&self) -> Vec<NotificationContent> {
        self.state.read().await.delivered.clone()
    }

    pub async fn permission_requests(&self) -> usize {
        self.state.read().await.permission_requests
    }

    /// Scheduling calls received, successful or not.
    pub async fn schedule_attempts(&self) -> usize {
        self.state.read().await.schedule_attempts
    }

    pub async fn channels(&self) -> Vec<ChannelConfig> {
        self.state.read().await.channels.clone()
    }

    pub async fn channel_creations(&self) -> usize {
        self.state.read().await.channel_creations
    }

    /// Present every notification due at or before `until`.
    ///
    /// Returns how many were delivered.
    pub async fn deliver_due(&self, until: DateTime<FixedOffset>) -> usize {
        let mut state = self.state.write().await;
        let (due, remaining): (Vec<_>, Vec<_>) = std::mem::take(&mut state.pending)
            .into_iter()
            .partition(|n| n.fire_at <= until);
        state.pending = remaining;

        let count = due.len();
        state.delivered.extend(due.into_iter().map(|n| n.content));
        debug!(count, until = %until, "delivered due notifications");
        count
    }
}

#[async_trait]
impl NotificationCenter for InMemoryNotificationCenter {
    async fn permission_status(&self) -> Result<PermissionStatus, PlatformError> {
        Ok(self.state.read().await.permission)
    }

    async fn request_permission(&self) -> Result<PermissionStatus, PlatformError> {
        let mut state = self.state.write().await;
        state.permission_requests += 1;
        state.permission = if state.grant_on_request {
            PermissionStatus::Granted
        } else {
            PermissionStatus::Denied
        };
        Ok(state.permission)
    }

    async fn create_channel(&self, channel: &ChannelConfig) -> Result<(), PlatformError> {
        let mut state = self.state.write().await;
        state.channel_creations += 1;
        state.channels.retain(|c| c.id != channel.id);
        state.channels.push(channel.clone());
        Ok(())
    }

    async fn schedule(
        &self,
        content: &NotificationContent,
        trigger: Trigger,
    ) -> Result<ScheduledHandle, PlatformError> {
        let mut state = self.state.write().await;
        state.schedule_attempts += 1;

        if state.fail_submissions {
            return Err(PlatformError::Unavailable(
                "notification service rejected the request".to_string(),
            ));
        }

        let handle = ScheduledHandle::new(Uuid::new_v4().to_string());
        match trigger {
            Trigger::Immediate => {
                state.delivered.push(content.clone());
            }
            Trigger::After { seconds } => {
                if seconds == 0 {
                    return Err(PlatformError::InvalidArgument(
                        "delay must be positive".to_string(),
                    ));
                }
                if state.quota.is_some_and(|quota| state.pending.len() >= quota) {
                    return Err(PlatformError::QuotaExceeded);
                }
                let fire_at = self.clock.now() + Duration::seconds(seconds as i64);
                state.pending.push(PendingNotification {
                    handle: handle.clone(),
                    content: content.clone(),
                    fire_at,
                });
            }
        }

        Ok(handle)
    }

    async fn list_scheduled(&self) -> Result<Vec<ScheduledHandle>, PlatformError> {
        Ok(self
            .state
            .read()
            .await
            .pending
            .iter()
            .map(|n| n.handle.clone())
            .collect())
    }

    async fn cancel_all(&self) -> Result<(), PlatformError> {
        self.state.write().await.pending.clear();
        Ok(())
    }
}
