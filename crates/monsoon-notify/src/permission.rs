//! Notification permission gate.
//!
//! Every scheduling path asks the gate first. A missing permission is an
//! expected outcome, reported as `false`, never as an error.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::{NotificationCenter, PermissionStatus, Platform};

/// Identifier of the channel weather reminders are posted to.
pub const WEATHER_CHANNEL_ID: &str = "weather-alerts";

/// How intrusively a channel presents its notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Importance {
    Low,
    Default,
    High,
}

/// Settings of a notification channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelConfig {
    pub id: String,
    pub name: String,
    pub importance: Importance,
    /// Alternating off/on durations in milliseconds.
    pub vibration_pattern: Vec<u64>,
    pub light_color: String,
    pub sound: Option<String>,
    pub enable_vibrate: bool,
    pub show_badge: bool,
}

impl ChannelConfig {
    /// The high-importance channel used for weather reminders.
    pub fn weather_alerts() -> Self {
        Self {
            id: WEATHER_CHANNEL_ID.to_string(),
            name: "Weather alerts".to_string(),
            importance: Importance::High,
            vibration_pattern: vec![0, 250, 250, 250],
            light_color: "#FF231F7C".to_string(),
            sound: Some("default".to_string()),
            enable_vibrate: true,
            show_badge: true,
        }
    }
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self::weather_alerts()
    }
}

/// Checks, and if needed requests, notification permission.
pub struct PermissionGate {
    center: Arc<dyn NotificationCenter>,
    platform: Platform,
    channel: ChannelConfig,
    channel_ready: OnceCell<()>,
}

impl PermissionGate {
    pub fn new(center: Arc<dyn NotificationCenter>, platform: Platform) -> Self {
        Self::with_channel(center, platform, ChannelConfig::weather_alerts())
    }

    pub fn with_channel(
        center: Arc<dyn NotificationCenter>,
        platform: Platform,
        channel: ChannelConfig,
    ) -> Self {
        Self {
            center,
            platform,
            channel,
            channel_ready: OnceCell::new(),
        }
    }

    pub fn platform(&self) -> &Platform {
        &self.platform
    }

    /// Returns `true` when notifications may be scheduled.
    ///
    /// Prompts only while the decision is still open; a denial is returned
    /// as `false` without prompting again.
    #[tracing::instrument(skip(self), fields(platform = %self.platform))]
    pub async fn ensure_permission(&self) -> bool {
        if self.platform.uses_channels() {
            self.ensure_channel().await;
        }

        let status = match self.center.permission_status().await {
            Ok(status) => status,
            Err(e) => {
                warn!(error = %e, "failed to read notification permission");
                return false;
            }
        };

        match status {
            PermissionStatus::Granted => true,
            PermissionStatus::Denied => {
                debug!("notification permission denied");
                false
            }
            PermissionStatus::Undetermined => match self.center.request_permission().await {
                Ok(PermissionStatus::Granted) => {
                    info!("notification permission granted");
                    true
                }
                Ok(status) => {
                    warn!(?status, "user did not grant notification permission");
                    false
                }
                Err(e) => {
                    warn!(error = %e, "failed to request notification permission");
                    false
                }
            },
        }
    }

    /// Create the channel once; a failed attempt is retried on the next call.
    async fn ensure_channel(&self) {
        let result = self
            .channel_ready
            .get_or_try_init(|| async {
                self.center.create_channel(&self.channel).await?;
                debug!(channel = %self.channel.id, "notification channel ready");
                Ok::<(), crate::PlatformError>(())
            })
            .await;

        if let Err(e) = result {
            warn!(channel = %self.channel.id, error = %e, "failed to create notification channel");
        }
    }
}
