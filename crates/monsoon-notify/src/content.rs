//! Notification content for weather updates and alerts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::NotificationContent;

/// Body used when a recurring update has no comment to show.
pub const FALLBACK_BODY: &str = "No weather information available";

/// Overall alert level of the current forecast.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertLevel {
    Extreme,
    Severe,
    Moderate,
    None,
    /// Any level the client does not recognise.
    Unrecognized,
}

impl AlertLevel {
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "extreme" => AlertLevel::Extreme,
            "severe" => AlertLevel::Severe,
            "moderate" => AlertLevel::Moderate,
            "none" => AlertLevel::None,
            _ => AlertLevel::Unrecognized,
        }
    }

    pub fn emoji(&self) -> &'static str {
        match self {
            AlertLevel::Extreme => "🔴",
            AlertLevel::Severe => "🟠",
            AlertLevel::Moderate => "🟡",
            AlertLevel::None => "✅",
            AlertLevel::Unrecognized => "ℹ️",
        }
    }

    pub fn heading(&self) -> &'static str {
        match self {
            AlertLevel::Extreme => "Extreme danger warning",
            AlertLevel::Severe => "Severe warning",
            AlertLevel::Moderate => "Moderate warning",
            AlertLevel::None => "Weather status",
            AlertLevel::Unrecognized => "Weather information",
        }
    }

    /// `"<emoji> <heading>"`.
    pub fn title(&self) -> String {
        format!("{} {}", self.emoji(), self.heading())
    }
}

/// Severity of an individual weather or flood alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertSeverity {
    Extreme,
    Severe,
    Moderate,
    Minor,
    #[serde(other)]
    Unknown,
}

impl AlertSeverity {
    fn badge(&self) -> (&'static str, &'static str) {
        match self {
            AlertSeverity::Extreme => ("🔴", "EXTREME"),
            AlertSeverity::Severe => ("🟠", "SEVERE"),
            AlertSeverity::Moderate => ("🟡", "MODERATE"),
            AlertSeverity::Minor => ("🟢", "MINOR"),
            AlertSeverity::Unknown => ("⚠️", "ALERT"),
        }
    }
}

/// A weather or flood-risk alert for an area.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherAlert {
    pub id: String,
    pub title: String,
    pub description: String,
    pub severity: AlertSeverity,
    pub area: String,
    /// Human-readable urgency, e.g. "Expected within 6 hours".
    pub urgency: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

/// Content of a one-off notification about the overall alert level.
pub fn overall_alert_content(level: &str, comment: &str, location: Option<&str>) -> NotificationContent {
    NotificationContent::new(AlertLevel::from_label(level).title(), comment)
        .with_data("type", "overall_alert")
        .with_data("level", level)
        .with_data("comment", comment)
        .with_data("location", location.map_or(Value::Null, Value::from))
}

/// Content reused by every slot of a recurring reminder batch.
pub fn recurring_update_content(
    level: Option<&str>,
    comment: Option<&str>,
    location: &str,
) -> NotificationContent {
    let level = level.filter(|l| !l.is_empty()).unwrap_or("none");
    let body = comment.filter(|c| !c.is_empty()).unwrap_or(FALLBACK_BODY);

    NotificationContent::new(AlertLevel::from_label(level).title(), body)
        .with_data("type", "recurring_weather_update")
        .with_data("level", level)
        .with_data("location", location)
}

/// Content of a notification announcing a single alert.
pub fn weather_alert_content(alert: &WeatherAlert) -> NotificationContent {
    let (emoji, label) = alert.severity.badge();

    NotificationContent::new(
        format!("{emoji} [{label}] {}", alert.title),
        format!("{}\n\n📍 {}\n⏰ {}", alert.description, alert.area, alert.urgency),
    )
    .with_data("type", "weather_alert")
    .with_data("alertId", alert.id.as_str())
    .with_data("severity", serde_json::to_value(alert.severity).unwrap_or(Value::Null))
    .with_data("area", alert.area.as_str())
    .with_data("urgency", alert.urgency.as_str())
    .with_data("startTime", alert.start_time.to_rfc3339())
    .with_data("endTime", alert.end_time.to_rfc3339())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    #[test_case("extreme", "🔴 Extreme danger warning")]
    #[test_case("SEVERE", "🟠 Severe warning")]
    #[test_case("moderate", "🟡 Moderate warning")]
    #[test_case("none", "✅ Weather status")]
    #[test_case("tsunami", "ℹ️ Weather information")]
    fn test_level_titles(level: &str, expected: &str) {
        assert_eq!(AlertLevel::from_label(level).title(), expected);
    }

    #[test]
    fn test_recurring_content_falls_back() {
        let content = recurring_update_content(None, Some(""), "Hue");

        assert_eq!(content.title, "✅ Weather status");
        assert_eq!(content.body, FALLBACK_BODY);
        assert_eq!(content.data["type"], "recurring_weather_update");
        assert_eq!(content.data["level"], "none");
        assert_eq!(content.data["location"], "Hue");
    }

    #[test]
    fn test_overall_content_without_location() {
        let content = overall_alert_content("severe", "Heavy rain expected", None);

        assert_eq!(content.title, "🟠 Severe warning");
        assert_eq!(content.body, "Heavy rain expected");
        assert_eq!(content.data["type"], "overall_alert");
        assert_eq!(content.data["location"], Value::Null);
    }

    #[test]
    fn test_weather_alert_layout() {
        let alert = WeatherAlert {
            id: "flood-42".to_string(),
            title: "Flood risk on Perfume River".to_string(),
            description: "Water levels rising".to_string(),
            severity: AlertSeverity::Severe,
            area: "Thua Thien Hue".to_string(),
            urgency: "Expected within 6 hours".to_string(),
            start_time: Utc.with_ymd_and_hms(2025, 10, 1, 0, 0, 0).unwrap(),
            end_time: Utc.with_ymd_and_hms(2025, 10, 2, 0, 0, 0).unwrap(),
        };

        let content = weather_alert_content(&alert);

        assert_eq!(content.title, "🟠 [SEVERE] Flood risk on Perfume River");
        assert_eq!(
            content.body,
            "Water levels rising\n\n📍 Thua Thien Hue\n⏰ Expected within 6 hours"
        );
        assert_eq!(content.data["alertId"], "flood-42");
        assert_eq!(content.data["severity"], "severe");
    }

    #[test]
    fn test_unknown_severity_kept_in_data() {
        let alert = WeatherAlert {
            id: "storm-7".to_string(),
            title: "Tropical depression".to_string(),
            description: "Strong winds".to_string(),
            severity: AlertSeverity::Unknown,
            area: "Da Nang".to_string(),
            urgency: "Monitor".to_string(),
            start_time: Utc.with_ymd_and_hms(2025, 10, 1, 0, 0, 0).unwrap(),
            end_time: Utc.with_ymd_and_hms(2025, 10, 2, 0, 0, 0).unwrap(),
        };

        let content = weather_alert_content(&alert);

        assert_eq!(content.title, "⚠️ [ALERT] Tropical depression");
        assert_eq!(content.data["severity"], "unknown");
    }

    #[test]
    fn test_unknown_severity_deserializes() {
        let severity: AlertSeverity = serde_json::from_str("\"catastrophic\"").unwrap();
        assert_eq!(severity, AlertSeverity::Unknown);
    }
}
