//! Tracks which alerts the user has already been notified about.

use std::collections::HashSet;

use chrono::{DateTime, Utc};

use crate::WeatherAlert;

/// Remembers notified and dismissed alerts between refreshes.
#[derive(Debug, Default)]
pub struct AlertTracker {
    notified: HashSet<String>,
    dismissed: HashSet<String>,
    last_overall_key: Option<String>,
}

impl AlertTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hide an alert from every later pass.
    pub fn dismiss(&mut self, alert_id: impl Into<String>) {
        self.dismissed.insert(alert_id.into());
    }

    pub fn is_dismissed(&self, alert_id: &str) -> bool {
        self.dismissed.contains(alert_id)
    }

    /// Alerts that are not dismissed and have not ended yet.
    pub fn active<'a>(&self, alerts: &'a [WeatherAlert], now: DateTime<Utc>) -> Vec<&'a WeatherAlert> {
        alerts
            .iter()
            .filter(|a| !self.dismissed.contains(&a.id) && a.end_time > now)
            .collect()
    }

    /// Active alerts not seen in the previous pass.
    ///
    /// The remembered set becomes exactly the current active set, so an
    /// alert that drops out and comes back is announced again.
    pub fn new_alerts<'a>(
        &mut self,
        alerts: &'a [WeatherAlert],
        now: DateTime<Utc>,
    ) -> Vec<&'a WeatherAlert> {
        let active = self.active(alerts, now);
        let fresh = active
            .iter()
            .filter(|a| !self.notified.contains(&a.id))
            .copied()
            .collect();

        self.notified = active.iter().map(|a| a.id.clone()).collect();
        fresh
    }

    /// Whether the overall level or comment differs from the last call.
    pub fn overall_changed(&mut self, level: &str, comment: &str) -> bool {
        let key = format!("{level}_{comment}");
        if self.last_overall_key.as_deref() == Some(key.as_str()) {
            return false;
        }
        self.last_overall_key = Some(key);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::AlertSeverity;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 10, 1, 12, 0, 0).unwrap()
    }

    fn alert(id: &str, ends_in_hours: i64) -> WeatherAlert {
        WeatherAlert {
            id: id.to_string(),
            title: format!("Alert {id}"),
            description: "Rising water".to_string(),
            severity: AlertSeverity::Moderate,
            area: "Da Nang".to_string(),
            urgency: "Within 12 hours".to_string(),
            start_time: now() - Duration::hours(1),
            end_time: now() + Duration::hours(ends_in_hours),
        }
    }

    fn ids(alerts: &[&WeatherAlert]) -> Vec<String> {
        alerts.iter().map(|a| a.id.clone()).collect()
    }

    #[test]
    fn test_only_new_alerts_are_reported() {
        let mut tracker = AlertTracker::new();
        let first = vec![alert("a", 5), alert("b", 5)];
        assert_eq!(ids(&tracker.new_alerts(&first, now())), vec!["a", "b"]);

        let second = vec![alert("a", 5), alert("b", 5), alert("c", 5)];
        assert_eq!(ids(&tracker.new_alerts(&second, now())), vec!["c"]);
        assert!(tracker.new_alerts(&second, now()).is_empty());
    }

    #[test]
    fn test_expired_and_dismissed_are_inactive() {
        let mut tracker = AlertTracker::new();
        tracker.dismiss("b");
        let alerts = vec![alert("a", 5), alert("b", 5), alert("old", -1)];

        assert_eq!(ids(&tracker.active(&alerts, now())), vec!["a"]);
        assert!(tracker.is_dismissed("b"));
    }

    #[test]
    fn test_alert_returning_is_announced_again() {
        let mut tracker = AlertTracker::new();
        let with_a = vec![alert("a", 5)];
        tracker.new_alerts(&with_a, now());
        tracker.new_alerts(&[], now());

        assert_eq!(ids(&tracker.new_alerts(&with_a, now())), vec!["a"]);
    }

    #[test]
    fn test_overall_change_detection() {
        let mut tracker = AlertTracker::new();
        assert!(tracker.overall_changed("none", "Clear"));
        assert!(!tracker.overall_changed("none", "Clear"));
        assert!(tracker.overall_changed("moderate", "Clear"));
        assert!(tracker.overall_changed("moderate", "Showers"));
    }
}
