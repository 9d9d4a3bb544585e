//! Preview of where a reminder series would land.

use chrono::{DateTime, FixedOffset, SecondsFormat};
use miette::{IntoDiagnostic, Result};
use monsoon_notify::capacity::max_count;
use monsoon_notify::slots::{first_aligned_slot, plan_slot, slot_count, within_lead_window};
use monsoon_notify::{MonitorConfig, Platform, ScheduleRequest};
use serde_json::{Value, json};

pub fn run(
    platform: &Platform,
    now: DateTime<FixedOffset>,
    config: &MonitorConfig,
    show: usize,
) -> Result<()> {
    let report = build(platform, now, config, show)?;
    let out = serde_json::to_string_pretty(&report).into_diagnostic()?;
    println!("{}", out);
    Ok(())
}

fn build(
    platform: &Platform,
    now: DateTime<FixedOffset>,
    config: &MonitorConfig,
    show: usize,
) -> Result<Value> {
    let interval = config.interval_minutes();
    let horizon = config.horizon_days();
    ScheduleRequest::new(interval)
        .with_horizon_days(horizon)
        .validate()
        .map_err(|e| miette::miette!("{}", e))?;

    let total = slot_count(interval, horizon);
    let ceiling = max_count(platform);
    let planned = total.min(ceiling);
    let first = first_aligned_slot(interval, &now);

    let slots: Vec<Value> = (0..planned.min(show))
        .map(|index| {
            let slot = plan_slot(&first, index, interval, &now);
            json!({
                "index": slot.index,
                "target": slot.target.to_rfc3339_opts(SecondsFormat::Secs, false),
                "seconds_from_now": slot.seconds_from_now,
                "submittable": within_lead_window(slot.seconds_from_now),
            })
        })
        .collect();

    Ok(json!({
        "platform": platform.to_string(),
        "now": now.to_rfc3339_opts(SecondsFormat::Secs, false),
        "interval_minutes": interval,
        "horizon_days": horizon,
        "first_slot": first.to_rfc3339_opts(SecondsFormat::Secs, false),
        "slot_count": total,
        "max_count": ceiling,
        "planned": planned,
        "slots": slots,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn at(rfc3339: &str) -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339(rfc3339).unwrap()
    }

    #[test]
    fn test_plan_for_android_half_hour() {
        let report = build(
            &Platform::Android,
            at("2025-06-14T14:23:00+07:00"),
            &MonitorConfig::default(),
            2,
        )
        .unwrap();

        assert_eq!(report["first_slot"], "2025-06-14T14:30:00+07:00");
        assert_eq!(report["slot_count"], 1440);
        assert_eq!(report["max_count"], 200);
        assert_eq!(report["planned"], 200);
        assert_eq!(report["slots"][1]["target"], "2025-06-14T15:00:00+07:00");
        assert_eq!(report["slots"][0]["seconds_from_now"], 420);
        assert_eq!(report["slots"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_plan_capped_by_slot_count() {
        let config = MonitorConfig {
            interval_minutes: Some(1440),
            horizon_days: Some(3),
            ..Default::default()
        };
        let report = build(&Platform::Ios, at("2025-06-14T23:50:00Z"), &config, 10).unwrap();

        assert_eq!(report["planned"], 3);
        assert_eq!(report["slots"].as_array().unwrap().len(), 3);
    }

    #[test]
    fn test_plan_rejects_bad_interval() {
        let config = MonitorConfig {
            interval_minutes: Some(0),
            ..Default::default()
        };
        assert!(build(&Platform::Ios, at("2025-06-14T12:00:00Z"), &config, 1).is_err());
    }
}
