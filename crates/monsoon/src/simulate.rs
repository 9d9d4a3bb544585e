//! Dry run of a reminder series against the in-memory notification store.

use std::sync::Arc;

use chrono::{DateTime, FixedOffset};
use miette::{IntoDiagnostic, Result};
use monsoon_notify::{
    Clock, InMemoryNotificationCenter, ManualClock, MonitorConfig, NotificationCenter,
    NotificationService, Platform, recurring_update_content,
};
use serde_json::{Value, json};
use tracing::info;

/// Everything a simulation run needs.
#[derive(Debug, Clone)]
pub struct Options {
    pub platform: Platform,
    pub now: DateTime<FixedOffset>,
    pub config: MonitorConfig,
    pub quota: Option<usize>,
    pub deliver_until: Option<DateTime<FixedOffset>>,
    pub fail_submissions: bool,
    pub deny_permission: bool,
    pub level: Option<String>,
    pub comment: Option<String>,
    pub location: String,
}

pub async fn run(options: Options) -> Result<()> {
    let report = simulate(options).await?;
    let out = serde_json::to_string_pretty(&report).into_diagnostic()?;
    println!("{}", out);
    Ok(())
}

async fn simulate(options: Options) -> Result<Value> {
    if let Some(until) = options.deliver_until
        && until < options.now
    {
        return Err(miette::miette!(
            "--deliver-until ({}) is before the simulated start ({})",
            until,
            options.now
        ));
    }

    let clock = Arc::new(ManualClock::new(options.now));
    let shared_clock: Arc<dyn Clock> = clock.clone();

    let mut center = InMemoryNotificationCenter::new(Arc::clone(&shared_clock))
        .with_grant_on_request(!options.deny_permission);
    if let Some(quota) = options.quota {
        center = center.with_quota(quota);
    }
    if options.fail_submissions {
        center = center.with_failing_submissions();
    }
    let center = Arc::new(center);

    let service = NotificationService::new(
        center.clone(),
        options.platform.clone(),
        shared_clock,
        options.config.clone(),
    );

    let level = options.level.clone();
    let comment = options.comment.clone();
    let location = options.location.clone();
    let content = move || recurring_update_content(level.as_deref(), comment.as_deref(), &location);

    info!(platform = %options.platform, now = %options.now, "starting simulation");
    let initial = service.initialize(content.clone()).await;
    let pending_after_initialize = center.pending_count().await;

    let mut delivered = 0;
    if let Some(until) = options.deliver_until {
        clock.set(until);
        delivered = center.deliver_due(until).await;
    }
    let pending_before_top_up = center.pending_count().await;

    let config = service.monitor().config();
    let topped_up = service
        .check_and_top_up(config.interval_minutes(), content, config.threshold())
        .await;
    let pending_after_top_up = center.pending_count().await;

    Ok(json!({
        "platform": options.platform.to_string(),
        "permission": center.permission_status().await.ok(),
        "initialize": initial,
        "pending_after_initialize": pending_after_initialize,
        "delivered": delivered,
        "pending_before_top_up": pending_before_top_up,
        "topped_up": topped_up,
        "pending_after_top_up": pending_after_top_up,
        "state": format!("{:?}", service.monitor().state()),
    }))
}
