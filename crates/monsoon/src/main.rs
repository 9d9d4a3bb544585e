//! Monsoon: recurring weather reminders
//!
//! Host-side binary with subcommands:
//! - `plan`: show where a reminder series would land
//! - `simulate`: run the scheduler against an in-memory notification store

use std::convert::Infallible;

use chrono::{DateTime, FixedOffset, Local};
use clap::{Args, Parser, Subcommand};
use miette::Result;
use monsoon_notify::{MonitorConfig, Platform};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod plan;
mod simulate;

/// Parse boolean from environment variable, accepting common truthy values.
fn parse_bool_env(s: &str) -> Result<bool, String> {
    match s.to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(format!(
            "invalid boolean value '{}', expected 1/true/yes/on or 0/false/no/off",
            s
        )),
    }
}

fn parse_instant(s: &str) -> Result<DateTime<FixedOffset>, String> {
    DateTime::parse_from_rfc3339(s).map_err(|e| format!("invalid RFC 3339 instant '{}': {}", s, e))
}

fn parse_platform(s: &str) -> Result<Platform, String> {
    s.parse().map_err(|e: Infallible| match e {})
}

#[derive(Parser)]
#[command(name = "monsoon")]
#[command(about = "Recurring weather reminders", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Settings shared by every subcommand.
#[derive(Args, Debug, Clone)]
struct SeriesArgs {
    /// Platform whose limits apply (ios, android, or any other name).
    /// Defaults to the platform this binary was built for.
    #[arg(long, env = "MONSOON_PLATFORM", value_parser = parse_platform)]
    platform: Option<Platform>,

    /// Minutes between reminders
    #[arg(long, env = "MONSOON_INTERVAL_MINUTES")]
    interval_minutes: Option<u32>,

    /// Days ahead to fill with reminders
    #[arg(long, env = "MONSOON_HORIZON_DAYS")]
    horizon_days: Option<u32>,

    /// Pretend the current time is this RFC 3339 instant
    #[arg(long, env = "MONSOON_NOW", value_parser = parse_instant)]
    now: Option<DateTime<FixedOffset>>,
}

impl SeriesArgs {
    fn platform(&self) -> Platform {
        self.platform.clone().unwrap_or_else(Platform::current)
    }

    fn now(&self) -> DateTime<FixedOffset> {
        self.now.unwrap_or_else(|| Local::now().fixed_offset())
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Print the slots a new series would occupy
    Plan {
        #[command(flatten)]
        series: SeriesArgs,

        /// Number of slot instants to list
        #[arg(long, default_value = "5")]
        show: usize,
    },

    /// Initialize a series in memory, let time pass, then run a top-up check
    Simulate {
        #[command(flatten)]
        series: SeriesArgs,

        /// Pending count below which the top-up check schedules more
        #[arg(long, env = "MONSOON_THRESHOLD")]
        threshold: Option<usize>,

        /// Reject submissions once this many notifications are pending
        #[arg(long, env = "MONSOON_QUOTA")]
        quota: Option<usize>,

        /// Deliver every notification due at or before this RFC 3339
        /// instant before the top-up check
        #[arg(long, value_parser = parse_instant)]
        deliver_until: Option<DateTime<FixedOffset>>,

        /// Reject every submission
        #[arg(long, env = "MONSOON_FAIL_SUBMISSIONS", value_parser = parse_bool_env, default_value = "false")]
        fail_submissions: bool,

        /// Refuse the permission prompt
        #[arg(long)]
        deny_permission: bool,

        /// Forecast alert level shown in the reminder title
        #[arg(long)]
        level: Option<String>,

        /// Forecast comment shown in the reminder body
        #[arg(long)]
        comment: Option<String>,

        /// Location attached to the reminder
        #[arg(long, env = "MONSOON_LOCATION", default_value = "Current location")]
        location: String,
    },
}

impl From<&SeriesArgs> for MonitorConfig {
    fn from(args: &SeriesArgs) -> Self {
        MonitorConfig {
            interval_minutes: args.interval_minutes,
            horizon_days: args.horizon_days,
            ..Default::default()
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so stdout stays valid JSON
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "monsoon=info,monsoon_notify=info".to_string()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Plan { series, show } => plan::run(
            &series.platform(),
            series.now(),
            &MonitorConfig::from(&series),
            show,
        ),

        Commands::Simulate {
            series,
            threshold,
            quota,
            deliver_until,
            fail_submissions,
            deny_permission,
            level,
            comment,
            location,
        } => {
            let config = MonitorConfig {
                threshold,
                ..MonitorConfig::from(&series)
            };
            simulate::run(simulate::Options {
                platform: series.platform(),
                now: series.now(),
                config,
                quota,
                deliver_until,
                fail_submissions,
                deny_permission,
                level,
                comment,
                location,
            })
            .await
        }
    }
}
