//! Error types for notification scheduling.

use thiserror::Error;

/// Errors reported by the platform notification store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlatformError {
    /// The device refused another pending notification.
    #[error("notification quota exceeded")]
    QuotaExceeded,

    /// The platform rejected the request arguments.
    #[error("invalid notification argument: {0}")]
    InvalidArgument(String),

    /// The notification service could not be reached.
    #[error("notification service unavailable: {0}")]
    Unavailable(String),
}

/// Errors that can occur while preparing a scheduling batch.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Interval outside `1..=1440` minutes.
    #[error("interval must be between 1 and 1440 minutes, got {0}")]
    InvalidInterval(u32),

    /// Horizon of zero days.
    #[error("horizon must be at least one day, got {0}")]
    InvalidHorizon(u32),

    /// Platform notification store error.
    #[error("platform error: {0}")]
    Platform(#[from] PlatformError),
}
