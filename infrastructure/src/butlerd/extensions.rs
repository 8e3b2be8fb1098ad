//! Ready-made handlers for the daemon's built-in socket notifications.

use super::error::Result;
use super::session::SessionBuilder;
use butlerd_domain::LogLevel;
use butlerd_domain::protocol::meta::{
    LOG_NOTIFICATION, PROGRESS_NOTIFICATION, ProgressNotification, SocketLogNotification,
};
use butlerd_domain::util::{compress_bytes, format_minutes};
use tracing::{debug, error, info, trace, warn};

/// Emit a daemon log line through `tracing` under the `butlerd` target.
pub fn forward_log(level: LogLevel, message: &str) {
    match level {
        LogLevel::Trace => trace!(target: "butlerd", "{}", message),
        LogLevel::Debug => debug!(target: "butlerd", "{}", message),
        LogLevel::Info => info!(target: "butlerd", "{}", message),
        LogLevel::Warning => warn!(target: "butlerd", "{}", message),
        LogLevel::Error => error!(target: "butlerd", "{}", message),
    }
}

/// One-line summary such as `42.50% | ETA 1mins, 5s | 3.20 MiB/s`.
pub fn describe_progress(progress: &ProgressNotification) -> String {
    let (speed, unit) = compress_bytes(progress.bps);
    format!(
        "{:.2}% | ETA {} | {:.2} {}/s",
        progress.progress * 100.0,
        format_minutes(progress.eta),
        speed,
        unit
    )
}

impl SessionBuilder {
    /// Route `Log` notifications into `tracing`.
    pub fn with_log_forwarding(self) -> Result<Self> {
        self.on_notification(LOG_NOTIFICATION, |log: SocketLogNotification| {
            forward_log(log.log_level(), &log.message)
        })
    }

    /// Log `Progress` notifications at debug level.
    pub fn with_progress_logging(self) -> Result<Self> {
        self.on_notification(PROGRESS_NOTIFICATION, |progress: ProgressNotification| {
            debug!(target: "butlerd", "{}", describe_progress(&progress))
        })
    }
}
