//! Built-in socket methods and notifications.
//!
//! These are the only method payloads the client itself understands; every
//! other method is carried opaquely for the caller.

use crate::daemon::LogLevel;
use serde::{Deserialize, Serialize};

/// Handshake request sent first on every socket session.
pub const META_AUTHENTICATE: &str = "Meta.Authenticate";

/// Long-lived request that opens the daemon's event flow.
pub const META_FLOW: &str = "Meta.Flow";

/// Notification sent by the daemon once `Meta.Flow` is established.
pub const META_FLOW_ESTABLISHED: &str = "MetaFlowEstablished";

/// Socket-level log notification.
pub const LOG_NOTIFICATION: &str = "Log";

/// Socket-level progress notification.
pub const PROGRESS_NOTIFICATION: &str = "Progress";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthenticateParams {
    pub secret: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthenticateResult {
    #[serde(default)]
    pub ok: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaFlowEstablished {
    pub pid: i64,
}

/// `Log` notification received over the socket.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SocketLogNotification {
    pub level: String,
    pub message: String,
}

impl SocketLogNotification {
    pub fn log_level(&self) -> LogLevel {
        LogLevel::parse(&self.level)
    }
}

/// `Progress` notification received over the socket.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressNotification {
    /// Completion in `[0, 1]`.
    pub progress: f64,
    /// Estimated seconds remaining.
    pub eta: f64,
    /// Bytes per second.
    pub bps: f64,
}
