//! Daemon notifications read from the worker's standard output.
//!
//! The daemon prints one JSON object per line, each tagged with a `type`
//! field. Unlike the socket protocol there are no requests or responses here:
//! a line is either a typed notification or noise.

pub mod address;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use serde_json::value::RawValue;
use thiserror::Error;

pub use address::{AddressError, Endpoint};

/// Type tag of the notification advertising the socket endpoint.
pub const LISTEN_NOTIFICATION_TYPE: &str = "butlerd/listen-notification";

/// Type tag of daemon log lines.
pub const LOG_NOTIFICATION_TYPE: &str = "log";

/// A classified stdout line.
#[derive(Debug, Clone)]
pub enum DaemonLine {
    /// A JSON object with a string `type`. `body` is the whole line.
    Notification {
        notification_type: String,
        body: Box<RawValue>,
    },
    /// Not JSON at all; the daemon printed plain text.
    Text(String),
    /// JSON, but not a usable notification.
    Malformed(DaemonLineError),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DaemonLineError {
    #[error("daemon notification is not a JSON object")]
    NotAnObject,

    #[error("daemon notification has no `type` element")]
    MissingType,

    #[error("daemon notification has a `null` type")]
    NullType,

    #[error("daemon notification has a non-string type {0}")]
    NonStringType(String),
}

/// Classify one line of daemon output.
pub fn classify_daemon_line(line: &str) -> DaemonLine {
    let value: Value = match serde_json::from_str(line) {
        Ok(value) => value,
        Err(_) => return DaemonLine::Text(line.to_string()),
    };

    let Some(object) = value.as_object() else {
        return DaemonLine::Malformed(DaemonLineError::NotAnObject);
    };

    let notification_type = match object.get("type") {
        None => return DaemonLine::Malformed(DaemonLineError::MissingType),
        Some(Value::Null) => return DaemonLine::Malformed(DaemonLineError::NullType),
        Some(Value::String(t)) => t.clone(),
        Some(other) => {
            return DaemonLine::Malformed(DaemonLineError::NonStringType(other.to_string()));
        }
    };

    match serde_json::value::to_raw_value(&value) {
        Ok(body) => DaemonLine::Notification {
            notification_type,
            body,
        },
        Err(_) => DaemonLine::Malformed(DaemonLineError::NotAnObject),
    }
}

/// Severity of a daemon log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warning,
    Error,
}

impl LogLevel {
    /// Map the daemon's level string; unknown levels become `Trace`.
    pub fn parse(level: &str) -> Self {
        match level {
            "debug" => LogLevel::Debug,
            "info" => LogLevel::Info,
            "warning" => LogLevel::Warning,
            "error" => LogLevel::Error,
            _ => LogLevel::Trace,
        }
    }
}

/// `{"type":"log", level, message, time}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogNotification {
    pub level: String,
    pub message: String,
    pub time: i64,
}

impl LogNotification {
    pub fn log_level(&self) -> LogLevel {
        LogLevel::parse(&self.level)
    }

    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.time, 0)
    }
}

/// `{"type":"butlerd/listen-notification", secret, tcp: {address}, time}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListenNotification {
    pub secret: String,
    pub tcp: TcpListenInfo,
    pub time: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TcpListenInfo {
    pub address: String,
}

impl ListenNotification {
    pub fn endpoint(&self) -> Result<Endpoint, AddressError> {
        Endpoint::parse(&self.tcp.address)
    }

    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.time, 0)
    }
}
