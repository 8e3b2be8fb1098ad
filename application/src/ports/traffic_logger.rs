//! Port for recording raw protocol traffic.
//!
//! Every line read from or written to the daemon can be handed to a
//! [`TrafficLogger`]. This is separate from `tracing`-based diagnostics:
//! tracing carries human-readable messages, while this port keeps a
//! machine-readable transcript (JSONL) of the wire.

use std::fmt;

/// Which stream a line travelled on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    /// The daemon's standard output.
    Daemon,
    /// The TCP socket session.
    Socket,
}

impl Channel {
    pub fn as_str(self) -> &'static str {
        match self {
            Channel::Daemon => "daemon",
            Channel::Socket => "socket",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Inbound,
    Outbound,
}

impl Direction {
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Inbound => "in",
            Direction::Outbound => "out",
        }
    }
}

/// Port for logging wire traffic.
///
/// `record` is synchronous and non-fallible; failures are swallowed by the
/// implementation so logging never disturbs the session.
pub trait TrafficLogger: Send + Sync {
    fn record(&self, channel: Channel, direction: Direction, line: &str);
}

/// No-op implementation for tests and when traffic logging is disabled.
pub struct NoTrafficLogger;

impl TrafficLogger for NoTrafficLogger {
    fn record(&self, _channel: Channel, _direction: Direction, _line: &str) {}
}
