//! Application-level configuration.
//!
//! Options that control how a socket session behaves once connected.

use std::time::Duration;

/// Default cap on a single inbound line (16 MiB).
pub const DEFAULT_MAX_LINE_BYTES: usize = 16 * 1024 * 1024;

/// Session behavior configuration.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Default deadline for outbound requests. `None` waits indefinitely.
    pub request_timeout: Option<Duration>,
    /// Answer requests for unregistered methods with `-32601` instead of
    /// leaving them unanswered.
    pub reply_method_not_found: bool,
    /// Lines longer than this are discarded with a warning.
    pub max_line_bytes: usize,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            request_timeout: None,
            reply_method_not_found: false,
            max_line_bytes: DEFAULT_MAX_LINE_BYTES,
        }
    }
}

impl SessionOptions {
    /// Creates options from an optional timeout in seconds.
    ///
    /// If `seconds` is `None` (or zero), no timeout is applied.
    pub fn from_timeout_seconds(seconds: Option<u64>) -> Self {
        Self {
            request_timeout: seconds.filter(|s| *s > 0).map(Duration::from_secs),
            ..Self::default()
        }
    }

    pub fn with_request_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_reply_method_not_found(mut self, reply: bool) -> Self {
        self.reply_method_not_found = reply;
        self
    }

    pub fn with_max_line_bytes(mut self, max: usize) -> Self {
        self.max_line_bytes = max;
        self
    }
}
