//! Raw TOML configuration data types
//!
//! These structs represent the exact structure of the TOML config file.
//! Every section is optional; missing keys take their defaults.

use butlerd_application::SessionOptions;
use butlerd_application::config::DEFAULT_MAX_LINE_BYTES;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Configuration validation errors
#[derive(Debug, Error)]
pub enum ConfigValidationError {
    #[error("daemon.binary cannot be empty")]
    EmptyBinary,

    #[error("daemon.db_path cannot be empty")]
    EmptyDbPath,

    #[error("rpc.request_timeout_secs cannot be 0")]
    InvalidTimeout,

    #[error("rpc.max_line_bytes cannot be 0")]
    InvalidMaxLineBytes,
}

/// How to launch the daemon
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FileDaemonConfig {
    /// Executable name (looked up on `PATH`) or path
    pub binary: String,
    /// Database passed as `--dbpath`
    pub db_path: PathBuf,
    /// Appended after the built-in arguments
    pub extra_args: Vec<String>,
}

impl Default for FileDaemonConfig {
    fn default() -> Self {
        Self {
            binary: "butler".to_string(),
            db_path: PathBuf::from("butler.db"),
            extra_args: Vec::new(),
        }
    }
}

/// Socket session behavior
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FileRpcConfig {
    /// Default deadline for outbound requests
    pub request_timeout_secs: Option<u64>,
    /// Answer unknown inbound methods with `-32601`
    pub reply_method_not_found: bool,
    pub max_line_bytes: usize,
    /// Open `Meta.Flow` on the global session once ready
    pub meta_flow: bool,
}

impl Default for FileRpcConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: None,
            reply_method_not_found: false,
            max_line_bytes: DEFAULT_MAX_LINE_BYTES,
            meta_flow: false,
        }
    }
}

impl FileRpcConfig {
    pub fn session_options(&self) -> SessionOptions {
        SessionOptions::default()
            .with_request_timeout(self.request_timeout_secs.map(Duration::from_secs))
            .with_reply_method_not_found(self.reply_method_not_found)
            .with_max_line_bytes(self.max_line_bytes)
    }
}

/// Log destinations
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FileLoggingConfig {
    /// JSONL transcript of every wire line
    pub traffic_log: Option<PathBuf>,
    /// Diagnostic log file (in addition to stderr)
    pub file: Option<PathBuf>,
}

/// Complete configuration file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub daemon: FileDaemonConfig,
    pub rpc: FileRpcConfig,
    pub logging: FileLoggingConfig,
}

impl FileConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if self.daemon.binary.trim().is_empty() {
            return Err(ConfigValidationError::EmptyBinary);
        }
        if self.daemon.db_path.as_os_str().is_empty() {
            return Err(ConfigValidationError::EmptyDbPath);
        }
        if let Some(0) = self.rpc.request_timeout_secs {
            return Err(ConfigValidationError::InvalidTimeout);
        }
        if self.rpc.max_line_bytes == 0 {
            return Err(ConfigValidationError::InvalidMaxLineBytes);
        }
        Ok(())
    }
}
