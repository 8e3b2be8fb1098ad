//! Infrastructure layer for butlerd-client
//!
//! This crate contains adapters that implement the ports defined
//! in the application layer: the daemon process, socket sessions,
//! configuration file loading and traffic logging.

pub mod butlerd;
pub mod config;
pub mod logging;

// Re-export commonly used types
pub use butlerd::{
    client::ButlerClient,
    connector::TcpConnector,
    error::{ButlerError, Result},
    process::{DaemonCommand, DaemonProcess},
    session::{Session, SessionBuilder},
};
pub use config::{
    ConfigLoader, ConfigValidationError, FileConfig, FileDaemonConfig, FileLoggingConfig,
    FileRpcConfig,
};
pub use logging::JsonlTrafficLogger;
