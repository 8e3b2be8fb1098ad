//! Error types for the butlerd adapter

use butlerd_application::{BootstrapError, RegistryError};
use butlerd_domain::{AddressError, ErrorCode, RpcFault};
use std::time::Duration;
use thiserror::Error;

/// Result type alias for butlerd operations
pub type Result<T> = std::result::Result<T, ButlerError>;

/// Errors that can occur when talking to butlerd
#[derive(Error, Debug)]
pub enum ButlerError {
    #[error("butlerd binary not found: {binary}")]
    DaemonNotInstalled {
        binary: String,
        #[source]
        source: which::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Failed to decode {type_name}: {source}")]
    Decode {
        type_name: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Rpc(#[from] RpcFault),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Bootstrap(#[from] BootstrapError),

    #[error("Invalid daemon address: {0}")]
    InvalidAddress(#[from] AddressError),

    #[error("params for {method} must be a JSON object")]
    ParamsNotObject { method: String },

    #[error("Daemon rejected the authentication secret")]
    AuthenticationFailed,

    #[error("Client is not ready")]
    NotReady,

    #[error("Session closed")]
    SessionClosed,

    #[error("Request cancelled")]
    Cancelled,

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),
}

impl ButlerError {
    /// The typed error kind when this is a JSON-RPC error response.
    pub fn rpc_kind(&self) -> Option<ErrorCode> {
        match self {
            ButlerError::Rpc(fault) => fault.kind,
            _ => None,
        }
    }
}
