//! Session connector port
//!
//! Defines how the bootstrap use case opens and authenticates a socket
//! session once the daemon has announced its endpoint.

use async_trait::async_trait;
use butlerd_domain::Endpoint;
use thiserror::Error;

/// Errors that can occur while opening a session
#[derive(Error, Debug)]
pub enum ConnectorError {
    #[error("Connection to {endpoint} failed: {reason}")]
    Connect { endpoint: Endpoint, reason: String },

    #[error("Authentication request failed: {0}")]
    Authenticate(String),
}

/// Opens sessions against a daemon endpoint
///
/// Implementations (adapters) live in the infrastructure layer.
#[async_trait]
pub trait SessionConnector: Send + Sync + 'static {
    type Session: Send + Sync + 'static;

    /// Connect to `endpoint` and start reading from it.
    async fn connect(&self, endpoint: Endpoint) -> Result<Self::Session, ConnectorError>;

    /// Present `secret` on `session`. `Ok(false)` means the daemon refused it.
    async fn authenticate(
        &self,
        session: &Self::Session,
        secret: &str,
    ) -> Result<bool, ConnectorError>;
}
