//! Application layer for butlerd-client
//!
//! This crate contains the handler registries, the pending-call table, port
//! definitions and the bootstrap use case.
//! It depends only on the domain layer.

pub mod config;
pub mod dispatch;
pub mod ports;
pub mod use_cases;

// Re-export commonly used types
pub use config::SessionOptions;
pub use dispatch::{
    pending::{CallOutcome, PendingCall, PendingCalls, Resolution},
    registry::{
        Dispatch, HandlerFault, NotificationRegistry, RegistryError, RequestRegistry,
        ResponseFuture,
    },
};
pub use ports::{
    session_connector::{ConnectorError, SessionConnector},
    traffic_logger::{Channel, Direction, NoTrafficLogger, TrafficLogger},
};
pub use use_cases::bootstrap::{BootstrapCoordinator, BootstrapError};
