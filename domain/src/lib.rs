//! Domain layer for butlerd-client
//!
//! This crate contains the pure protocol model: how lines from the daemon's
//! socket and standard output are classified, how outgoing messages are
//! encoded, and the lifecycle states the client moves through.
//! It performs no I/O.
//!
//! # Core Concepts
//!
//! ## Two channels
//!
//! - **Daemon notifications**: one-way `{"type": ...}` lines on the worker's
//!   standard output ([`daemon`]).
//! - **Socket session**: newline-delimited JSON-RPC 2.0 in both directions
//!   ([`protocol`]).
//!
//! ## Bootstrap
//!
//! The socket endpoint and its secret are only known once the daemon prints a
//! listen notification; [`lifecycle::BootstrapPhase`] models the path from
//! process start to an authenticated session.

pub mod daemon;
pub mod lifecycle;
pub mod protocol;
pub mod util;

// Re-export commonly used types
pub use daemon::{
    AddressError, DaemonLine, DaemonLineError, Endpoint, ListenNotification, LogLevel,
    LogNotification, classify_daemon_line,
};
pub use lifecycle::{BootstrapPhase, SessionState};
pub use protocol::{
    envelope::{encode_error, encode_notification, encode_request, encode_result},
    error_code::{ErrorCode, ErrorObject, RpcFault},
    message::{MalformedReason, Message, ResponseOutcome, classify},
    request_id::RequestId,
};
