//! butlerd adapter
//!
//! Spawns the daemon, follows its standard output, and speaks JSON-RPC over
//! the socket it announces.

pub mod client;
pub mod connector;
pub mod error;
pub mod extensions;
pub mod process;
pub(crate) mod router;
pub mod session;
pub mod transport;
