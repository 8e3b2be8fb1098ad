//! Inbound dispatch and outbound correlation.
//!
//! - [`registry`]: name-keyed handler tables for notifications and requests
//! - [`pending`]: outstanding outbound requests awaiting their response

pub mod pending;
pub mod registry;
