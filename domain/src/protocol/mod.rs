//! JSON-RPC protocol model for the butlerd socket.
//!
//! - [`message`]: classification of incoming lines
//! - [`envelope`]: encoding of outgoing lines
//! - [`request_id`]: correlation ids
//! - [`error_code`]: the well-known error table and [`RpcFault`](error_code::RpcFault)
//! - [`meta`]: built-in methods (`Meta.Authenticate`, `Meta.Flow`, ...)

pub mod envelope;
pub mod error_code;
pub mod message;
pub mod meta;
pub mod request_id;
