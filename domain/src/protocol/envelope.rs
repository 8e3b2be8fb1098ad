//! Outgoing wire envelopes.
//!
//! Each function produces one line of JSON (without the trailing newline).
//! `jsonrpc` is always emitted first; notification `params` are omitted when
//! absent and never sent as `null`.

use super::error_code::ErrorObject;
use super::request_id::RequestId;
use serde::Serialize;
use serde_json::Value;

/// JSON-RPC protocol version tag.
pub const JSONRPC_VERSION: &str = "2.0";

#[derive(Debug, Serialize)]
struct RequestEnvelope<'a> {
    jsonrpc: &'static str,
    method: &'a str,
    params: &'a Value,
    id: &'a RequestId,
}

#[derive(Debug, Serialize)]
struct NotificationEnvelope<'a> {
    jsonrpc: &'static str,
    method: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    params: Option<&'a Value>,
}

#[derive(Debug, Serialize)]
struct ResultEnvelope<'a> {
    jsonrpc: &'static str,
    result: &'a Value,
    id: &'a RequestId,
}

#[derive(Debug, Serialize)]
struct ErrorEnvelope<'a> {
    jsonrpc: &'static str,
    error: &'a ErrorObject,
    id: &'a RequestId,
}

/// Encode a request line.
pub fn encode_request(
    method: &str,
    params: &Value,
    id: &RequestId,
) -> Result<String, serde_json::Error> {
    serde_json::to_string(&RequestEnvelope {
        jsonrpc: JSONRPC_VERSION,
        method,
        params,
        id,
    })
}

/// Encode a notification line.
pub fn encode_notification(
    method: &str,
    params: Option<&Value>,
) -> Result<String, serde_json::Error> {
    serde_json::to_string(&NotificationEnvelope {
        jsonrpc: JSONRPC_VERSION,
        method,
        params,
    })
}

/// Encode a success response line echoing the request id.
pub fn encode_result(result: &Value, id: &RequestId) -> Result<String, serde_json::Error> {
    serde_json::to_string(&ResultEnvelope {
        jsonrpc: JSONRPC_VERSION,
        result,
        id,
    })
}

/// Encode an error response line echoing the request id.
pub fn encode_error(error: &ErrorObject, id: &RequestId) -> Result<String, serde_json::Error> {
    serde_json::to_string(&ErrorEnvelope {
        jsonrpc: JSONRPC_VERSION,
        error,
        id,
    })
}
