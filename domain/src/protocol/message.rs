//! Classification of incoming JSON-RPC lines.
//!
//! Every line read from the socket is turned into exactly one [`Message`]:
//!
//! | `method` | `id` | Result |
//! |----------|------|--------|
//! | present | present | [`Message::Request`] |
//! | present | absent | [`Message::Notification`] |
//! | absent | present | [`Message::Response`] |
//! | absent | absent | [`Message::Unrecognized`] |
//!
//! Anything that violates the shape rules becomes [`Message::Malformed`] with a
//! [`MalformedReason`]. Payloads (`params`, `result`) are kept as raw JSON
//! fragments so that decoding into a concrete type is deferred to whichever
//! handler or pending call ends up owning them.

use super::error_code::ErrorObject;
use super::request_id::RequestId;
use serde_json::value::RawValue;
use serde_json::{Map, Value};
use thiserror::Error;

/// A classified incoming line.
#[derive(Debug, Clone)]
pub enum Message {
    Request {
        method: String,
        id: RequestId,
        params: Box<RawValue>,
    },
    Notification {
        method: String,
        params: Box<RawValue>,
    },
    Response {
        id: RequestId,
        outcome: ResponseOutcome,
    },
    Malformed(MalformedReason),
    Unrecognized,
}

/// The outcome carried by a response.
#[derive(Debug, Clone)]
pub enum ResponseOutcome {
    Ok(Box<RawValue>),
    Err(ErrorObject),
}

/// Why a line could not be classified.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MalformedReason {
    #[error("invalid JSON: {0}")]
    InvalidJson(String),

    #[error("message is not a JSON object")]
    NotAnObject,

    #[error("message has a `null` id")]
    NullId,

    #[error("message id is neither a 64-bit integer nor a string: {0}")]
    InvalidId(String),

    #[error("message has a `null` method")]
    NullMethod,

    #[error("message has a non-string method: {0}")]
    NonStringMethod(String),

    #[error("request/notification has non-object `params`")]
    NonObjectParams,

    #[error("response has non-object `result`")]
    NonObjectResult,

    #[error("response has non-object `error`")]
    NonObjectError,

    #[error("response error object is invalid: {0}")]
    InvalidErrorObject(String),

    #[error("response carries both `result` and `error`")]
    AmbiguousResponse,

    #[error("response has neither `result` nor `error`")]
    MissingOutcome,
}

impl Message {
    /// Short label used in diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Message::Request { .. } => "request",
            Message::Notification { .. } => "notification",
            Message::Response { .. } => "response",
            Message::Malformed(_) => "malformed",
            Message::Unrecognized => "unrecognized",
        }
    }
}

/// The empty-object fragment used when `params` or `result` is absent/null.
pub fn empty_object() -> Box<RawValue> {
    RawValue::from_string("{}".to_string()).unwrap_or_else(|_| unreachable!("`{{}}` is valid JSON"))
}

/// Classify one line of text.
///
/// Total and deterministic: the same input always yields the same variant,
/// and no input panics.
pub fn classify(line: &str) -> Message {
    let root: Value = match serde_json::from_str(line) {
        Ok(value) => value,
        Err(e) => return Message::Malformed(MalformedReason::InvalidJson(e.to_string())),
    };

    let Value::Object(mut object) = root else {
        return Message::Malformed(MalformedReason::NotAnObject);
    };

    let id = match object.remove("id") {
        None => None,
        Some(value) => match parse_id(value) {
            Ok(id) => Some(id),
            Err(reason) => return Message::Malformed(reason),
        },
    };

    let method = match object.remove("method") {
        None => None,
        Some(Value::String(method)) => Some(method),
        Some(Value::Null) => return Message::Malformed(MalformedReason::NullMethod),
        Some(other) => return Message::Malformed(MalformedReason::NonStringMethod(other.to_string())),
    };

    let classified = match (method, id) {
        (Some(method), Some(id)) => {
            extract_params(&mut object).map(|params| Message::Request { method, id, params })
        }
        (Some(method), None) => {
            extract_params(&mut object).map(|params| Message::Notification { method, params })
        }
        (None, Some(id)) => extract_outcome(&mut object).map(|outcome| Message::Response { id, outcome }),
        (None, None) => Ok(Message::Unrecognized),
    };

    classified.unwrap_or_else(Message::Malformed)
}

fn parse_id(value: Value) -> Result<RequestId, MalformedReason> {
    match value {
        Value::Null => Err(MalformedReason::NullId),
        Value::String(s) => Ok(RequestId::String(s)),
        Value::Number(n) => n
            .as_i64()
            .map(RequestId::Number)
            .ok_or_else(|| MalformedReason::InvalidId(n.to_string())),
        other => Err(MalformedReason::InvalidId(other.to_string())),
    }
}

fn extract_params(object: &mut Map<String, Value>) -> Result<Box<RawValue>, MalformedReason> {
    match object.remove("params") {
        None | Some(Value::Null) => Ok(empty_object()),
        Some(params @ Value::Object(_)) => to_raw(&params),
        Some(_) => Err(MalformedReason::NonObjectParams),
    }
}

fn extract_outcome(object: &mut Map<String, Value>) -> Result<ResponseOutcome, MalformedReason> {
    match (object.remove("result"), object.remove("error")) {
        (Some(_), Some(_)) => Err(MalformedReason::AmbiguousResponse),
        (None, None) => Err(MalformedReason::MissingOutcome),
        (Some(Value::Null), None) => Ok(ResponseOutcome::Ok(empty_object())),
        (Some(result @ Value::Object(_)), None) => to_raw(&result).map(ResponseOutcome::Ok),
        (Some(_), None) => Err(MalformedReason::NonObjectResult),
        (None, Some(error @ Value::Object(_))) => serde_json::from_value::<ErrorObject>(error)
            .map(ResponseOutcome::Err)
            .map_err(|e| MalformedReason::InvalidErrorObject(e.to_string())),
        (None, Some(_)) => Err(MalformedReason::NonObjectError),
    }
}

fn to_raw(value: &Value) -> Result<Box<RawValue>, MalformedReason> {
    serde_json::value::to_raw_value(value).map_err(|e| MalformedReason::InvalidJson(e.to_string()))
}
