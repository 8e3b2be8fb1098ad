//! Well-known JSON-RPC error codes spoken by butlerd.
//!
//! The code/message pairs are part of the wire contract and are reproduced
//! verbatim so that errors we emit are recognisable by any peer implementing
//! the same protocol, and errors we receive can be mapped to a fault kind.

use serde::{Deserialize, Serialize};
use std::fmt;

/// JSON-RPC `error` object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorObject {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

/// Error codes with a fixed meaning in the butlerd protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    InvalidRequest,
    MethodNotFound,
    InvalidParams,
    InternalError,
    FailedToProcessRequest,
    InstallFolderMissing,
    AbortedByUser,
    CancelledGracefully,
    NoCompatibleUpload,
    IncompatibleHostSite,
    NothingToLaunch,
    RuntimeDependencyMissing,
    NoNetwork,
    ApiError,
    StorageBusy,
    InstallLocationBusy,
}

impl ErrorCode {
    pub const ALL: [ErrorCode; 16] = [
        ErrorCode::InvalidRequest,
        ErrorCode::MethodNotFound,
        ErrorCode::InvalidParams,
        ErrorCode::InternalError,
        ErrorCode::FailedToProcessRequest,
        ErrorCode::InstallFolderMissing,
        ErrorCode::AbortedByUser,
        ErrorCode::CancelledGracefully,
        ErrorCode::NoCompatibleUpload,
        ErrorCode::IncompatibleHostSite,
        ErrorCode::NothingToLaunch,
        ErrorCode::RuntimeDependencyMissing,
        ErrorCode::NoNetwork,
        ErrorCode::ApiError,
        ErrorCode::StorageBusy,
        ErrorCode::InstallLocationBusy,
    ];

    /// Numeric wire code.
    pub fn code(self) -> i64 {
        match self {
            ErrorCode::InvalidRequest => -32600,
            ErrorCode::MethodNotFound => -32601,
            ErrorCode::InvalidParams => -32602,
            ErrorCode::InternalError => -32603,
            ErrorCode::FailedToProcessRequest => -32000,
            ErrorCode::InstallFolderMissing => 404,
            ErrorCode::AbortedByUser => 410,
            ErrorCode::CancelledGracefully => 499,
            ErrorCode::NoCompatibleUpload => 2001,
            ErrorCode::IncompatibleHostSite => 3001,
            ErrorCode::NothingToLaunch => 5000,
            ErrorCode::RuntimeDependencyMissing => 6000,
            ErrorCode::NoNetwork => 9000,
            ErrorCode::ApiError => 12000,
            ErrorCode::StorageBusy => 16000,
            ErrorCode::InstallLocationBusy => 18000,
        }
    }

    /// Human-readable message sent alongside the code.
    pub fn message(self) -> &'static str {
        match self {
            ErrorCode::InvalidRequest => "Invalid Request",
            ErrorCode::MethodNotFound => "Method not found",
            ErrorCode::InvalidParams => "Invalid params",
            ErrorCode::InternalError => "Internal error",
            ErrorCode::FailedToProcessRequest => "Failed to process request.",
            ErrorCode::InstallFolderMissing => {
                "We tried to launch something, but the install folder just wasn’t there"
            }
            ErrorCode::AbortedByUser => "An operation was aborted by the user",
            ErrorCode::CancelledGracefully => "An operation was cancelled gracefully",
            ErrorCode::NoCompatibleUpload => {
                "We tried to install something, but could not find compatible uploads"
            }
            ErrorCode::IncompatibleHostSite => {
                "This title is hosted on an incompatible third-party website"
            }
            ErrorCode::NothingToLaunch => "Nothing that can be launched was found",
            ErrorCode::RuntimeDependencyMissing => {
                "Java Runtime Environment is required to launch this title."
            }
            ErrorCode::NoNetwork => "There is no Internet connection",
            ErrorCode::ApiError => "API error",
            ErrorCode::StorageBusy => "The database is busy",
            ErrorCode::InstallLocationBusy => {
                "An install location could not be removed because it has active downloads"
            }
        }
    }

    /// Look up the well-known kind for a wire code.
    pub fn from_code(code: i64) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.code() == code)
    }

    /// Build the wire error object for this code.
    pub fn to_error_object(self) -> ErrorObject {
        ErrorObject {
            code: self.code(),
            message: self.message().to_string(),
            data: None,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.message(), self.code())
    }
}

/// A protocol-level error reported by the peer in a response.
#[derive(Debug, Clone, PartialEq)]
pub struct RpcFault {
    /// Well-known kind, when the code appears in the table.
    pub kind: Option<ErrorCode>,
    pub code: i64,
    pub message: String,
    pub data: Option<serde_json::Value>,
}

impl RpcFault {
    pub fn is(&self, kind: ErrorCode) -> bool {
        self.kind == Some(kind)
    }
}

impl From<ErrorObject> for RpcFault {
    fn from(error: ErrorObject) -> Self {
        Self {
            kind: ErrorCode::from_code(error.code),
            code: error.code,
            message: error.message,
            data: error.data,
        }
    }
}

impl fmt::Display for RpcFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "JSON-RPC error (code {}): {}", self.code, self.message)
    }
}

impl std::error::Error for RpcFault {}
