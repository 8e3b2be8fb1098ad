//! Output formatter trait

use butlerd_domain::RpcFault;
use serde_json::Value;

/// Trait for formatting request outcomes
pub trait OutputFormatter {
    /// Format a successful `result`
    fn format_result(&self, result: &Value) -> String;

    /// Format an error response from the daemon
    fn format_fault(&self, fault: &RpcFault) -> String;
}
