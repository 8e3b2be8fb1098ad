//! Logging infrastructure: structured wire-traffic logging.
//!
//! Provides [`JsonlTrafficLogger`], a JSONL file writer that implements
//! the [`TrafficLogger`](butlerd_application::TrafficLogger) port.

mod jsonl_logger;

pub use jsonl_logger::JsonlTrafficLogger;
