//! JSONL file writer for wire traffic.
//!
//! Each line seen on the daemon's output or the socket is appended as one
//! JSON object with `timestamp`, `channel` and `direction`. Lines that parse
//! as JSON are embedded as `message` with every `secret` field redacted;
//! anything else is kept verbatim under `text`.

use butlerd_application::{Channel, Direction, TrafficLogger};
use serde_json::{Map, Value};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::warn;

const REDACTED: &str = "[redacted]";

/// JSONL traffic logger that writes one JSON object per line.
///
/// Thread-safe via `Mutex<BufWriter<File>>`. Flushes on `Drop`.
pub struct JsonlTrafficLogger {
    writer: Mutex<BufWriter<File>>,
    path: PathBuf,
}

impl JsonlTrafficLogger {
    /// Create a new logger writing to the given path.
    ///
    /// Creates the file (and parent directories) if they don't exist.
    /// Returns `None` if the file cannot be created.
    pub fn new(path: impl AsRef<Path>) -> Option<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent()
            && let Err(e) = std::fs::create_dir_all(parent)
        {
            warn!(
                "Could not create traffic log directory {}: {}",
                parent.display(),
                e
            );
            return None;
        }

        let file = match File::create(path) {
            Ok(f) => f,
            Err(e) => {
                warn!("Could not create traffic log file {}: {}", path.display(), e);
                return None;
            }
        };

        Some(Self {
            writer: Mutex::new(BufWriter::new(file)),
            path: path.to_path_buf(),
        })
    }

    /// Get the path to the log file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn redact(value: &mut Value) {
    match value {
        Value::Object(map) => {
            for (key, field) in map.iter_mut() {
                if key == "secret" {
                    *field = Value::String(REDACTED.to_string());
                } else {
                    redact(field);
                }
            }
        }
        Value::Array(items) => items.iter_mut().for_each(redact),
        _ => {}
    }
}

impl TrafficLogger for JsonlTrafficLogger {
    fn record(&self, channel: Channel, direction: Direction, line: &str) {
        let timestamp = chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true);

        let mut record = Map::new();
        record.insert("timestamp".to_string(), Value::String(timestamp));
        record.insert("channel".to_string(), Value::from(channel.as_str()));
        record.insert("direction".to_string(), Value::from(direction.as_str()));
        match serde_json::from_str::<Value>(line) {
            Ok(mut message) => {
                redact(&mut message);
                record.insert("message".to_string(), message);
            }
            Err(_) => {
                record.insert("text".to_string(), Value::from(line));
            }
        }

        let Ok(line) = serde_json::to_string(&record) else {
            return;
        };

        if let Ok(mut writer) = self.writer.lock() {
            let _ = writeln!(writer, "{}", line);
            let _ = writer.flush();
        }
    }
}

impl Drop for JsonlTrafficLogger {
    fn drop(&mut self) {
        if let Ok(mut writer) = self.writer.lock() {
            let _ = writer.flush();
        }
    }
}
