//! Append-only JSONL event sink with graceful degradation.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use super::{EventSink, StateEvent};
use crate::core::errors::{MseError, Result};

/// One JSON object per line. Serialization or write failures increment a
/// drop counter instead of propagating; losing an event record must never
/// take the monitoring engine down with it.
#[derive(Debug)]
pub struct JsonlSink {
    file: Mutex<File>,
    dropped: AtomicU64,
}

impl JsonlSink {
    /// Open (or create) the log file in append mode.
    pub fn open(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|source| MseError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(Self {
            file: Mutex::new(file),
            dropped: AtomicU64::new(0),
        })
    }

    /// Events lost to serialization or IO failures since opening.
    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl EventSink for JsonlSink {
    fn record(&self, event: &StateEvent) {
        let Ok(mut line) = serde_json::to_string(event) else {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            return;
        };
        line.push('\n');
        let mut file = self.file.lock();
        if file.write_all(line.as_bytes()).is_err() {
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::JsonlSink;
    use crate::logger::{EventSink, StateEvent, StateEventKind};

    #[test]
    fn records_one_json_object_per_line() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("events.jsonl");
        let sink = JsonlSink::open(&path).expect("open");

        for id in 1..=3 {
            sink.record(&StateEvent {
                timestamp: Utc::now(),
                object_kind: "host",
                object: "web1".to_string(),
                kind: StateEventKind::DowntimeScheduled { id },
            });
        }

        let raw = std::fs::read_to_string(&path).expect("read log");
        let lines: Vec<&str> = raw.lines().collect();
        assert_eq!(lines.len(), 3);
        for line in lines {
            let value: serde_json::Value = serde_json::from_str(line).expect("valid json");
            assert_eq!(value["event"], "downtime_scheduled");
            assert_eq!(value["object"], "web1");
        }
        assert_eq!(sink.dropped(), 0);
    }
}
