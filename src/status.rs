use crate::prelude::*;

use serde::Serialize;
use std::sync::{Arc, Mutex};

/// Human readable state of each loop, served on the info endpoint.
#[derive(Clone, Debug, Default, Serialize)]
pub struct ProcessStatus {
    pub reader: String,
    pub interpreter: String,
    pub publisher: String,
    pub init: String,
    pub stats: Stats,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct Stats {
    pub bytes_read: u64,
    pub records_decoded: u64,
    pub records_rejected: u64,
    pub frames_overflowed: u64,
    pub sleeps: u64,
    pub respawns: u64,
    pub pokes: u64,
    pub init_failures: u64,
    pub mqtt_messages_sent: u64,
    pub mqtt_errors: u64,
}

impl Stats {
    pub fn print_summary(&self) {
        info!("Statistics:");
        info!("  Serial:");
        info!("    Bytes read: {}", self.bytes_read);
        info!("    Respawns: {}", self.respawns);
        info!("    Pokes: {}", self.pokes);
        info!("    Init failures: {}", self.init_failures);
        info!("  Interpreter:");
        info!("    Records decoded: {}", self.records_decoded);
        info!("    Records rejected: {}", self.records_rejected);
        info!("    Frames overflowed: {}", self.frames_overflowed);
        info!("    Sleeps: {}", self.sleeps);
        info!("  MQTT:");
        info!("    Messages sent: {}", self.mqtt_messages_sent);
        info!("    Errors: {}", self.mqtt_errors);
    }
}

/// Shared process status. Each string has one writer: the reader owns
/// `reader` and `init`, the interpreter `interpreter`, the publisher
/// `publisher`.
#[derive(Clone)]
pub struct StatusBoard {
    inner: Arc<Mutex<ProcessStatus>>,
}

impl Default for StatusBoard {
    fn default() -> Self {
        Self::new()
    }
}

impl StatusBoard {
    pub fn new() -> Self {
        let status = ProcessStatus {
            reader: "Created".to_string(),
            interpreter: "Created".to_string(),
            publisher: "Created".to_string(),
            init: "None".to_string(),
            stats: Stats::default(),
        };
        Self {
            inner: Arc::new(Mutex::new(status)),
        }
    }

    pub fn snapshot(&self) -> ProcessStatus {
        self.with(|s| s.clone())
    }

    pub fn set_reader(&self, text: impl Into<String>) {
        let text = text.into();
        self.with(|s| s.reader = text);
    }

    pub fn set_interpreter(&self, text: impl Into<String>) {
        let text = text.into();
        self.with(|s| s.interpreter = text);
    }

    pub fn set_publisher(&self, text: impl Into<String>) {
        let text = text.into();
        self.with(|s| s.publisher = text);
    }

    pub fn set_init(&self, text: impl Into<String>) {
        let text = text.into();
        self.with(|s| s.init = text);
    }

    pub fn init(&self) -> String {
        self.with(|s| s.init.clone())
    }

    pub fn stats(&self) -> Stats {
        self.with(|s| s.stats.clone())
    }

    pub fn update_stats(&self, f: impl FnOnce(&mut Stats)) {
        self.with(|s| f(&mut s.stats));
    }

    fn with<R>(&self, f: impl FnOnce(&mut ProcessStatus) -> R) -> R {
        let mut guard = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut guard)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_created() {
        let board = StatusBoard::new();
        let s = board.snapshot();
        assert_eq!(s.reader, "Created");
        assert_eq!(s.init, "None");
    }

    #[test]
    fn updates_are_shared() {
        let board = StatusBoard::new();
        let other = board.clone();
        board.set_init("OK");
        board.update_stats(|s| s.records_decoded += 2);
        assert_eq!(other.init(), "OK");
        assert_eq!(other.stats().records_decoded, 2);
    }
}
