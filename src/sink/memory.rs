//! In-memory sink that keeps owned copies of every record, for tests and diagnostics.

use std::sync::Mutex;

use super::{Level, Record, Sink};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CapturedRecord {
    pub level: Level,
    pub name: String,
    pub location: String,
    pub fields: Vec<(String, String)>,
    pub message: String,
    pub kvs: Vec<(String, String)>,
    pub caller: String,
}

impl CapturedRecord {
    /// Value of `key` among the call-site pairs, then the decoration pairs.
    pub fn kv(&self, key: &str) -> Option<&str> {
        self.kvs
            .iter()
            .chain(self.fields.iter())
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Debug)]
pub struct MemorySink {
    level: Level,
    records: Mutex<Vec<CapturedRecord>>,
}

impl Default for MemorySink {
    fn default() -> Self {
        Self::new()
    }
}

impl MemorySink {
    /// Captures every level.
    pub fn new() -> Self {
        Self::with_level(Level::Debug)
    }

    pub fn with_level(level: Level) -> Self {
        MemorySink {
            level,
            records: Mutex::new(Vec::new()),
        }
    }

    pub fn records(&self) -> Vec<CapturedRecord> {
        self.records
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn take(&self) -> Vec<CapturedRecord> {
        std::mem::take(&mut *self.records.lock().unwrap_or_else(|e| e.into_inner()))
    }

    pub fn len(&self) -> usize {
        self.records.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Sink for MemorySink {
    fn enabled(&self, level: Level) -> bool {
        level >= self.level
    }

    fn emit(&self, record: &Record<'_>) {
        let captured = CapturedRecord {
            level: record.level,
            name: record.name.to_string(),
            location: record.location.to_string(),
            fields: record.fields.to_vec(),
            message: record.message.to_string(),
            kvs: record
                .kvs
                .iter()
                .map(|(k, v)| ((*k).to_string(), v.to_string()))
                .collect(),
            caller: record.short_caller(),
        };
        self.records
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(captured);
    }
}
