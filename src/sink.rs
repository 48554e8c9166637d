#![allow(clippy::module_name_repetitions)]
//! Log sinks and the process-wide sink slot.
//!
//! Invariants
//! - The slot always holds a sink; it starts as the default configuration read from
//!   `LINEAGE_LOG_*` (or `NopSink` when that configuration is unusable).
//! - `replace_sink` hands back a closure that reinstates exactly the sink it displaced.
//! - Loggers that were not given a fixed sink resolve the slot on every emit, so a
//!   scoped replacement affects contexts created before it.

use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, RwLock};

use once_cell::sync::Lazy;

use crate::errors::SinkError;

pub mod config;
mod line;
pub mod memory;
pub mod simple;

pub use config::{Encoding, SinkConfig};
pub use memory::{CapturedRecord, MemorySink};
pub use simple::SimpleSink;

/// Severity, ordered from least to most severe.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Debug,
    Info,
    Warn,
    Error,
    Panic,
    Fatal,
}

impl Level {
    pub fn as_str(self) -> &'static str {
        match self {
            Level::Debug => "debug",
            Level::Info => "info",
            Level::Warn => "warn",
            Level::Error => "error",
            Level::Panic => "panic",
            Level::Fatal => "fatal",
        }
    }

    /// Levels whose log call also ends the caller (panic) or the process (fatal).
    pub fn is_terminal(self) -> bool {
        matches!(self, Level::Panic | Level::Fatal)
    }

    pub(crate) fn as_tracing(self) -> tracing::Level {
        match self {
            Level::Debug => tracing::Level::DEBUG,
            Level::Info => tracing::Level::INFO,
            Level::Warn => tracing::Level::WARN,
            Level::Error | Level::Panic | Level::Fatal => tracing::Level::ERROR,
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Level {
    type Err = SinkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "debug" => Ok(Level::Debug),
            "info" => Ok(Level::Info),
            "warn" => Ok(Level::Warn),
            "error" => Ok(Level::Error),
            "panic" => Ok(Level::Panic),
            "fatal" => Ok(Level::Fatal),
            other => Err(SinkError::Config(format!("unexpected log level {other}"))),
        }
    }
}

/// One log call, borrowed from the emitting logger.
pub struct Record<'a> {
    pub level: Level,
    pub name: &'a str,
    pub location: &'a str,
    /// Decoration pairs attached with `Logger::with`.
    pub fields: &'a [(String, String)],
    pub message: &'a str,
    /// Call-site key/values.
    pub kvs: &'a [(&'a str, &'a dyn fmt::Display)],
    pub caller: &'static std::panic::Location<'static>,
}

impl Record<'_> {
    /// Decoration pairs followed by call-site pairs as `k=v k=v`; `None` when there are none.
    pub fn render_pairs(&self) -> Option<String> {
        if self.fields.is_empty() && self.kvs.is_empty() {
            return None;
        }
        let mut parts: Vec<String> = Vec::with_capacity(self.fields.len() + self.kvs.len());
        for (k, v) in self.fields {
            parts.push(format!("{k}={v}"));
        }
        for (k, v) in self.kvs {
            parts.push(format!("{k}={v}"));
        }
        Some(parts.join(" "))
    }

    /// `dir/file.rs:line`, trimmed to the last two path components.
    pub fn short_caller(&self) -> String {
        let file = self.caller.file();
        let mut idx = file.len();
        for _ in 0..2 {
            match file[..idx].rfind(['/', '\\']) {
                Some(i) => idx = i,
                None => {
                    idx = 0;
                    break;
                }
            }
        }
        let start = if idx == 0 { 0 } else { idx + 1 };
        format!("{}:{}", &file[start..], self.caller.line())
    }
}

/// Destination for log records.
pub trait Sink: Send + Sync {
    fn enabled(&self, level: Level) -> bool;
    fn emit(&self, record: &Record<'_>);
    fn flush(&self) {}
}

/// Drops everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NopSink;

impl Sink for NopSink {
    fn enabled(&self, _level: Level) -> bool {
        false
    }

    fn emit(&self, _record: &Record<'_>) {}
}

static SINK: Lazy<RwLock<Arc<dyn Sink>>> = Lazy::new(|| {
    let initial: Arc<dyn Sink> = match SinkConfig::from_env().and_then(|c| SimpleSink::new(&c)) {
        Ok(s) => Arc::new(s),
        Err(e) => {
            eprintln!("lineage: default log sink unavailable: {e}; logging disabled");
            Arc::new(NopSink)
        }
    };
    RwLock::new(initial)
});

/// Current process-wide sink.
pub fn sink() -> Arc<dyn Sink> {
    let slot = SINK.read().unwrap_or_else(|e| e.into_inner());
    Arc::clone(&slot)
}

/// Install `next` as the process-wide sink; the returned closure restores the previous one.
#[must_use = "dropping the restore closure makes the replacement permanent"]
pub fn replace_sink(next: Arc<dyn Sink>) -> impl FnOnce() + Send {
    let prev = {
        let mut slot = SINK.write().unwrap_or_else(|e| e.into_inner());
        std::mem::replace(&mut *slot, next)
    };
    move || {
        let _ = replace_sink(prev);
    }
}

/// Replace the process-wide sink with one built from `config`.
pub fn use_simple_sink(config: &SinkConfig) -> Result<impl FnOnce() + Send, SinkError> {
    let s = SimpleSink::new(config)?;
    tracing::debug!(
        level = %config.level,
        output = %config.output,
        encoding = %config.encoding,
        "lineage: installing log sink"
    );
    Ok(replace_sink(Arc::new(s)))
}

/// `info` to stderr, console encoding, no caller.
pub fn use_default_sink() -> Result<impl FnOnce() + Send, SinkError> {
    use_simple_sink(&SinkConfig::default())
}

/// `debug` to the `log` file in the working directory, console encoding.
pub fn use_develop_sink() -> Result<impl FnOnce() + Send, SinkError> {
    use_simple_sink(&SinkConfig::develop())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_parse_and_order() {
        assert_eq!("warn".parse::<Level>().expect("warn"), Level::Warn);
        assert!(Level::Debug < Level::Info);
        assert!(Level::Panic < Level::Fatal);
        let err = "verbose".parse::<Level>().expect_err("verbose must be rejected");
        assert_eq!(err.to_string(), "unexpected log level verbose");
    }

    #[test]
    fn test_render_pairs_and_short_caller() {
        let n = 3;
        let fields = vec![("svc".to_string(), "api".to_string())];
        let kvs: [(&str, &dyn fmt::Display); 1] = [("n", &n)];
        let rec = Record {
            level: Level::Info,
            name: "root",
            location: "",
            fields: &fields,
            message: "hello",
            kvs: &kvs,
            caller: std::panic::Location::caller(),
        };
        assert_eq!(rec.render_pairs().as_deref(), Some("svc=api n=3"));
        let caller = rec.short_caller();
        assert!(caller.starts_with("src/sink.rs:"), "unexpected caller {caller}");
    }

    #[test]
    fn test_nop_sink_is_disabled() {
        assert!(!NopSink.enabled(Level::Fatal));
    }
}
