//! Named, located logger facade.
//!
//! Naming rules
//! - `fork(name, _)`: `parent.name + "." + name`, or just `name` for an anonymous parent.
//! - `sequenced(seq, _)`: `parent.name` followed directly by `seq` zero-padded to 12 digits.
//! - location: `parent.location + "/" + location`, or just `location` when the parent has none.
//! - Empty arguments inherit the parent's value.

use std::fmt;
use std::sync::Arc;

use crate::sink::{self, Level, Record, Sink};

pub const NAME_SEPARATOR: &str = ".";
pub const LOCATION_SEPARATOR: &str = "/";

/// Width of the zero-padded sequence suffix minted by `sequenced`.
pub const SEQUENCE_WIDTH: usize = 12;

fn chain(base: &str, sep: &str, seg: &str) -> Arc<str> {
    if base.is_empty() {
        Arc::from(seg)
    } else {
        Arc::from(format!("{base}{sep}{seg}"))
    }
}

/// Format a fork sequence the way names carry it: `7` becomes `000000000007`.
pub fn format_sequence(seq: u64) -> String {
    format!("{seq:0width$}", width = SEQUENCE_WIDTH)
}

#[derive(Clone)]
pub struct Logger {
    name: Arc<str>,
    location: Arc<str>,
    with: Arc<Vec<(String, String)>>,
    // `None` resolves the process-wide slot on every emit.
    sink: Option<Arc<dyn Sink>>,
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger")
            .field("name", &self.name)
            .field("location", &self.location)
            .field("with", &self.with)
            .field("pinned_sink", &self.sink.is_some())
            .finish()
    }
}

impl Default for Logger {
    fn default() -> Self {
        Logger::new("", "")
    }
}

impl Logger {
    /// Logger writing to the process-wide sink.
    pub fn new(name: &str, location: &str) -> Self {
        Logger {
            name: Arc::from(name),
            location: Arc::from(location),
            with: Arc::new(Vec::new()),
            sink: None,
        }
    }

    /// Logger pinned to `sink`; derived loggers keep the same sink.
    pub fn with_sink(name: &str, location: &str, sink: Arc<dyn Sink>) -> Self {
        Logger {
            sink: Some(sink),
            ..Logger::new(name, location)
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    /// Decoration pairs in the order they were attached.
    pub fn fields(&self) -> &[(String, String)] {
        &self.with
    }

    fn derive(&self, name: Arc<str>, location: &str) -> Logger {
        let location = if location.is_empty() {
            Arc::clone(&self.location)
        } else {
            chain(&self.location, LOCATION_SEPARATOR, location)
        };
        Logger {
            name,
            location,
            with: Arc::clone(&self.with),
            sink: self.sink.clone(),
        }
    }

    pub fn fork(&self, name: &str, location: &str) -> Logger {
        let name = if name.is_empty() {
            Arc::clone(&self.name)
        } else {
            chain(&self.name, NAME_SEPARATOR, name)
        };
        self.derive(name, location)
    }

    /// Child whose name carries `seq` as a 12-digit suffix with no separator.
    pub fn sequenced(&self, seq: u64, location: &str) -> Logger {
        let name = Arc::from(format!("{}{}", self.name, format_sequence(seq)));
        self.derive(name, location)
    }

    /// Child with `pairs` appended to the decoration list.
    pub fn with<I, K, V>(&self, pairs: I) -> Logger
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: fmt::Display,
    {
        let mut with: Vec<(String, String)> = self.with.as_ref().clone();
        with.extend(pairs.into_iter().map(|(k, v)| (k.into(), v.to_string())));
        Logger {
            with: Arc::new(with),
            ..self.clone()
        }
    }

    fn current_sink(&self) -> Arc<dyn Sink> {
        match &self.sink {
            Some(s) => Arc::clone(s),
            None => sink::sink(),
        }
    }

    /// Emit at `level` without the panic/exit behaviour of the terminal levels.
    #[track_caller]
    pub fn log(&self, level: Level, msg: &str, kvs: &[(&str, &dyn fmt::Display)]) {
        let sink = self.current_sink();
        self.emit_to(sink.as_ref(), level, msg, kvs);
    }

    #[track_caller]
    fn emit_to(&self, sink: &dyn Sink, level: Level, msg: &str, kvs: &[(&str, &dyn fmt::Display)]) {
        if !sink.enabled(level) {
            return;
        }
        sink.emit(&Record {
            level,
            name: &self.name,
            location: &self.location,
            fields: &self.with,
            message: msg,
            kvs,
            caller: std::panic::Location::caller(),
        });
    }

    #[track_caller]
    pub fn debug(&self, msg: &str, kvs: &[(&str, &dyn fmt::Display)]) {
        self.log(Level::Debug, msg, kvs);
    }

    #[track_caller]
    pub fn info(&self, msg: &str, kvs: &[(&str, &dyn fmt::Display)]) {
        self.log(Level::Info, msg, kvs);
    }

    #[track_caller]
    pub fn warn(&self, msg: &str, kvs: &[(&str, &dyn fmt::Display)]) {
        self.log(Level::Warn, msg, kvs);
    }

    #[track_caller]
    pub fn error(&self, msg: &str, kvs: &[(&str, &dyn fmt::Display)]) {
        self.log(Level::Error, msg, kvs);
    }

    /// Emit, then panic with `msg`. The unwind can be caught further up.
    #[track_caller]
    pub fn panic(&self, msg: &str, kvs: &[(&str, &dyn fmt::Display)]) -> ! {
        self.log(Level::Panic, msg, kvs);
        panic!("{msg}");
    }

    /// Emit, flush, then terminate the process with exit status 1.
    #[track_caller]
    pub fn fatal(&self, msg: &str, kvs: &[(&str, &dyn fmt::Display)]) -> ! {
        let sink = self.current_sink();
        self.emit_to(sink.as_ref(), Level::Fatal, msg, kvs);
        sink.flush();
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::MemorySink;

    fn pinned(name: &str) -> (Logger, Arc<MemorySink>) {
        let mem = Arc::new(MemorySink::new());
        let sink: Arc<dyn Sink> = mem.clone();
        (Logger::with_sink(name, "", sink), mem)
    }

    #[test]
    fn test_fork_chains_name_and_location() {
        let root = Logger::new("root", "");
        let a = root.fork("db", "init");
        assert_eq!(a.name(), "root.db");
        assert_eq!(a.location(), "init");

        let b = a.fork("", "connect");
        assert_eq!(b.name(), "root.db");
        assert_eq!(b.location(), "init/connect");

        let anon = Logger::new("", "").fork("solo", "");
        assert_eq!(anon.name(), "solo");
        assert_eq!(anon.location(), "");
    }

    #[test]
    fn test_sequenced_appends_padded_suffix() {
        let root = Logger::new("root", "main");
        let c = root.sequenced(7, "");
        assert_eq!(c.name(), "root000000000007");
        assert_eq!(c.location(), "main");
        assert_eq!(Logger::new("", "").sequenced(42, "x").name(), "000000000042");
        assert_eq!(format_sequence(1), "000000000001");
    }

    #[test]
    fn test_with_appends_pairs_in_order() {
        let l = Logger::new("", "").with([("A", "B")]);
        assert_eq!(l.fields(), &[("A".to_string(), "B".to_string())]);
        let l2 = l.with([("C", "D")]);
        assert_eq!(
            l2.fields(),
            &[
                ("A".to_string(), "B".to_string()),
                ("C".to_string(), "D".to_string())
            ]
        );
        assert_eq!(l.fields().len(), 1, "parent decoration is unchanged");
        assert_eq!(l2.fork("x", "").fields().len(), 2, "forks keep decoration");
    }

    #[test]
    fn test_log_reaches_pinned_sink_with_caller() {
        let (l, mem) = pinned("svc");
        let l = l.with([("region", "eu")]);
        let n = 3;
        l.info("started", &[("workers", &n)]);
        l.debug("noisy", &[]);

        let recs = mem.records();
        assert_eq!(recs.len(), 2);
        assert_eq!(recs[0].level, Level::Info);
        assert_eq!(recs[0].name, "svc");
        assert_eq!(recs[0].message, "started");
        assert_eq!(recs[0].kv("workers"), Some("3"));
        assert_eq!(recs[0].kv("region"), Some("eu"));
        assert!(recs[0].caller.starts_with("src/logger.rs:"), "{}", recs[0].caller);
    }

    #[test]
    fn test_threshold_skips_disabled_levels() {
        let mem = Arc::new(MemorySink::with_level(Level::Warn));
        let sink: Arc<dyn Sink> = mem.clone();
        let l = Logger::with_sink("t", "", sink);
        l.info("dropped", &[]);
        l.warn("kept", &[]);
        l.error("kept too", &[]);
        let msgs: Vec<String> = mem.records().into_iter().map(|r| r.message).collect();
        assert_eq!(msgs, vec!["kept".to_string(), "kept too".to_string()]);
    }

    #[test]
    fn test_panic_emits_then_unwinds() {
        let (l, mem) = pinned("p");
        let res = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            l.panic("boom", &[]);
        }));
        let payload = res.expect_err("panic must unwind");
        assert_eq!(payload.downcast_ref::<String>().map(String::as_str), Some("boom"));
        let recs = mem.records();
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].level, Level::Panic);
    }
}
