//! `tracing-subscriber` backed sink, laid out by the `line` module.
//!
//! Each `SimpleSink` owns a private `tracing::Dispatch`; it never installs a global
//! subscriber, so several sinks (and the host application's own subscriber) coexist.

use std::backtrace::Backtrace;
use std::fs::{self, OpenOptions};
use std::path::Path;
use std::sync::Mutex;

use tracing::Dispatch;
use tracing_subscriber::fmt::writer::BoxMakeWriter;

use super::line::LineFormat;
use super::{Level, Record, Sink, SinkConfig};
use crate::errors::SinkError;

const TARGET: &str = "lineage";

pub struct SimpleSink {
    level: Level,
    show_caller: bool,
    dispatch: Dispatch,
}

impl std::fmt::Debug for SimpleSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimpleSink")
            .field("level", &self.level)
            .field("show_caller", &self.show_caller)
            .finish()
    }
}

/// Create the parent directory of a file destination when it is missing.
fn ensure_parent_dir(path: &Path) -> std::io::Result<()> {
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() && dir != Path::new("/") => {
            if !dir.exists() {
                fs::create_dir_all(dir)?;
            }
            Ok(())
        }
        _ => Ok(()),
    }
}

fn make_writer(output: &str) -> Result<(BoxMakeWriter, bool), SinkError> {
    match output {
        "stderr" => Ok((
            BoxMakeWriter::new(std::io::stderr),
            atty::is(atty::Stream::Stderr),
        )),
        "stdout" => Ok((
            BoxMakeWriter::new(std::io::stdout),
            atty::is(atty::Stream::Stdout),
        )),
        path => {
            let path = Path::new(path);
            ensure_parent_dir(path)?;
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            Ok((BoxMakeWriter::new(Mutex::new(file)), false))
        }
    }
}

impl SimpleSink {
    pub fn new(config: &SinkConfig) -> Result<Self, SinkError> {
        let (writer, ansi) = make_writer(&config.output)?;
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(config.level.as_tracing())
            .with_writer(writer)
            .with_ansi(ansi)
            .event_format(LineFormat::new(config.encoding))
            .finish();

        Ok(SimpleSink {
            level: config.level,
            show_caller: config.show_caller,
            dispatch: Dispatch::new(subscriber),
        })
    }
}

macro_rules! emit_at {
    ($level:expr, $($rest:tt)+) => {
        match $level {
            Level::Debug => tracing::event!(target: TARGET, tracing::Level::DEBUG, $($rest)+),
            Level::Info => tracing::event!(target: TARGET, tracing::Level::INFO, $($rest)+),
            Level::Warn => tracing::event!(target: TARGET, tracing::Level::WARN, $($rest)+),
            Level::Error | Level::Panic | Level::Fatal => {
                tracing::event!(target: TARGET, tracing::Level::ERROR, $($rest)+)
            }
        }
    };
}

impl Sink for SimpleSink {
    fn enabled(&self, level: Level) -> bool {
        level >= self.level
    }

    fn emit(&self, record: &Record<'_>) {
        let name = (!record.name.is_empty()).then_some(record.name);
        let location = (!record.location.is_empty()).then_some(record.location);
        let fields = record.render_pairs();
        let caller = self.show_caller.then(|| record.short_caller());
        let stacktrace = record
            .level
            .is_terminal()
            .then(|| Backtrace::force_capture().to_string());
        let severity = record.level.as_str();

        tracing::dispatcher::with_default(&self.dispatch, || {
            emit_at!(
                record.level,
                severity,
                name = name,
                location = location,
                fields = fields.as_deref(),
                caller = caller.as_deref(),
                stacktrace = stacktrace.as_deref(),
                "{}",
                record.message
            );
        });
    }
}
