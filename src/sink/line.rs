//! Line layout used by [`SimpleSink`](super::SimpleSink).
//!
//! Keys are fixed: `time`, `level`, `name`, `caller`, `message` and `stacktrace`, plus
//! `location` and `fields`. `level` is the lowercase lineage level, so panic and fatal
//! records keep their own names even though tracing carries them as `ERROR`.

use std::fmt;

use time::macros::format_description;
use time::{OffsetDateTime, UtcOffset};
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::registry::LookupSpan;

use super::Encoding;

#[derive(Default)]
struct LineFields {
    level: Option<String>,
    name: Option<String>,
    location: Option<String>,
    caller: Option<String>,
    message: Option<String>,
    fields: Option<String>,
    stacktrace: Option<String>,
}

impl LineFields {
    fn put(&mut self, key: &str, value: String) {
        let slot = match key {
            "severity" => &mut self.level,
            "name" => &mut self.name,
            "location" => &mut self.location,
            "caller" => &mut self.caller,
            "message" => &mut self.message,
            "fields" => &mut self.fields,
            "stacktrace" => &mut self.stacktrace,
            _ => return,
        };
        *slot = Some(value);
    }
}

impl Visit for LineFields {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.put(field.name(), value.to_string());
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.put(field.name(), format!("{value:?}"));
    }
}

pub(crate) struct LineFormat {
    encoding: Encoding,
    offset: UtcOffset,
}

impl LineFormat {
    pub(crate) fn new(encoding: Encoding) -> Self {
        LineFormat {
            encoding,
            offset: UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC),
        }
    }

    // YYYY-MM-DD HH:MM:SS.mmm in the offset captured at construction.
    fn now(&self) -> Result<String, fmt::Error> {
        OffsetDateTime::now_utc()
            .to_offset(self.offset)
            .format(format_description!(
                "[year]-[month]-[day] [hour]:[minute]:[second].[subsecond digits:3]"
            ))
            .map_err(|_| fmt::Error)
    }
}

fn paint(level: &str) -> &'static str {
    match level {
        "debug" => "\x1b[35m",
        "info" => "\x1b[34m",
        "warn" => "\x1b[33m",
        _ => "\x1b[31;1m",
    }
}

impl<S, N> FormatEvent<S, N> for LineFormat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        _ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let mut line = LineFields::default();
        event.record(&mut line);
        let level = line
            .level
            .take()
            .unwrap_or_else(|| event.metadata().level().as_str().to_ascii_lowercase());
        let time = self.now()?;

        match self.encoding {
            Encoding::Json => {
                let mut obj = serde_json::Map::new();
                obj.insert("time".to_string(), time.into());
                obj.insert("level".to_string(), level.into());
                let rest = [
                    ("name", line.name),
                    ("location", line.location),
                    ("caller", line.caller),
                    ("message", line.message),
                    ("fields", line.fields),
                    ("stacktrace", line.stacktrace),
                ];
                for (key, value) in rest {
                    if let Some(v) = value {
                        obj.insert(key.to_string(), v.into());
                    }
                }
                let text = serde_json::to_string(&obj).map_err(|_| fmt::Error)?;
                writeln!(writer, "{text}")
            }
            Encoding::Console => {
                write!(writer, "{time}\t")?;
                if writer.has_ansi_escapes() {
                    write!(writer, "{}{level}\x1b[0m", paint(&level))?;
                } else {
                    write!(writer, "{level}")?;
                }
                let parts = [
                    &line.name,
                    &line.location,
                    &line.caller,
                    &line.message,
                    &line.fields,
                ];
                for part in parts.into_iter().flatten() {
                    write!(writer, "\t{part}")?;
                }
                writeln!(writer)?;
                if let Some(stack) = &line.stacktrace {
                    writeln!(writer, "{stack}")?;
                }
                Ok(())
            }
        }
    }
}
