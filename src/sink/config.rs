//! Sink configuration: level threshold, output destination, encoding and caller capture.
//!
//! Sources, lowest precedence first:
//! - built-in defaults (`info`, `stderr`, `console`, no caller)
//! - YAML documents via [`SinkConfig::from_yaml_str`]
//! - `LINEAGE_LOG_LEVEL`, `LINEAGE_LOG_OUTPUT`, `LINEAGE_LOG_ENCODING`, `LINEAGE_LOG_CALLER`
//!   via [`SinkConfig::from_env`]

use std::env;
use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

use super::Level;
use crate::errors::SinkError;

#[derive(Copy, Clone, PartialEq, Eq, Debug, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Encoding {
    #[default]
    Console,
    Json,
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Encoding::Console => f.write_str("console"),
            Encoding::Json => f.write_str("json"),
        }
    }
}

impl FromStr for Encoding {
    type Err = SinkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "console" => Ok(Encoding::Console),
            "json" => Ok(Encoding::Json),
            other => Err(SinkError::Config(format!("unexpected log encoding {other}"))),
        }
    }
}

#[derive(Clone, PartialEq, Eq, Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SinkConfig {
    pub level: Level,
    /// `stderr`, `stdout`, or a file path (parent directories are created).
    pub output: String,
    pub encoding: Encoding,
    pub show_caller: bool,
}

impl Default for SinkConfig {
    fn default() -> Self {
        SinkConfig {
            level: Level::Info,
            output: "stderr".to_string(),
            encoding: Encoding::Console,
            show_caller: false,
        }
    }
}

fn nonempty(raw: Option<String>) -> Option<String> {
    raw.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

fn parse_flag(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

impl SinkConfig {
    /// Build from the same four strings a command line or config file would carry.
    pub fn new(
        level: &str,
        output: &str,
        encoding: &str,
        show_caller: bool,
    ) -> Result<Self, SinkError> {
        Ok(SinkConfig {
            level: level.parse()?,
            output: output.to_string(),
            encoding: encoding.parse()?,
            show_caller,
        })
    }

    /// Development preset: everything from `debug` up, into `./log`.
    pub fn develop() -> Self {
        SinkConfig {
            level: Level::Debug,
            output: "log".to_string(),
            ..SinkConfig::default()
        }
    }

    pub fn from_yaml_str(s: &str) -> Result<Self, SinkError> {
        Ok(serde_yaml::from_str(s)?)
    }

    /// Defaults overlaid with `LINEAGE_LOG_*`.
    pub fn from_env() -> Result<Self, SinkError> {
        Self::default().overlay_env()
    }

    pub fn overlay_env(self) -> Result<Self, SinkError> {
        self.overlay_with(|key| env::var(key).ok())
    }

    /// Overlay `LINEAGE_LOG_*` values produced by `lookup`; blank values are ignored.
    pub fn overlay_with<F>(mut self, lookup: F) -> Result<Self, SinkError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| nonempty(lookup(key));
        if let Some(v) = get("LINEAGE_LOG_LEVEL") {
            self.level = v.parse()?;
        }
        if let Some(v) = get("LINEAGE_LOG_OUTPUT") {
            self.output = v;
        }
        if let Some(v) = get("LINEAGE_LOG_ENCODING") {
            self.encoding = v.parse()?;
        }
        if let Some(v) = get("LINEAGE_LOG_CALLER") {
            self.show_caller = parse_flag(&v).ok_or_else(|| {
                SinkError::Config(format!("unexpected LINEAGE_LOG_CALLER value {v}"))
            })?;
        }
        Ok(self)
    }
}
