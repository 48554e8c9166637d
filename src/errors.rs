//! Error mapping guide:
//! - Sink construction returns `SinkError`; nothing in the fork/env core is fallible.
//! - `Io` wraps filesystem failures (creating the log directory, opening the file).
//! - `Config` carries a ready-to-print message for bad levels, encodings or YAML.
use std::fmt;
use std::io;

#[derive(Debug)]
pub enum SinkError {
    Io(io::Error),
    Config(String),
}

impl fmt::Display for SinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SinkError::Io(e) => write!(f, "log output: {e}"),
            SinkError::Config(s) => f.write_str(s),
        }
    }
}

impl std::error::Error for SinkError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SinkError::Io(e) => Some(e),
            SinkError::Config(_) => None,
        }
    }
}

impl From<io::Error> for SinkError {
    fn from(e: io::Error) -> Self {
        SinkError::Io(e)
    }
}

impl From<serde_yaml::Error> for SinkError {
    fn from(e: serde_yaml::Error) -> Self {
        SinkError::Config(format!("invalid sink config: {e}"))
    }
}

/// Map a sink error to a process exit code: 2 for configuration mistakes, 1 otherwise.
pub fn exit_code_for_sink_error(e: &SinkError) -> u8 {
    match e {
        SinkError::Io(_) => 1,
        SinkError::Config(_) => 2,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_and_exit_codes() {
        let e = SinkError::Config("unexpected log level verbose".into());
        assert_eq!(e.to_string(), "unexpected log level verbose");
        assert_eq!(exit_code_for_sink_error(&e), 2);

        let e: SinkError = io::Error::new(io::ErrorKind::PermissionDenied, "denied").into();
        assert!(e.to_string().starts_with("log output:"));
        assert_eq!(exit_code_for_sink_error(&e), 1);
    }
}
