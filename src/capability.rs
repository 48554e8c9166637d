//! Small capability traits so code can ask for only what it uses.
//!
//! `Context` implements all four; `Base`, `Env` and `Logger` implement the ones they cover.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::time::Instant;

use crate::base::{Base, CancelError};
use crate::env::Env;
use crate::key::{Key, Value};
use crate::logger::Logger;

pub trait Cancellable {
    fn deadline(&self) -> Option<Instant>;
    fn err(&self) -> Option<CancelError>;
    fn value_of(&self, key: &Key) -> Option<Value>;
    /// Resolves once the cancellation scope is done.
    fn done(&self) -> Pin<Box<dyn Future<Output = ()> + Send + '_>>;

    fn is_done(&self) -> bool {
        self.err().is_some()
    }
}

pub trait HasEnv {
    fn env(&self) -> &Env;
}

pub trait Identity {
    fn name(&self) -> &str;
    fn location(&self) -> &str;
}

pub trait Log {
    fn logger(&self) -> &Logger;

    #[track_caller]
    fn debug(&self, msg: &str, kvs: &[(&str, &dyn fmt::Display)]) {
        self.logger().debug(msg, kvs);
    }

    #[track_caller]
    fn info(&self, msg: &str, kvs: &[(&str, &dyn fmt::Display)]) {
        self.logger().info(msg, kvs);
    }

    #[track_caller]
    fn warn(&self, msg: &str, kvs: &[(&str, &dyn fmt::Display)]) {
        self.logger().warn(msg, kvs);
    }

    #[track_caller]
    fn error(&self, msg: &str, kvs: &[(&str, &dyn fmt::Display)]) {
        self.logger().error(msg, kvs);
    }

    #[track_caller]
    fn panic(&self, msg: &str, kvs: &[(&str, &dyn fmt::Display)]) -> ! {
        self.logger().panic(msg, kvs)
    }

    #[track_caller]
    fn fatal(&self, msg: &str, kvs: &[(&str, &dyn fmt::Display)]) -> ! {
        self.logger().fatal(msg, kvs)
    }
}

impl Cancellable for Base {
    fn deadline(&self) -> Option<Instant> {
        Base::deadline(self)
    }

    fn err(&self) -> Option<CancelError> {
        Base::err(self)
    }

    fn value_of(&self, key: &Key) -> Option<Value> {
        Base::value_of(self, key)
    }

    fn done(&self) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        Box::pin(Base::done(self))
    }
}

impl HasEnv for Env {
    fn env(&self) -> &Env {
        self
    }
}

impl Identity for Logger {
    fn name(&self) -> &str {
        Logger::name(self)
    }

    fn location(&self) -> &str {
        Logger::location(self)
    }
}

impl Log for Logger {
    fn logger(&self) -> &Logger {
        self
    }
}
