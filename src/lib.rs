#![allow(clippy::module_name_repetitions)]
//! Per-task execution contexts for worker trees.
//!
//! A [`Context`] bundles three things that travel together through concurrent code:
//! - a cancellation [`Base`] (cancel, deadline, timeout, base values),
//! - an overlay [`Env`] that children read through but never write into,
//! - a [`Logger`] whose name and location follow the context's position in the fork tree.
//!
//! ```no_run
//! use lineage::Context;
//!
//! let root = Context::named("ingest");
//! root.env().set("region", "eu-west");
//! let worker = root.fork_at("shard");
//! // name "ingest000000000001", location "shard"
//! worker.info("started", &[("region", &worker.env().get_string("region").unwrap_or_default())]);
//! ```

pub mod base;
pub mod capability;
pub mod context;
pub mod env;
pub mod errors;
pub mod key;
pub mod logger;
pub mod session;
pub mod sink;

pub use base::{Base, CancelError, CancelFn, State};
pub use capability::{Cancellable, HasEnv, Identity, Log};
pub use context::{Context, Generator};
pub use env::Env;
pub use errors::{exit_code_for_sink_error, SinkError};
pub use key::{Key, Value};
pub use logger::{format_sequence, Logger};
pub use session::{
    boot_id, real_session, session_name, set_session, use_prefixed_session_name,
    SessionNameGenerator,
};
pub use sink::{
    replace_sink, sink, use_default_sink, use_develop_sink, use_simple_sink, CapturedRecord,
    Encoding, Level, MemorySink, NopSink, Record, SimpleSink, Sink, SinkConfig,
};
