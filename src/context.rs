//! Per-task context: a cancellation base, an overlay environment and a named logger.
//!
//! Invariants
//! - Every derived context gets its own env node whose parent is the deriving context's node.
//! - `fork_at` consumes one number from the deriving context's counter; the child starts a
//!   fresh counter, so grandchildren number from 1 again.
//! - `at` and `reborn*` give the child a fresh counter. `with_cancel`, `with_deadline`,
//!   `with_timeout`, `with_value` and `with_fields` share the deriving context's counter, so
//!   sequenced forks through them keep numbering the same branch.
//! - Only `reborn*` replaces the base; every other derivation keeps the cancellation lineage.
//! - `with_value` writes to the base value channel, never to the env.

use std::fmt;
use std::future::Future;
use std::hash::Hash;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::base::{Base, CancelError, CancelFn, State};
use crate::capability::{Cancellable, HasEnv, Identity, Log};
use crate::env::Env;
use crate::key::{Key, Value};
use crate::logger::Logger;
use crate::session;

/// Factory producing a fresh root context on every call.
pub type Generator = Arc<dyn Fn() -> Context + Send + Sync>;

#[derive(Clone)]
pub struct Context {
    base: Base,
    tracker: Arc<AtomicU64>,
    env: Env,
    logger: Logger,
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("name", &self.logger.name())
            .field("location", &self.logger.location())
            .field("forks", &self.tracker.load(Ordering::Relaxed))
            .field("base", &self.base)
            .field("env", &self.env)
            .finish()
    }
}

impl Default for Context {
    fn default() -> Self {
        Context::simple()
    }
}

impl Context {
    /// Assemble a root context; missing parts default to background, an empty env and an
    /// anonymous logger.
    pub fn new(base: Option<Base>, env: Option<Env>, logger: Option<Logger>) -> Self {
        Context {
            base: base.unwrap_or_else(Base::background),
            tracker: Arc::new(AtomicU64::new(0)),
            env: env.unwrap_or_default(),
            logger: logger.unwrap_or_default(),
        }
    }

    /// Anonymous root on a background base.
    pub fn simple() -> Self {
        Self::from_base(Base::background())
    }

    /// Root named by the process-wide session-name generator.
    pub fn session() -> Self {
        Self::session_from_base(Base::background())
    }

    pub fn named(name: &str) -> Self {
        Self::named_from_base(Base::background(), name)
    }

    pub fn from_base(base: Base) -> Self {
        Self::named_from_base(base, "")
    }

    pub fn session_from_base(base: Base) -> Self {
        Self::named_from_base(base, &session::session_name(None))
    }

    pub fn named_from_base(base: Base, name: &str) -> Self {
        Self::new(Some(base), Some(Env::new()), Some(Logger::new(name, "")))
    }

    // Structural fork: child env node plus the given base, logger and counter.
    fn derive(&self, base: Base, logger: Logger, tracker: Arc<AtomicU64>) -> Context {
        Context {
            base,
            tracker,
            env: self.env.fork(),
            logger,
        }
    }

    // Same identity and counter, new base.
    fn rebase(&self, base: Base) -> Context {
        self.derive(base, self.logger.clone(), Arc::clone(&self.tracker))
    }

    // Same base, new identity, fresh counter.
    fn branch(&self, logger: Logger) -> Context {
        self.derive(self.base.clone(), logger, Arc::new(AtomicU64::new(0)))
    }

    pub fn with_cancel(&self) -> (Context, CancelFn) {
        let (base, cancel) = self.base.with_cancel();
        (self.rebase(base), cancel)
    }

    pub fn with_deadline(&self, deadline: Instant) -> (Context, CancelFn) {
        let (base, cancel) = self.base.with_deadline(deadline);
        (self.rebase(base), cancel)
    }

    pub fn with_timeout(&self, timeout: Duration) -> (Context, CancelFn) {
        let (base, cancel) = self.base.with_timeout(timeout);
        (self.rebase(base), cancel)
    }

    /// Attach `(key, value)` to the base value channel (separate from [`Context::env`]).
    pub fn with_value<K, V>(&self, key: K, value: V) -> Context
    where
        K: Hash + Eq + fmt::Debug + Send + Sync + 'static,
        V: std::any::Any + Send + Sync,
    {
        self.rebase(self.base.with_value(key, value))
    }

    /// Same context with decoration pairs added to its logger. Not a fork: base, env and
    /// counter are shared.
    pub fn with_fields<I, K, V>(&self, pairs: I) -> Context
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: fmt::Display,
    {
        Context {
            logger: self.logger.with(pairs),
            ..self.clone()
        }
    }

    /// Sequenced child with no new location; see [`Context::fork_at`].
    pub fn fork(&self) -> Context {
        self.fork_at("")
    }

    /// Child at `location` keeping this name; consumes no sequence number.
    pub fn at(&self, location: &str) -> Context {
        self.branch(self.logger.fork("", location))
    }

    /// Child named `self.name` + next 12-digit sequence from this context's counter.
    pub fn fork_at(&self, location: &str) -> Context {
        let seq = self.tracker.fetch_add(1, Ordering::SeqCst) + 1;
        self.branch(self.logger.sequenced(seq, location))
    }

    /// Same identity and env lineage, detached from every cancellation and base value above.
    pub fn reborn(&self) -> Context {
        self.reborn_with(None)
    }

    /// Like [`Context::reborn`] but on `base`; `None` means background.
    pub fn reborn_with(&self, base: Option<Base>) -> Context {
        self.derive(
            base.unwrap_or_else(Base::background),
            self.logger.clone(),
            Arc::new(AtomicU64::new(0)),
        )
    }

    pub fn base(&self) -> &Base {
        &self.base
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.base.deadline()
    }

    pub fn err(&self) -> Option<CancelError> {
        self.base.err()
    }

    pub fn is_done(&self) -> bool {
        self.base.is_done()
    }

    pub fn state(&self) -> State {
        self.base.state()
    }

    pub async fn done(&self) {
        self.base.done().await
    }

    /// Value from the base channel set by [`Context::with_value`].
    pub fn value<K>(&self, key: K) -> Option<Value>
    where
        K: Hash + Eq + fmt::Debug + Send + Sync + 'static,
    {
        self.base.value(key)
    }

    pub fn value_as<T, K>(&self, key: K) -> Option<T>
    where
        T: Clone + 'static,
        K: Hash + Eq + fmt::Debug + Send + Sync + 'static,
    {
        self.value(key).and_then(|v| v.downcast_ref::<T>().cloned())
    }

    pub fn name(&self) -> &str {
        self.logger.name()
    }

    pub fn location(&self) -> &str {
        self.logger.location()
    }

    pub fn env(&self) -> &Env {
        &self.env
    }

    pub fn logger(&self) -> &Logger {
        &self.logger
    }

    #[track_caller]
    pub fn debug(&self, msg: &str, kvs: &[(&str, &dyn fmt::Display)]) {
        self.logger.debug(msg, kvs);
    }

    #[track_caller]
    pub fn info(&self, msg: &str, kvs: &[(&str, &dyn fmt::Display)]) {
        self.logger.info(msg, kvs);
    }

    #[track_caller]
    pub fn warn(&self, msg: &str, kvs: &[(&str, &dyn fmt::Display)]) {
        self.logger.warn(msg, kvs);
    }

    #[track_caller]
    pub fn error(&self, msg: &str, kvs: &[(&str, &dyn fmt::Display)]) {
        self.logger.error(msg, kvs);
    }

    #[track_caller]
    pub fn panic(&self, msg: &str, kvs: &[(&str, &dyn fmt::Display)]) -> ! {
        self.logger.panic(msg, kvs)
    }

    #[track_caller]
    pub fn fatal(&self, msg: &str, kvs: &[(&str, &dyn fmt::Display)]) -> ! {
        self.logger.fatal(msg, kvs)
    }
}

impl Cancellable for Context {
    fn deadline(&self) -> Option<Instant> {
        Context::deadline(self)
    }

    fn err(&self) -> Option<CancelError> {
        Context::err(self)
    }

    fn value_of(&self, key: &Key) -> Option<Value> {
        self.base.value_of(key)
    }

    fn done(&self) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        Box::pin(self.base.done())
    }
}

impl HasEnv for Context {
    fn env(&self) -> &Env {
        &self.env
    }
}

impl Identity for Context {
    fn name(&self) -> &str {
        self.logger.name()
    }

    fn location(&self) -> &str {
        self.logger.location()
    }
}

impl Log for Context {
    fn logger(&self) -> &Logger {
        &self.logger
    }
}
