//! Cancellation-capable base context.
//!
//! A `Base` is a chain of nodes. Each node either opens a new cancellation scope
//! (`with_cancel`, `with_deadline`, `with_timeout`), attaches one value
//! (`with_value`), or is the background root.
//!
//! Invariants
//! - Cancelling a scope cancels every scope derived from it, never the parent.
//! - A derived deadline is never later than the parent's.
//! - The first recorded cause wins; later cancels or expiries do not overwrite it.
//! - Releasing a scope at or past its deadline records `DeadlineExceeded`, observed or not.
//! - Value lookups walk the chain towards the root and stop at the first match.

use std::fmt;
use std::hash::Hash;
use std::sync::Arc;
use std::time::{Duration, Instant};

use once_cell::sync::OnceCell;
use tokio_util::sync::CancellationToken;

use crate::key::{Key, Value};

/// Why a base is done.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CancelError {
    Canceled,
    DeadlineExceeded,
}

impl fmt::Display for CancelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CancelError::Canceled => f.write_str("context canceled"),
            CancelError::DeadlineExceeded => f.write_str("context deadline exceeded"),
        }
    }
}

impl std::error::Error for CancelError {}

/// Observable cancellation state of a base.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum State {
    Active,
    Cancelled,
    DeadlineExceeded,
}

struct Scope {
    token: CancellationToken,
    cause: OnceCell<CancelError>,
    // Effective deadline of this scope, parent's included.
    deadline: Option<Instant>,
}

impl Scope {
    // A release after the deadline records the expiry, not the release.
    fn close(&self) {
        let cause = match self.deadline {
            Some(d) if Instant::now() >= d => CancelError::DeadlineExceeded,
            _ => CancelError::Canceled,
        };
        let _ = self.cause.set(cause);
        self.token.cancel();
    }
}

struct Node {
    parent: Option<Base>,
    // Nearest enclosing scope; `None` only under the background root.
    scope: Option<Arc<Scope>>,
    deadline: Option<Instant>,
    value: Option<(Key, Value)>,
}

/// Cheaply clonable handle on a base chain.
#[derive(Clone)]
pub struct Base {
    node: Arc<Node>,
}

impl fmt::Debug for Base {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Base")
            .field("state", &self.state())
            .field("deadline", &self.node.deadline)
            .finish()
    }
}

impl Default for Base {
    fn default() -> Self {
        Self::background()
    }
}

impl Base {
    /// Never cancelled, no deadline, no values.
    pub fn background() -> Self {
        Base {
            node: Arc::new(Node {
                parent: None,
                scope: None,
                deadline: None,
                value: None,
            }),
        }
    }

    fn child_scope(&self, deadline: Option<Instant>) -> (Base, CancelFn) {
        let token = match &self.node.scope {
            Some(scope) => scope.token.child_token(),
            None => CancellationToken::new(),
        };
        let deadline = match (self.node.deadline, deadline) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };
        let scope = Arc::new(Scope {
            token,
            cause: OnceCell::new(),
            deadline,
        });
        let base = Base {
            node: Arc::new(Node {
                parent: Some(self.clone()),
                scope: Some(Arc::clone(&scope)),
                deadline,
                value: None,
            }),
        };
        (base, CancelFn { scope })
    }

    /// New cancellation scope under `self`.
    pub fn with_cancel(&self) -> (Base, CancelFn) {
        self.child_scope(None)
    }

    /// New cancellation scope that also expires at `deadline` (or the parent's, if earlier).
    pub fn with_deadline(&self, deadline: Instant) -> (Base, CancelFn) {
        self.child_scope(Some(deadline))
    }

    pub fn with_timeout(&self, timeout: Duration) -> (Base, CancelFn) {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Attach one value; cancellation and deadline are inherited unchanged.
    pub fn with_value<K, V>(&self, key: K, value: V) -> Base
    where
        K: Hash + Eq + fmt::Debug + Send + Sync + 'static,
        V: std::any::Any + Send + Sync,
    {
        Base {
            node: Arc::new(Node {
                parent: Some(self.clone()),
                scope: self.node.scope.clone(),
                deadline: self.node.deadline,
                value: Some((Key::new(key), Arc::new(value))),
            }),
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.node.deadline
    }

    /// `None` while active; the cause once done.
    pub fn err(&self) -> Option<CancelError> {
        let scope = self.node.scope.as_ref()?;
        if scope.token.is_cancelled() {
            return Some(self.cause());
        }
        match self.node.deadline {
            Some(d) if Instant::now() >= d => {
                self.expire(scope);
                Some(self.cause())
            }
            _ => None,
        }
    }

    pub fn is_done(&self) -> bool {
        self.err().is_some()
    }

    pub fn state(&self) -> State {
        match self.err() {
            None => State::Active,
            Some(CancelError::Canceled) => State::Cancelled,
            Some(CancelError::DeadlineExceeded) => State::DeadlineExceeded,
        }
    }

    /// Resolves once cancelled or past the deadline. Never resolves for a background chain.
    ///
    /// Needs a tokio runtime with the time driver when a deadline is set.
    pub async fn done(&self) {
        let Some(scope) = self.node.scope.as_ref() else {
            return std::future::pending().await;
        };
        match self.node.deadline {
            Some(d) => {
                tokio::select! {
                    _ = scope.token.cancelled() => {}
                    _ = tokio::time::sleep_until(tokio::time::Instant::from_std(d)) => {
                        self.expire(scope);
                    }
                }
            }
            None => scope.token.cancelled().await,
        }
    }

    /// Value attached by the nearest `with_value` for `key`.
    pub fn value<K>(&self, key: K) -> Option<Value>
    where
        K: Hash + Eq + fmt::Debug + Send + Sync + 'static,
    {
        self.value_of(&Key::new(key))
    }

    pub fn value_of(&self, key: &Key) -> Option<Value> {
        let mut cur = Some(self);
        while let Some(base) = cur {
            if let Some((k, v)) = &base.node.value {
                if k == key {
                    return Some(Arc::clone(v));
                }
            }
            cur = base.node.parent.as_ref();
        }
        None
    }

    fn expire(&self, scope: &Scope) {
        let _ = scope.cause.set(CancelError::DeadlineExceeded);
        scope.token.cancel();
    }

    // The scope that actually fired may be an ancestor; its cause is recorded
    // before its token is cancelled.
    fn cause(&self) -> CancelError {
        let mut cur = Some(self);
        while let Some(base) = cur {
            if let Some(scope) = &base.node.scope {
                if let Some(cause) = scope.cause.get() {
                    return *cause;
                }
            }
            cur = base.node.parent.as_ref();
        }
        CancelError::Canceled
    }
}

/// Releases a scope opened by `with_cancel`, `with_deadline` or `with_timeout`.
///
/// Calling [`CancelFn::cancel`] more than once is a no-op.
#[derive(Clone)]
pub struct CancelFn {
    scope: Arc<Scope>,
}

impl fmt::Debug for CancelFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancelFn")
            .field("cancelled", &self.scope.token.is_cancelled())
            .finish()
    }
}

impl CancelFn {
    /// Cancel the scope. Past its deadline this records `DeadlineExceeded` instead.
    pub fn cancel(&self) {
        self.scope.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_background_is_never_done() {
        let b = Base::background();
        assert_eq!(b.err(), None);
        assert_eq!(b.deadline(), None);
        assert_eq!(b.state(), State::Active);
    }

    #[test]
    fn test_cancel_propagates_down_not_up() {
        let root = Base::background();
        let (parent, cancel_parent) = root.with_cancel();
        let (child, cancel_child) = parent.with_cancel();

        cancel_child.cancel();
        assert_eq!(child.err(), Some(CancelError::Canceled));
        assert_eq!(parent.err(), None);

        let (other, _keep) = parent.with_cancel();
        cancel_parent.cancel();
        assert_eq!(parent.err(), Some(CancelError::Canceled));
        assert_eq!(other.err(), Some(CancelError::Canceled));
    }

    #[test]
    fn test_cancel_is_idempotent() {
        let (b, cancel) = Base::background().with_cancel();
        cancel.cancel();
        cancel.cancel();
        cancel.clone().cancel();
        assert_eq!(b.state(), State::Cancelled);
    }

    #[test]
    fn test_deadline_exceeded_is_sticky() {
        let (b, cancel) = Base::background().with_deadline(Instant::now());
        assert_eq!(b.err(), Some(CancelError::DeadlineExceeded));
        cancel.cancel();
        assert_eq!(b.err(), Some(CancelError::DeadlineExceeded));
    }

    #[test]
    fn test_release_after_unobserved_deadline_reports_expiry() {
        let (b, cancel) = Base::background().with_timeout(Duration::from_millis(5));
        let (child, _keep) = b.with_cancel();
        std::thread::sleep(Duration::from_millis(30));
        cancel.cancel();
        assert_eq!(b.err(), Some(CancelError::DeadlineExceeded));
        assert_eq!(child.err(), Some(CancelError::DeadlineExceeded));
        assert_eq!(child.state(), State::DeadlineExceeded);
    }

    #[test]
    fn test_release_before_deadline_is_canceled() {
        let (b, cancel) = Base::background().with_timeout(Duration::from_secs(3600));
        cancel.cancel();
        assert_eq!(b.err(), Some(CancelError::Canceled));
    }

    #[test]
    fn test_child_deadline_capped_by_parent() {
        let soon = Instant::now() + Duration::from_millis(50);
        let (parent, _c1) = Base::background().with_deadline(soon);
        let (child, _c2) = parent.with_timeout(Duration::from_secs(3600));
        assert_eq!(child.deadline(), Some(soon));
    }

    #[test]
    fn test_parent_expiry_reaches_child_as_deadline() {
        let (parent, _c1) = Base::background().with_deadline(Instant::now());
        let (child, _c2) = parent.with_cancel();
        assert_eq!(child.err(), Some(CancelError::DeadlineExceeded));
    }

    #[test]
    fn test_values_shadow_and_inherit_scope() {
        let (scoped, cancel) = Base::background().with_cancel();
        let b1 = scoped.with_value("k", 1i32);
        let b2 = b1.with_value("k", 2i32);
        let b3 = b2.with_value("other", "x");

        let get = |b: &Base| b.value("k").and_then(|v| v.downcast_ref::<i32>().copied());
        assert_eq!(get(&b1), Some(1));
        assert_eq!(get(&b3), Some(2));
        assert_eq!(get(&scoped), None);

        cancel.cancel();
        assert!(b3.is_done());
    }

    #[tokio::test]
    async fn test_done_resolves_on_cancel() {
        let (b, cancel) = Base::background().with_cancel();
        let waiter = tokio::spawn({
            let b = b.clone();
            async move { b.done().await }
        });
        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(5), waiter)
            .await
            .expect("done() did not resolve")
            .expect("join");
    }

    #[tokio::test]
    async fn test_done_resolves_at_deadline() {
        let (b, _cancel) = Base::background().with_timeout(Duration::from_millis(20));
        tokio::time::timeout(Duration::from_secs(5), b.done())
            .await
            .expect("deadline did not fire");
        assert_eq!(b.err(), Some(CancelError::DeadlineExceeded));
    }
}
