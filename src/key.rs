//! Type-erased keys and shared values used by `Env` and the base value channel.
//!
//! Invariants
//! - Two keys compare equal only when their concrete types match and the values are equal.
//! - Hashing mixes the concrete `TypeId`, so `1u32` and `1u64` never collide as keys.
//! - Only `Hash + Eq` types can become keys; there is no nil key.

use std::any::{Any, TypeId};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Shared, immutable value stored in an `Env` or attached to a `Base`.
pub type Value = Arc<dyn Any + Send + Sync>;

trait ErasedKey: Any + Send + Sync {
    fn as_any(&self) -> &dyn Any;
    fn eq_erased(&self, other: &dyn ErasedKey) -> bool;
    fn hash_erased(&self, state: &mut dyn Hasher);
    fn fmt_erased(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result;
}

impl<K> ErasedKey for K
where
    K: Hash + Eq + fmt::Debug + Send + Sync + 'static,
{
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn eq_erased(&self, other: &dyn ErasedKey) -> bool {
        other
            .as_any()
            .downcast_ref::<K>()
            .is_some_and(|o| o == self)
    }

    fn hash_erased(&self, mut state: &mut dyn Hasher) {
        self.hash(&mut state);
    }

    fn fmt_erased(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Comparable, hashable key of any concrete type.
#[derive(Clone)]
pub struct Key(Arc<dyn ErasedKey>);

impl Key {
    pub fn new<K>(key: K) -> Self
    where
        K: Hash + Eq + fmt::Debug + Send + Sync + 'static,
    {
        Key(Arc::new(key))
    }

    /// Recover the concrete key when it has type `K`.
    pub fn downcast_ref<K: 'static>(&self) -> Option<&K> {
        self.0.as_any().downcast_ref::<K>()
    }

    pub fn is<K: 'static>(&self) -> bool {
        self.0.as_any().is::<K>()
    }

    fn concrete_type_id(&self) -> TypeId {
        self.0.as_any().type_id()
    }
}

impl PartialEq for Key {
    fn eq(&self, other: &Self) -> bool {
        self.0.eq_erased(other.0.as_ref())
    }
}

impl Eq for Key {}

impl Hash for Key {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.concrete_type_id().hash(state);
        self.0.hash_erased(state);
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt_erased(f)
    }
}

/// Wrap a concrete value for storage.
pub fn value<V: Any + Send + Sync>(v: V) -> Value {
    Arc::new(v)
}
