//! Hierarchical overlay environment.
//!
//! Invariants
//! - `set` writes only to the local map of the node it is called on.
//! - `get` resolves to the nearest node (self first, then ancestors) holding the key.
//! - A node keeps its parent alive; parents never reference children.
//! - Typed getters treat a type mismatch exactly like a missing key.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::hash::Hash;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, SocketAddrV4, SocketAddrV6};
use std::sync::{Arc, RwLock};
use std::time::{Duration, SystemTime};

use ipnet::{IpNet, Ipv4Net, Ipv6Net};

use crate::key::{Key, Value};

struct Node {
    parent: Option<Arc<Node>>,
    vals: RwLock<HashMap<Key, Value>>,
}

impl Node {
    fn load(&self, key: &Key) -> Option<Value> {
        let vals = self.vals.read().unwrap_or_else(|e| e.into_inner());
        vals.get(key).cloned()
    }
}

/// Environment node handle. Cloning shares the node; use [`Env::fork`] to derive a child.
#[derive(Clone)]
pub struct Env {
    node: Arc<Node>,
}

impl Default for Env {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Env {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Env")
            .field("depth", &self.depth())
            .field("local", &self.local_len())
            .finish()
    }
}

impl Env {
    /// Empty root node.
    pub fn new() -> Self {
        Env {
            node: Arc::new(Node {
                parent: None,
                vals: RwLock::new(HashMap::new()),
            }),
        }
    }

    /// Child node whose parent is `self`.
    pub fn fork(&self) -> Env {
        Env {
            node: Arc::new(Node {
                parent: Some(Arc::clone(&self.node)),
                vals: RwLock::new(HashMap::new()),
            }),
        }
    }

    /// Store `value` under `key` in this node only, replacing any local value.
    pub fn set<K, V>(&self, key: K, value: V)
    where
        K: Hash + Eq + fmt::Debug + Send + Sync + 'static,
        V: std::any::Any + Send + Sync,
    {
        self.set_value(Key::new(key), Arc::new(value));
    }

    pub fn set_value(&self, key: Key, value: Value) {
        let mut vals = self.node.vals.write().unwrap_or_else(|e| e.into_inner());
        vals.insert(key, value);
    }

    pub fn get<K>(&self, key: K) -> Option<Value>
    where
        K: Hash + Eq + fmt::Debug + Send + Sync + 'static,
    {
        self.get_value(&Key::new(key))
    }

    /// Look up `key` locally, then in each ancestor.
    pub fn get_value(&self, key: &Key) -> Option<Value> {
        let mut cur = Some(&self.node);
        while let Some(node) = cur {
            if let Some(v) = node.load(key) {
                return Some(v);
            }
            cur = node.parent.as_ref();
        }
        None
    }

    pub fn has<K>(&self, key: K) -> bool
    where
        K: Hash + Eq + fmt::Debug + Send + Sync + 'static,
    {
        self.get(key).is_some()
    }

    /// Every key visible from this node, each reported once, in no particular order.
    pub fn keys(&self) -> Vec<Key> {
        let mut seen: HashSet<Key> = HashSet::new();
        let mut cur = Some(&self.node);
        while let Some(node) = cur {
            let vals = node.vals.read().unwrap_or_else(|e| e.into_inner());
            seen.extend(vals.keys().cloned());
            cur = node.parent.as_ref();
        }
        seen.into_iter().collect()
    }

    /// Number of ancestors above this node.
    pub fn depth(&self) -> usize {
        let mut depth = 0;
        let mut cur = self.node.parent.as_ref();
        while let Some(node) = cur {
            depth += 1;
            cur = node.parent.as_ref();
        }
        depth
    }

    fn local_len(&self) -> usize {
        self.node
            .vals
            .read()
            .map(|v| v.len())
            .unwrap_or_else(|e| e.into_inner().len())
    }

    /// Narrow the visible value to `T`; a missing key or a different type yields `None`.
    pub fn get_as<T, K>(&self, key: K) -> Option<T>
    where
        T: Clone + 'static,
        K: Hash + Eq + fmt::Debug + Send + Sync + 'static,
    {
        self.get(key).and_then(|v| v.downcast_ref::<T>().cloned())
    }

    pub fn get_i32<K>(&self, key: K) -> Option<i32>
    where
        K: Hash + Eq + fmt::Debug + Send + Sync + 'static,
    {
        self.get_as::<i32, K>(key)
    }

    pub fn get_i64<K>(&self, key: K) -> Option<i64>
    where
        K: Hash + Eq + fmt::Debug + Send + Sync + 'static,
    {
        self.get_as::<i64, K>(key)
    }

    pub fn get_isize<K>(&self, key: K) -> Option<isize>
    where
        K: Hash + Eq + fmt::Debug + Send + Sync + 'static,
    {
        self.get_as::<isize, K>(key)
    }

    pub fn get_u32<K>(&self, key: K) -> Option<u32>
    where
        K: Hash + Eq + fmt::Debug + Send + Sync + 'static,
    {
        self.get_as::<u32, K>(key)
    }

    pub fn get_u64<K>(&self, key: K) -> Option<u64>
    where
        K: Hash + Eq + fmt::Debug + Send + Sync + 'static,
    {
        self.get_as::<u64, K>(key)
    }

    pub fn get_usize<K>(&self, key: K) -> Option<usize>
    where
        K: Hash + Eq + fmt::Debug + Send + Sync + 'static,
    {
        self.get_as::<usize, K>(key)
    }

    pub fn get_f64<K>(&self, key: K) -> Option<f64>
    where
        K: Hash + Eq + fmt::Debug + Send + Sync + 'static,
    {
        self.get_as::<f64, K>(key)
    }

    pub fn get_bool<K>(&self, key: K) -> Option<bool>
    where
        K: Hash + Eq + fmt::Debug + Send + Sync + 'static,
    {
        self.get_as::<bool, K>(key)
    }

    /// Accepts `String`, `&'static str` and `Arc<str>` values.
    pub fn get_string<K>(&self, key: K) -> Option<String>
    where
        K: Hash + Eq + fmt::Debug + Send + Sync + 'static,
    {
        let v = self.get(key)?;
        if let Some(s) = v.downcast_ref::<String>() {
            return Some(s.clone());
        }
        if let Some(s) = v.downcast_ref::<&'static str>() {
            return Some((*s).to_string());
        }
        v.downcast_ref::<Arc<str>>().map(|s| s.to_string())
    }

    /// Accepts `IpAddr`, `Ipv4Addr` and `Ipv6Addr` values.
    pub fn get_ip_addr<K>(&self, key: K) -> Option<IpAddr>
    where
        K: Hash + Eq + fmt::Debug + Send + Sync + 'static,
    {
        let v = self.get(key)?;
        if let Some(a) = v.downcast_ref::<IpAddr>() {
            return Some(*a);
        }
        if let Some(a) = v.downcast_ref::<Ipv4Addr>() {
            return Some(IpAddr::V4(*a));
        }
        v.downcast_ref::<Ipv6Addr>().map(|a| IpAddr::V6(*a))
    }

    /// Accepts `SocketAddr`, `SocketAddrV4` and `SocketAddrV6` values.
    pub fn get_socket_addr<K>(&self, key: K) -> Option<SocketAddr>
    where
        K: Hash + Eq + fmt::Debug + Send + Sync + 'static,
    {
        let v = self.get(key)?;
        if let Some(a) = v.downcast_ref::<SocketAddr>() {
            return Some(*a);
        }
        if let Some(a) = v.downcast_ref::<SocketAddrV4>() {
            return Some(SocketAddr::V4(*a));
        }
        v.downcast_ref::<SocketAddrV6>().map(|a| SocketAddr::V6(*a))
    }

    /// Accepts `IpNet`, `Ipv4Net` and `Ipv6Net` values.
    pub fn get_ip_net<K>(&self, key: K) -> Option<IpNet>
    where
        K: Hash + Eq + fmt::Debug + Send + Sync + 'static,
    {
        let v = self.get(key)?;
        if let Some(n) = v.downcast_ref::<IpNet>() {
            return Some(*n);
        }
        if let Some(n) = v.downcast_ref::<Ipv4Net>() {
            return Some(IpNet::V4(*n));
        }
        v.downcast_ref::<Ipv6Net>().map(|n| IpNet::V6(*n))
    }

    pub fn get_system_time<K>(&self, key: K) -> Option<SystemTime>
    where
        K: Hash + Eq + fmt::Debug + Send + Sync + 'static,
    {
        self.get_as::<SystemTime, K>(key)
    }

    pub fn get_duration<K>(&self, key: K) -> Option<Duration>
    where
        K: Hash + Eq + fmt::Debug + Send + Sync + 'static,
    {
        self.get_as::<Duration, K>(key)
    }
}
