#![forbid(unsafe_code)]

//! The store engine: named fields plus write fan-out.
//!
//! # Design
//!
//! [`Store<V>`] owns a map from field name to `V` and a [`ListenerSet`] of
//! [`FieldChange`] callbacks. Cloning a `Store` creates another handle to the
//! **same** fields. Consumers never touch the map directly; they go through a
//! [`View`](super::View), which records the keys they read.
//!
//! Only top-level replacement is observable: mutating the inside of a value
//! obtained from [`get`](Store::get) changes a copy, and mutating through
//! [`with`](Store::with) is impossible (shared borrow).
//!
//! # Invariants
//!
//! 1. After `set(k, v)` returns, `get(k) == Some(v)` (unless the store was
//!    torn down).
//! 2. Every applied write bumps `version` by exactly one and notifies every
//!    listener registered before the write, in registration order, before
//!    `set` returns.
//! 3. No field borrow is held while listeners run, so a listener may read or
//!    write the same store.
//! 4. Once torn down, the store is inert: reads return `None`, writes and
//!    subscriptions are ignored.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use ahash::AHashMap;
use stable_state_core::{EqualityPolicy, StoreConfig};

use super::listeners::{ListenerSet, Subscription};

static NEXT_STORE_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique store identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StoreId(u64);

impl StoreId {
    fn next() -> Self {
        Self(NEXT_STORE_ID.fetch_add(1, Ordering::Relaxed))
    }

    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for StoreId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "store#{}", self.0)
    }
}

/// Payload delivered to store listeners on every applied write.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldChange<V> {
    pub key: Rc<str>,
    pub value: V,
}

struct StoreInner<V> {
    id: StoreId,
    /// Equality policy, tracking mode and log label.
    config: StoreConfig,
    /// Current field values. Keys are shared with emitted changes.
    fields: RefCell<AHashMap<Rc<str>, V>>,
    /// Notified after every applied write, in registration order.
    listeners: ListenerSet<FieldChange<V>>,
    /// Cleared by `tear_down`; writes on a dead store are ignored.
    live: Cell<bool>,
    /// Bumped once per applied write.
    version: Cell<u64>,
}

/// A shared, mutable set of named fields with per-write notification.
pub struct Store<V> {
    inner: Rc<StoreInner<V>>,
}

impl<V> Clone for Store<V> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<V: fmt::Debug> fmt::Debug for Store<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("id", &self.inner.id)
            .field("label", &self.inner.config.label_or_default())
            .field("fields", &self.inner.fields.borrow().len())
            .field("version", &self.inner.version.get())
            .field("live", &self.inner.live.get())
            .finish()
    }
}

impl<V> Store<V> {
    #[must_use]
    pub fn id(&self) -> StoreId {
        self.inner.id
    }

    #[must_use]
    pub fn config(&self) -> &StoreConfig {
        &self.inner.config
    }

    /// Number of applied writes since creation.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.inner.version.get()
    }

    #[must_use]
    pub fn is_live(&self) -> bool {
        self.inner.live.get()
    }

    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.inner.listeners.len()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.fields.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.inner.fields.borrow().contains_key(key)
    }

    /// Field names, sorted.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .inner
            .fields
            .borrow()
            .keys()
            .map(|k| k.to_string())
            .collect();
        keys.sort_unstable();
        keys
    }

    #[must_use]
    pub fn downgrade(&self) -> WeakStore<V> {
        WeakStore {
            id: self.inner.id,
            inner: Rc::downgrade(&self.inner),
        }
    }

    /// Move to the torn-down state: drop every listener and release all
    /// fields. Idempotent.
    pub fn tear_down(&self) {
        if !self.inner.live.replace(false) {
            return;
        }
        let listeners = self.inner.listeners.len();
        self.inner.listeners.clear();
        let fields = std::mem::take(&mut *self.inner.fields.borrow_mut());
        tracing::debug!(
            store = %self.inner.id,
            label = self.inner.config.label_or_default(),
            listeners,
            fields = fields.len(),
            "store torn down"
        );
        drop(fields);
    }

    /// Borrow a field without cloning it.
    ///
    /// # Panics
    ///
    /// Panics if `f` writes to this store (re-entrant mutable borrow).
    pub fn with<R>(&self, key: &str, f: impl FnOnce(Option<&V>) -> R) -> R {
        let fields = self.inner.fields.borrow();
        f(fields.get(key))
    }
}

impl<V: Clone + PartialEq + 'static> Store<V> {
    /// Create a store with default configuration.
    pub fn new<K, I>(initial: I) -> Self
    where
        K: Into<Rc<str>>,
        I: IntoIterator<Item = (K, V)>,
    {
        Self::with_config(initial, StoreConfig::default())
    }

    pub fn with_config<K, I>(initial: I, config: StoreConfig) -> Self
    where
        K: Into<Rc<str>>,
        I: IntoIterator<Item = (K, V)>,
    {
        let fields: AHashMap<Rc<str>, V> = initial.into_iter().map(|(k, v)| (k.into(), v)).collect();
        let id = StoreId::next();
        tracing::debug!(
            store = %id,
            label = config.label_or_default(),
            fields = fields.len(),
            equality = %config.equality,
            tracking = %config.tracking,
            "store created"
        );
        Self {
            inner: Rc::new(StoreInner {
                id,
                config,
                fields: RefCell::new(fields),
                listeners: ListenerSet::new(),
                live: Cell::new(true),
                version: Cell::new(0),
            }),
        }
    }

    /// Current value of `key`, or `None` if it was never set.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<V> {
        self.inner.fields.borrow().get(key).cloned()
    }

    /// Replace `key` and notify listeners.
    ///
    /// Under [`EqualityPolicy::SkipUnchanged`] a value equal to the current
    /// one is dropped without notification. Writes to a torn-down store are
    /// ignored.
    pub fn set(&self, key: &str, value: V) {
        if !self.is_live() {
            tracing::debug!(store = %self.inner.id, key, "write ignored on torn-down store");
            return;
        }

        let key: Rc<str> = {
            let mut fields = self.inner.fields.borrow_mut();
            let existing = fields.get_key_value(key);
            if self.inner.config.equality == EqualityPolicy::SkipUnchanged
                && existing.is_some_and(|(_, current)| *current == value)
            {
                tracing::trace!(store = %self.inner.id, key, "unchanged write skipped");
                return;
            }
            let key = existing.map_or_else(|| Rc::from(key), |(k, _)| Rc::clone(k));
            fields.insert(Rc::clone(&key), value.clone());
            key
        };

        let version = self.inner.version.get() + 1;
        self.inner.version.set(version);

        let change = FieldChange { key, value };
        let delivered = self.inner.listeners.notify(&change);
        tracing::trace!(
            store = %self.inner.id,
            key = &*change.key,
            version,
            delivered,
            "field written"
        );
    }

    /// Read-modify-write of a single field.
    pub fn update(&self, key: &str, f: impl FnOnce(Option<&V>) -> V) {
        let next = self.with(key, f);
        self.set(key, next);
    }

    /// Register a listener for every applied write.
    ///
    /// Subscribing to a torn-down store returns an inert subscription.
    #[must_use = "dropping the Subscription unsubscribes immediately"]
    pub fn subscribe(&self, listener: impl Fn(&FieldChange<V>) + 'static) -> Subscription {
        if !self.is_live() {
            return Subscription::inert();
        }
        self.inner.listeners.subscribe(listener)
    }

    /// Copy of every field, sorted by name.
    #[must_use]
    pub fn snapshot(&self) -> Vec<(String, V)> {
        let mut out: Vec<(String, V)> = self
            .inner
            .fields
            .borrow()
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect();
        out.sort_unstable_by(|a, b| a.0.cmp(&b.0));
        out
    }
}

/// Non-owning store handle. Never keeps the store alive.
pub struct WeakStore<V> {
    id: StoreId,
    inner: Weak<StoreInner<V>>,
}

impl<V> Clone for WeakStore<V> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            inner: Weak::clone(&self.inner),
        }
    }
}

impl<V> fmt::Debug for WeakStore<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakStore")
            .field("id", &self.id)
            .field("alive", &(self.inner.strong_count() > 0))
            .finish()
    }
}

impl<V> WeakStore<V> {
    #[must_use]
    pub fn id(&self) -> StoreId {
        self.id
    }

    #[must_use]
    pub fn upgrade(&self) -> Option<Store<V>> {
        self.inner.upgrade().map(|inner| Store { inner })
    }
}
