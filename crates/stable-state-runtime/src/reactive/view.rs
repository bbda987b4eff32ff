#![forbid(unsafe_code)]

//! Per-consumer accessors that record which fields were read.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use ahash::AHashSet;
use stable_state_core::TrackingMode;

use super::listeners::Subscription;
use super::store::{Store, StoreId, WeakStore};
use crate::consumer::Consumer;

pub(crate) type TrackedKeys = Rc<RefCell<AHashSet<Rc<str>>>>;

/// A consumer's window onto a [`Store`].
///
/// Reads through a `View` return the current value and add the key to the
/// view's tracked set; writes go straight to [`Store::set`]. The view holds
/// only a weak reference, so every operation on a view whose store is gone
/// (or torn down) is a silent no-op.
///
/// Cloning a `View` shares the tracked set.
pub struct View<V> {
    store: WeakStore<V>,
    tracked: TrackedKeys,
}

impl<V> Clone for View<V> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            tracked: Rc::clone(&self.tracked),
        }
    }
}

impl<V> fmt::Debug for View<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("View")
            .field("store", &self.store.id())
            .field("tracked", &self.tracked_keys())
            .finish()
    }
}

impl<V> View<V> {
    #[must_use]
    pub fn store_id(&self) -> StoreId {
        self.store.id()
    }

    /// Whether the underlying store still exists and is live.
    #[must_use]
    pub fn is_live(&self) -> bool {
        self.store.upgrade().is_some_and(|s| s.is_live())
    }

    #[must_use]
    pub fn is_tracking(&self, key: &str) -> bool {
        self.tracked.borrow().contains(key)
    }

    /// Tracked field names, sorted.
    #[must_use]
    pub fn tracked_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.tracked.borrow().iter().map(|k| k.to_string()).collect();
        keys.sort_unstable();
        keys
    }

    pub fn reset_tracking(&self) {
        self.tracked.borrow_mut().clear();
    }

    fn track(&self, key: &str) {
        let mut tracked = self.tracked.borrow_mut();
        if !tracked.contains(key) {
            tracked.insert(Rc::from(key));
        }
    }

    pub(crate) fn tracked_handle(&self) -> TrackedKeys {
        Rc::clone(&self.tracked)
    }

    /// Borrow a field without cloning. Tracks `key`.
    pub fn with<R>(&self, key: &str, f: impl FnOnce(Option<&V>) -> R) -> R {
        self.track(key);
        match self.store.upgrade() {
            Some(store) => store.with(key, f),
            None => f(None),
        }
    }
}

impl<V: Clone + PartialEq + 'static> View<V> {
    #[must_use]
    pub fn new(store: &Store<V>) -> Self {
        Self {
            store: store.downgrade(),
            tracked: Rc::new(RefCell::new(AHashSet::new())),
        }
    }

    /// Current value of `key`. Tracks `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<V> {
        self.track(key);
        self.peek(key)
    }

    /// Current value of `key`, or `default` when unset. Tracks `key`.
    #[must_use]
    pub fn get_or(&self, key: &str, default: V) -> V {
        self.get(key).unwrap_or(default)
    }

    /// Current value of `key` without tracking it.
    #[must_use]
    pub fn peek(&self, key: &str) -> Option<V> {
        self.store.upgrade().and_then(|store| store.get(key))
    }

    /// Write `key`. Does not track it: a consumer that only writes a field is
    /// not re-rendered by its own write.
    pub fn set(&self, key: &str, value: V) {
        if let Some(store) = self.store.upgrade() {
            store.set(key, value);
        } else {
            tracing::debug!(store = %self.store.id(), key, "write through view of dropped store ignored");
        }
    }

    /// Read-modify-write. Does not track `key`.
    pub fn update(&self, key: &str, f: impl FnOnce(Option<&V>) -> V) {
        if let Some(store) = self.store.upgrade() {
            store.update(key, f);
        }
    }
}

/// A view plus the listener that turns writes to its tracked keys into
/// re-render requests for one consumer.
///
/// Lives in a consumer hook slot; dropping it (consumer unmount or drop)
/// drops the subscription.
pub(crate) struct StoreBinding<V> {
    view: View<V>,
    tracking: TrackingMode,
    _subscription: Subscription,
}

impl<V: Clone + PartialEq + 'static> StoreBinding<V> {
    pub(crate) fn bind(store: &WeakStore<V>, consumer: &Consumer) -> Self {
        let view = View {
            store: store.clone(),
            tracked: Rc::new(RefCell::new(AHashSet::new())),
        };
        let Some(strong) = store.upgrade() else {
            return Self {
                view,
                tracking: TrackingMode::default(),
                _subscription: Subscription::inert(),
            };
        };

        let tracked = view.tracked_handle();
        let target = consumer.downgrade();
        let subscription = strong.subscribe(move |change| {
            let hit = tracked.borrow().contains(&*change.key);
            if !hit {
                return;
            }
            if let Some(consumer) = target.upgrade() {
                consumer.request_render();
            }
        });
        tracing::trace!(
            store = %strong.id(),
            consumer = %consumer.id(),
            "consumer bound to store"
        );

        Self {
            view,
            tracking: strong.config().tracking,
            _subscription: subscription,
        }
    }

    pub(crate) fn store_id(&self) -> StoreId {
        self.view.store_id()
    }

    /// Start of a render pass: reset tracking if configured, hand out the view.
    pub(crate) fn begin_pass(&self) -> View<V> {
        if self.tracking == TrackingMode::PerRender {
            self.view.reset_tracking();
        }
        self.view.clone()
    }
}
