#![forbid(unsafe_code)]

//! Subtree-scoped stores reached by ambient lookup.
//!
//! A [`Provider`] owns one store for as long as it is mounted. Everything
//! rendered inside [`Provider::render`] (or while a [`Provider::enter`] guard
//! is alive) can reach that store with [`use_scoped_store`]. Providers nest:
//! the innermost provider for a value type shadows outer ones, and fields are
//! never merged between them.
//!
//! Dropping a provider tears its store down. Views that outlive it keep
//! working as no-ops.
//!
//! ```
//! use stable_state_runtime::consumer::Consumer;
//! use stable_state_runtime::reactive::{Provider, use_scoped_store};
//!
//! let provider = Provider::new([("theme", "dark")]);
//! let header = Consumer::new("header");
//!
//! let theme = provider.render(|| {
//!     header.render(|cx| {
//!         let state = use_scoped_store::<&str>(cx)?;
//!         Ok::<_, stable_state_runtime::StateError>(state.get("theme"))
//!     })
//! });
//! assert_eq!(theme.unwrap(), Some("dark"));
//! ```

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use stable_state_core::{Result, StateError, StoreConfig, Value, fields_from_json};

use super::store::Store;
use super::view::{StoreBinding, View};
use crate::consumer::RenderCx;
use crate::context::{self, ScopeGuard};

/// Owner of one subtree-scoped store.
pub struct Provider<V> {
    store: Store<V>,
}

impl<V: fmt::Debug> fmt::Debug for Provider<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Provider").field("store", &self.store).finish()
    }
}

impl<V: Clone + PartialEq + 'static> Provider<V> {
    /// Mount a provider seeded with `initial`.
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
        let store = Store::with_config(initial, config);
        tracing::debug!(store = %store.id(), depth = context::depth(), "provider mounted");
        Self { store }
    }

    /// Expose the store to everything rendered until the guard drops.
    pub fn enter(&self) -> ScopeGuard {
        context::enter(self.store.downgrade())
    }

    /// Render `children` with this provider's store in scope.
    pub fn render<R>(&self, children: impl FnOnce() -> R) -> R {
        let _scope = self.enter();
        children()
    }

    #[must_use]
    pub fn store(&self) -> &Store<V> {
        &self.store
    }

    /// Unmount explicitly. Same as dropping.
    pub fn unmount(self) {}
}

impl Provider<Value> {
    /// Mount a provider seeded from a JSON object, e.g. data fetched by a
    /// server component.
    pub fn from_json(initial: Value) -> Result<Self> {
        Ok(Self::new(fields_from_json(initial)?))
    }
}

impl<V> Drop for Provider<V> {
    fn drop(&mut self) {
        self.store.tear_down();
    }
}

/// The calling consumer's view of the nearest enclosing provider's store.
///
/// # Errors
///
/// [`StateError::Configuration`] when no provider for `V` encloses the
/// consumer. The error is returned before any hook slot is touched, so the
/// render can bail out with `?` before producing output. On a first render
/// the consumer is left unmounted, so it can still be mounted under a
/// provider later.
pub fn use_scoped_store<V: Clone + PartialEq + 'static>(cx: &mut RenderCx<'_>) -> Result<View<V>> {
    let Some(store) = context::lookup::<V>() else {
        tracing::debug!(consumer = %cx.consumer().id(), "scoped store requested outside any provider");
        cx.abandon_mount();
        return Err(StateError::configuration("use_scoped_store"));
    };

    let slot = cx.use_slot(|_| RefCell::new(None::<StoreBinding<V>>));
    let mut binding = slot.borrow_mut();
    // A consumer re-rendered under a different provider rebinds.
    let bound = match binding.take() {
        Some(bound) if bound.store_id() == store.id() => binding.insert(bound),
        _ => binding.insert(StoreBinding::bind(&store, cx.consumer())),
    };
    Ok(bound.begin_pass())
}
