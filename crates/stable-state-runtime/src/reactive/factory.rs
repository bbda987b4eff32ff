#![forbid(unsafe_code)]

//! Instance factory: one independent store per [`create`] call.
//!
//! ```
//! use stable_state_runtime::consumer::Consumer;
//! use stable_state_runtime::reactive::create;
//!
//! let use_counter = create([("count", 0)]);
//! let button = Consumer::new("button");
//!
//! let shown = button.render(|cx| {
//!     let counter = use_counter.use_store(cx);
//!     counter.get("count")
//! });
//! assert_eq!(shown, Some(0));
//!
//! use_counter.set("count", 1);
//! assert_eq!(button.render_requests(), 1);
//! ```

use std::cell::OnceCell;
use std::fmt;
use std::rc::Rc;

use stable_state_core::StoreConfig;

use super::store::Store;
use super::view::{StoreBinding, View};
use crate::consumer::RenderCx;

/// Accessor returned by [`create`]. Owns its store for as long as any clone
/// of the accessor exists.
pub struct UseStore<V> {
    store: Store<V>,
}

impl<V> Clone for UseStore<V> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
        }
    }
}

impl<V: fmt::Debug> fmt::Debug for UseStore<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UseStore").field("store", &self.store).finish()
    }
}

/// Create an independent store seeded with `initial`.
pub fn create<V, K, I>(initial: I) -> UseStore<V>
where
    V: Clone + PartialEq + 'static,
    K: Into<Rc<str>>,
    I: IntoIterator<Item = (K, V)>,
{
    create_with_config(initial, StoreConfig::default())
}

pub fn create_with_config<V, K, I>(initial: I, config: StoreConfig) -> UseStore<V>
where
    V: Clone + PartialEq + 'static,
    K: Into<Rc<str>>,
    I: IntoIterator<Item = (K, V)>,
{
    UseStore {
        store: Store::with_config(initial, config),
    }
}

impl<V: Clone + PartialEq + 'static> UseStore<V> {
    /// The consumer's view of this store.
    ///
    /// The first call for a consumer binds it: one view and one listener,
    /// kept in a hook slot until the consumer unmounts. Later calls reuse
    /// the binding, resetting tracked keys first under
    /// [`TrackingMode::PerRender`](stable_state_core::TrackingMode::PerRender).
    pub fn use_store(&self, cx: &mut RenderCx<'_>) -> View<V> {
        let weak = self.store.downgrade();
        let binding = cx.use_slot(move |consumer| StoreBinding::bind(&weak, consumer));
        binding.begin_pass()
    }

    #[must_use]
    pub fn store(&self) -> &Store<V> {
        &self.store
    }

    /// Untracked read, for code outside any render pass.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<V> {
        self.store.get(key)
    }

    /// Write from outside any render pass (event handlers, timers).
    pub fn set(&self, key: &str, value: V) {
        self.store.set(key, value);
    }
}

/// Get-or-create initializer for a store shared by a whole module.
///
/// Holds no store until first use, then always returns the same accessor.
/// Intended for `thread_local!`:
///
/// ```
/// use stable_state_runtime::reactive::{LazyStore, create};
///
/// thread_local! {
///     static CART: LazyStore<i64> = LazyStore::new(|| create([("items", 0), ("total", 0)]));
/// }
///
/// CART.with(|cart| cart.get().set("items", 2));
/// assert_eq!(CART.with(|cart| cart.get().get("items")), Some(2));
/// ```
pub struct LazyStore<V> {
    cell: OnceCell<UseStore<V>>,
    init: fn() -> UseStore<V>,
}

impl<V> LazyStore<V> {
    #[must_use]
    pub const fn new(init: fn() -> UseStore<V>) -> Self {
        Self {
            cell: OnceCell::new(),
            init,
        }
    }

    pub fn get(&self) -> &UseStore<V> {
        self.cell.get_or_init(self.init)
    }

    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.cell.get().is_some()
    }
}

impl<V> fmt::Debug for LazyStore<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyStore")
            .field("initialized", &self.is_initialized())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consumer::Consumer;
    use serde_json::{Value, json};
    use stable_state_core::TrackingMode;

    fn person() -> UseStore<Value> {
        create([("name", json!("John")), ("age", json!(20))])
    }

    #[test]
    fn binding_is_reused_across_renders() {
        let use_person = person();
        let consumer = Consumer::new("card");

        for _ in 0..3 {
            consumer.render(|cx| {
                let view = use_person.use_store(cx);
                let _ = view.get("name");
            });
        }
        assert_eq!(use_person.store().listener_count(), 1);
    }

    #[test]
    fn only_tracked_keys_request_renders() {
        let use_person = person();
        let name_input = Consumer::new("name-input");
        name_input.render(|cx| {
            let _ = use_person.use_store(cx).get("name");
        });

        use_person.set("age", json!(21));
        assert_eq!(name_input.render_requests(), 0);

        use_person.set("name", json!("Jane"));
        assert_eq!(name_input.render_requests(), 1);
    }

    #[test]
    fn writer_that_never_reads_is_not_rerendered() {
        let use_person = person();
        let reader = Consumer::new("reader");
        let writer = Consumer::new("writer");

        reader.render(|cx| {
            let _ = use_person.use_store(cx).get("age");
        });
        let view = writer.render(|cx| use_person.use_store(cx));
        view.set("age", json!(30));

        assert_eq!(reader.render_requests(), 1);
        assert_eq!(writer.render_requests(), 0);
    }

    #[test]
    fn per_render_tracking_forgets_old_reads() {
        let use_person = person();
        let consumer = Consumer::new("conditional");

        consumer.render(|cx| {
            let _ = use_person.use_store(cx).get("name");
        });
        consumer.render(|cx| {
            let _ = use_person.use_store(cx).get("age");
        });

        use_person.set("name", json!("Jane"));
        assert_eq!(consumer.render_requests(), 0);
        use_person.set("age", json!(40));
        assert_eq!(consumer.render_requests(), 1);
    }

    #[test]
    fn accumulate_tracking_keeps_old_reads() {
        let use_person = create_with_config(
            [("name", json!("John")), ("age", json!(20))],
            StoreConfig::new().with_tracking(TrackingMode::Accumulate),
        );
        let consumer = Consumer::new("conditional");

        consumer.render(|cx| {
            let _ = use_person.use_store(cx).get("name");
        });
        consumer.render(|cx| {
            let _ = use_person.use_store(cx).get("age");
        });

        use_person.set("name", json!("Jane"));
        assert_eq!(consumer.render_requests(), 1);
    }

    #[test]
    fn unmount_unsubscribes() {
        let use_person = person();
        let consumer = Consumer::new("card");
        consumer.render(|cx| {
            let _ = use_person.use_store(cx).get("name");
        });
        assert_eq!(use_person.store().listener_count(), 1);

        consumer.unmount();
        assert_eq!(use_person.store().listener_count(), 0);
        use_person.set("name", json!("Jane"));
        assert_eq!(consumer.render_requests(), 0);
    }

    #[test]
    fn dropping_consumer_unsubscribes() {
        let use_person = person();
        {
            let consumer = Consumer::new("temp");
            consumer.render(|cx| {
                let _ = use_person.use_store(cx).get("name");
            });
        }
        assert_eq!(use_person.store().listener_count(), 0);
    }

    #[test]
    fn view_outliving_accessor_is_inert() {
        let consumer = Consumer::new("c");
        let view = {
            let use_person = person();
            consumer.render(|cx| use_person.use_store(cx))
        };
        assert!(!view.is_live());
        assert_eq!(view.get("name"), None);
        view.set("name", json!("x"));
    }

    #[test]
    fn lazy_store_initializes_once() {
        let lazy: LazyStore<i32> = LazyStore::new(|| create([("n", 1)]));
        assert!(!lazy.is_initialized());
        lazy.get().set("n", 2);
        assert!(lazy.is_initialized());
        assert_eq!(lazy.get().get("n"), Some(2));
        assert_eq!(lazy.get().store().id(), lazy.get().store().id());
    }
}
