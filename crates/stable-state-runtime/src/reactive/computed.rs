#![forbid(unsafe_code)]

//! Lazy values derived from store fields or observables.
//!
//! # Design
//!
//! [`Computed<T>`] wraps a compute function and its cached result in shared,
//! reference-counted storage. A dependency change only sets a shared dirty
//! flag; the next [`get()`](Computed::get) recomputes and caches the result.
//!
//! [`Computed::from_store`] hands the compute function a tracking
//! [`View`]. Tracked keys are reset before every recompute, so a computed
//! value is invalidated only by writes to the fields its latest computation
//! actually read.
//!
//! # Invariants
//!
//! 1. `get()` always returns a value consistent with the current state of all
//!    dependencies.
//! 2. The compute function is called at most once per dependency change cycle
//!    (memoization).
//! 3. Version increments by exactly 1 per recomputation.
//!
//! # Failure Modes
//!
//! - **Compute function panics**: the dirty flag stays set, so the next
//!   `get()` retries.
//! - **Dependency dropped**: the subscription becomes inert. The computed
//!   value keeps its last cached result and never becomes dirty again from
//!   that source.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use super::listeners::Subscription;
use super::observable::Observable;
use super::store::Store;
use super::view::View;

struct ComputedInner<T> {
    compute: Box<dyn Fn() -> T>,
    cached: Option<T>,
    version: u64,
    /// Kept alive for their side effect only.
    _subscriptions: Vec<Subscription>,
}

/// A lazily-evaluated, memoized derived value.
///
/// Cloning a `Computed` creates a new handle to the **same** inner state.
pub struct Computed<T> {
    inner: Rc<RefCell<ComputedInner<T>>>,
    dirty: Rc<Cell<bool>>,
}

impl<T> Clone for Computed<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
            dirty: Rc::clone(&self.dirty),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Computed<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("Computed")
            .field("cached", &inner.cached)
            .field("dirty", &self.dirty.get())
            .field("version", &inner.version)
            .finish()
    }
}

impl<T: Clone + 'static> Computed<T> {
    /// Derive a value from fields of `store`.
    ///
    /// `map` reads fields through the view it is given; only those fields
    /// invalidate the result.
    pub fn from_store<V: Clone + PartialEq + 'static>(
        store: &Store<V>,
        map: impl Fn(&View<V>) -> T + 'static,
    ) -> Self {
        let view = View::new(store);
        let dirty = Rc::new(Cell::new(true));

        let tracked = view.tracked_handle();
        let flag = Rc::clone(&dirty);
        let sub = store.subscribe(move |change| {
            if tracked.borrow().contains(&*change.key) {
                flag.set(true);
            }
        });

        let compute = Box::new(move || {
            view.reset_tracking();
            map(&view)
        });
        Self::build(compute, vec![sub], dirty)
    }

    /// Derive a value from a single observable.
    pub fn from_observable<S: Clone + PartialEq + 'static>(
        source: &Observable<S>,
        map: impl Fn(&S) -> T + 'static,
    ) -> Self {
        let dirty = Rc::new(Cell::new(true));
        let flag = Rc::clone(&dirty);
        let sub = source.subscribe(move |_| flag.set(true));

        let source = source.clone();
        let compute = Box::new(move || source.with(|v| map(v)));
        Self::build(compute, vec![sub], dirty)
    }

    /// Low-level constructor: the caller manages invalidation through
    /// [`invalidate`](Self::invalidate); `subscriptions` are only kept alive.
    pub fn from_fn(compute: impl Fn() -> T + 'static, subscriptions: Vec<Subscription>) -> Self {
        Self::build(Box::new(compute), subscriptions, Rc::new(Cell::new(true)))
    }

    fn build(compute: Box<dyn Fn() -> T>, subscriptions: Vec<Subscription>, dirty: Rc<Cell<bool>>) -> Self {
        Self {
            inner: Rc::new(RefCell::new(ComputedInner {
                compute,
                cached: None,
                version: 0,
                _subscriptions: subscriptions,
            })),
            dirty,
        }
    }

    /// Current value, recomputing first if any dependency changed.
    #[must_use]
    pub fn get(&self) -> T {
        self.with(T::clone)
    }

    /// Access the current value by reference without cloning.
    ///
    /// # Panics
    ///
    /// Panics if the closure calls `get()` on the same `Computed`
    /// (re-entrant borrow).
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        let mut inner = self.inner.borrow_mut();
        let value = match inner.cached.take() {
            Some(value) if !self.dirty.get() => value,
            _ => {
                let value = (inner.compute)();
                self.dirty.set(false);
                inner.version += 1;
                value
            }
        };
        let out = f(&value);
        inner.cached = Some(value);
        out
    }

    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.dirty.get()
    }

    /// Force the next `get()` to recompute.
    pub fn invalidate(&self) {
        self.dirty.set(true);
    }

    /// Number of recomputations so far.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.inner.borrow().version
    }
}
