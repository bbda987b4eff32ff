#![forbid(unsafe_code)]

//! Single-value observable cell.
//!
//! # Design
//!
//! [`Observable<T>`] is the one-field sibling of [`Store`](super::Store):
//! shared `Rc` storage, a version counter, and a [`ListenerSet`] receiving the
//! new value. Unlike a store it always skips equal writes.
//!
//! # Invariants
//!
//! 1. Version increments exactly once per `set` that changes the value.
//! 2. Setting a value equal to the current one is a no-op (no version bump,
//!    no notifications).
//! 3. Subscribers see the new value, in registration order, and may read or
//!    write the observable from their callback.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use super::listeners::{ListenerSet, Subscription};

struct ObservableInner<T> {
    value: RefCell<T>,
    version: Cell<u64>,
    listeners: ListenerSet<T>,
}

/// Shared, version-tracked value with change notification.
///
/// Cloning an `Observable` creates a new handle to the **same** value.
pub struct Observable<T> {
    inner: Rc<ObservableInner<T>>,
}

impl<T> Clone for Observable<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Observable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observable")
            .field("value", &*self.inner.value.borrow())
            .field("version", &self.inner.version.get())
            .field("subscribers", &self.inner.listeners.len())
            .finish()
    }
}

impl<T: Clone + PartialEq + 'static> Observable<T> {
    #[must_use]
    pub fn new(value: T) -> Self {
        Self {
            inner: Rc::new(ObservableInner {
                value: RefCell::new(value),
                version: Cell::new(0),
                listeners: ListenerSet::new(),
            }),
        }
    }

    #[must_use]
    pub fn get(&self) -> T {
        self.inner.value.borrow().clone()
    }

    /// # Panics
    ///
    /// Panics if `f` calls [`set`](Self::set) on this observable.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.inner.value.borrow())
    }

    /// Replace the value. Returns whether it changed.
    pub fn set(&self, value: T) -> bool {
        {
            let mut current = self.inner.value.borrow_mut();
            if *current == value {
                return false;
            }
            *current = value.clone();
        }
        self.inner.version.set(self.inner.version.get() + 1);
        self.inner.listeners.notify(&value);
        true
    }

    /// Mutate in place; notifies only if the result differs.
    pub fn update(&self, f: impl FnOnce(&mut T)) -> bool {
        let mut next = self.get();
        f(&mut next);
        self.set(next)
    }

    #[must_use]
    pub fn version(&self) -> u64 {
        self.inner.version.get()
    }

    #[must_use = "dropping the Subscription unsubscribes immediately"]
    pub fn subscribe(&self, callback: impl Fn(&T) + 'static) -> Subscription {
        self.inner.listeners.subscribe(callback)
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.inner.listeners.len()
    }
}
