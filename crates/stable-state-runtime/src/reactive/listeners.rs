#![forbid(unsafe_code)]

//! Listener registry shared by [`Store`](super::Store) and
//! [`Observable`](super::Observable).
//!
//! # Design
//!
//! The registry holds `Weak` references to listener entries; the strong
//! reference lives in the [`Subscription`] returned to the caller. Dropping
//! or explicitly unsubscribing a `Subscription` deactivates its entry and
//! removes it from the registry. Dead weak entries are also pruned lazily at
//! the start of each notification.
//!
//! # Invariants
//!
//! 1. Listeners are invoked in registration order.
//! 2. Notification iterates a snapshot taken before the first callback runs:
//!    a listener registered during a notification is not invoked for it.
//! 3. A listener deactivated during a notification (by itself or by another
//!    listener) is skipped if it has not been invoked yet.
//! 4. No registry borrow is held while callbacks run, so callbacks may
//!    subscribe, unsubscribe, or trigger further notifications.
//! 5. `Subscription::unsubscribe` is idempotent and only ever removes its own
//!    entry.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

struct ListenerEntry<E> {
    active: Cell<bool>,
    callback: Box<dyn Fn(&E)>,
}

struct Registry<E> {
    entries: RefCell<Vec<Weak<ListenerEntry<E>>>>,
}

/// An ordered set of callbacks receiving `&E` on every notification.
pub struct ListenerSet<E> {
    registry: Rc<Registry<E>>,
}

impl<E> Default for ListenerSet<E> {
    fn default() -> Self {
        Self {
            registry: Rc::new(Registry {
                entries: RefCell::new(Vec::new()),
            }),
        }
    }
}

impl<E> fmt::Debug for ListenerSet<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerSet")
            .field("len", &self.len())
            .finish()
    }
}

impl<E> ListenerSet<E> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of active listeners.
    #[must_use]
    pub fn len(&self) -> usize {
        self.registry
            .entries
            .borrow()
            .iter()
            .filter_map(Weak::upgrade)
            .filter(|entry| entry.active.get())
            .count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Deactivate and drop every listener. Outstanding [`Subscription`]s
    /// become inert.
    pub fn clear(&self) {
        let entries = std::mem::take(&mut *self.registry.entries.borrow_mut());
        for entry in entries.iter().filter_map(Weak::upgrade) {
            entry.active.set(false);
        }
    }
}

impl<E: 'static> ListenerSet<E> {
    /// Register `callback`. It stays registered until the returned
    /// [`Subscription`] is unsubscribed or dropped.
    #[must_use = "dropping the Subscription unsubscribes immediately"]
    pub fn subscribe(&self, callback: impl Fn(&E) + 'static) -> Subscription {
        let entry = Rc::new(ListenerEntry {
            active: Cell::new(true),
            callback: Box::new(callback),
        });
        self.registry
            .entries
            .borrow_mut()
            .push(Rc::downgrade(&entry));
        Subscription {
            handle: Some(Box::new(Handle {
                entry,
                registry: Rc::downgrade(&self.registry),
            })),
        }
    }

    /// Invoke every active listener with `event`. Returns how many ran.
    pub fn notify(&self, event: &E) -> usize {
        let snapshot: Vec<Rc<ListenerEntry<E>>> = {
            let mut entries = self.registry.entries.borrow_mut();
            entries.retain(|weak| weak.strong_count() > 0);
            entries.iter().filter_map(Weak::upgrade).collect()
        };

        let mut delivered = 0;
        for entry in &snapshot {
            if entry.active.get() {
                (entry.callback)(event);
                delivered += 1;
            }
        }
        delivered
    }
}

trait Detach {
    fn detach(&self);
    fn is_active(&self) -> bool;
}

struct Handle<E> {
    entry: Rc<ListenerEntry<E>>,
    registry: Weak<Registry<E>>,
}

impl<E> Detach for Handle<E> {
    fn detach(&self) {
        if !self.entry.active.replace(false) {
            return;
        }
        if let Some(registry) = self.registry.upgrade() {
            let target = Rc::as_ptr(&self.entry);
            registry
                .entries
                .borrow_mut()
                .retain(|weak| weak.strong_count() > 0 && !std::ptr::eq(weak.as_ptr(), target));
        }
    }

    fn is_active(&self) -> bool {
        self.entry.active.get()
    }
}

/// RAII guard for a registered listener.
///
/// Dropping the guard unsubscribes. [`unsubscribe`](Self::unsubscribe) does
/// the same without consuming the guard and may be called any number of
/// times.
pub struct Subscription {
    handle: Option<Box<dyn Detach>>,
}

impl Subscription {
    /// A subscription that was never attached to anything. Returned when
    /// subscribing to a torn-down store.
    #[must_use]
    pub fn inert() -> Self {
        Self { handle: None }
    }

    pub fn unsubscribe(&self) {
        if let Some(handle) = &self.handle {
            handle.detach();
        }
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| h.is_active())
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.is_active())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recorder() -> (Rc<RefCell<Vec<String>>>, impl Fn(&str) -> Box<dyn Fn(&u32)>) {
        let log = Rc::new(RefCell::new(Vec::new()));
        let log_for = Rc::clone(&log);
        let make = move |name: &str| -> Box<dyn Fn(&u32)> {
            let log = Rc::clone(&log_for);
            let name = name.to_string();
            Box::new(move |v: &u32| log.borrow_mut().push(format!("{name}:{v}")))
        };
        (log, make)
    }

    #[test]
    fn notifies_in_registration_order() {
        let set = ListenerSet::<u32>::new();
        let (log, make) = recorder();
        let a = make("a");
        let b = make("b");
        let c = make("c");
        let _s1 = set.subscribe(move |v| a(v));
        let _s2 = set.subscribe(move |v| b(v));
        let _s3 = set.subscribe(move |v| c(v));

        assert_eq!(set.notify(&7), 3);
        assert_eq!(*log.borrow(), vec!["a:7", "b:7", "c:7"]);
    }

    #[test]
    fn drop_unsubscribes() {
        let set = ListenerSet::<u32>::new();
        let hits = Rc::new(Cell::new(0));
        let h = Rc::clone(&hits);
        let sub = set.subscribe(move |_| h.set(h.get() + 1));
        assert_eq!(set.len(), 1);

        drop(sub);
        assert_eq!(set.len(), 0);
        assert_eq!(set.notify(&1), 0);
        assert_eq!(hits.get(), 0);
    }

    #[test]
    fn unsubscribe_twice_leaves_others_alone() {
        let set = ListenerSet::<u32>::new();
        let (log, make) = recorder();
        let a = make("a");
        let b = make("b");
        let first = set.subscribe(move |v| a(v));
        let _second = set.subscribe(move |v| b(v));

        first.unsubscribe();
        first.unsubscribe();
        assert!(!first.is_active());
        assert_eq!(set.len(), 1);

        set.notify(&2);
        assert_eq!(*log.borrow(), vec!["b:2"]);
    }

    #[test]
    fn subscribe_during_notify_waits_for_next_round() {
        let set = Rc::new(ListenerSet::<u32>::new());
        let late_hits = Rc::new(Cell::new(0));
        let parked: Rc<RefCell<Vec<Subscription>>> = Rc::new(RefCell::new(Vec::new()));

        let set_in = Rc::clone(&set);
        let hits_in = Rc::clone(&late_hits);
        let parked_in = Rc::clone(&parked);
        let _outer = set.subscribe(move |_| {
            if parked_in.borrow().is_empty() {
                let hits = Rc::clone(&hits_in);
                let sub = set_in.subscribe(move |_| hits.set(hits.get() + 1));
                parked_in.borrow_mut().push(sub);
            }
        });

        assert_eq!(set.notify(&1), 1);
        assert_eq!(late_hits.get(), 0);

        assert_eq!(set.notify(&2), 2);
        assert_eq!(late_hits.get(), 1);
    }

    #[test]
    fn self_unsubscribe_during_notify() {
        let set = ListenerSet::<u32>::new();
        let slot: Rc<RefCell<Option<Subscription>>> = Rc::new(RefCell::new(None));
        let hits = Rc::new(Cell::new(0));

        let slot_in = Rc::clone(&slot);
        let hits_in = Rc::clone(&hits);
        let sub = set.subscribe(move |_| {
            hits_in.set(hits_in.get() + 1);
            if let Some(me) = slot_in.borrow().as_ref() {
                me.unsubscribe();
            }
        });
        *slot.borrow_mut() = Some(sub);
        let (log, make) = recorder();
        let after = make("after");
        let _after = set.subscribe(move |v| after(v));

        assert_eq!(set.notify(&1), 2);
        assert_eq!(set.notify(&2), 1);
        assert_eq!(hits.get(), 1);
        assert_eq!(*log.borrow(), vec!["after:1", "after:2"]);
    }

    #[test]
    fn listener_removed_mid_notify_is_skipped() {
        let set = ListenerSet::<u32>::new();
        let victim: Rc<RefCell<Option<Subscription>>> = Rc::new(RefCell::new(None));

        let victim_in = Rc::clone(&victim);
        let _killer = set.subscribe(move |_| {
            if let Some(sub) = victim_in.borrow().as_ref() {
                sub.unsubscribe();
            }
        });
        let hits = Rc::new(Cell::new(0));
        let h = Rc::clone(&hits);
        *victim.borrow_mut() = Some(set.subscribe(move |_| h.set(h.get() + 1)));

        assert_eq!(set.notify(&1), 1);
        assert_eq!(hits.get(), 0);
    }

    #[test]
    fn clear_makes_subscriptions_inert() {
        let set = ListenerSet::<u32>::new();
        let sub = set.subscribe(|_| {});
        set.clear();
        assert!(!sub.is_active());
        assert!(set.is_empty());
        sub.unsubscribe();
        drop(sub);
    }

    #[test]
    fn inert_subscription() {
        let sub = Subscription::inert();
        assert!(!sub.is_active());
        sub.unsubscribe();
    }

    #[test]
    fn subscription_outlives_set() {
        let sub = {
            let set = ListenerSet::<u32>::new();
            set.subscribe(|_| {})
        };
        assert!(sub.is_active());
        sub.unsubscribe();
        assert!(!sub.is_active());
    }
}
