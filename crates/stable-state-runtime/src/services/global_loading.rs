#![forbid(unsafe_code)]

//! Application-wide loading flag.
//!
//! [`GlobalLoading`] wraps one [`Observable<bool>`]. Setting the flag to its
//! current value notifies nobody. [`GlobalLoading::shared`] returns the
//! thread's single instance; [`use_global_loading`] reads it from a render
//! pass and re-renders the consumer whenever it flips.

use std::fmt;

use crate::consumer::RenderCx;
use crate::reactive::{Observable, Subscription};

thread_local! {
    static SHARED: GlobalLoading = GlobalLoading::new();
}

/// Loading flag with change notification. Cloning shares the flag.
#[derive(Clone)]
pub struct GlobalLoading {
    state: Observable<bool>,
}

impl fmt::Debug for GlobalLoading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GlobalLoading")
            .field("loading", &self.is_loading())
            .field("subscribers", &self.state.subscriber_count())
            .finish()
    }
}

impl Default for GlobalLoading {
    fn default() -> Self {
        Self::new()
    }
}

impl GlobalLoading {
    /// A fresh, independent flag, initially not loading.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Observable::new(false),
        }
    }

    /// The instance shared by everything on this thread.
    #[must_use]
    pub fn shared() -> Self {
        SHARED.with(Clone::clone)
    }

    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.state.get()
    }

    /// Returns whether the flag changed.
    pub fn set_loading(&self, loading: bool) -> bool {
        let changed = self.state.set(loading);
        if changed {
            tracing::debug!(loading, "global loading changed");
        }
        changed
    }

    #[must_use = "dropping the Subscription unsubscribes immediately"]
    pub fn subscribe(&self, listener: impl Fn(bool) + 'static) -> Subscription {
        self.state.subscribe(move |loading| listener(*loading))
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.state.subscriber_count()
    }

    /// Read the flag from a render pass, subscribing the consumer on its
    /// first render.
    pub fn use_loading(&self, cx: &mut RenderCx<'_>) -> LoadingHandle {
        let service = self.clone();
        let _subscription = cx.use_slot(move |consumer| {
            let target = consumer.downgrade();
            service.subscribe(move |_| {
                if let Some(consumer) = target.upgrade() {
                    consumer.request_render();
                }
            })
        });
        LoadingHandle {
            is_loading: self.is_loading(),
            service: self.clone(),
        }
    }
}

/// What a consumer sees of the loading flag during one render.
#[derive(Debug, Clone)]
pub struct LoadingHandle {
    pub is_loading: bool,
    service: GlobalLoading,
}

impl LoadingHandle {
    pub fn set_loading(&self, loading: bool) -> bool {
        self.service.set_loading(loading)
    }
}

/// [`GlobalLoading::use_loading`] on the shared instance.
pub fn use_global_loading(cx: &mut RenderCx<'_>) -> LoadingHandle {
    GlobalLoading::shared().use_loading(cx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consumer::Consumer;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn equal_value_does_not_notify() {
        let loading = GlobalLoading::new();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let s = Rc::clone(&seen);
        let _sub = loading.subscribe(move |v| s.borrow_mut().push(v));

        assert!(!loading.set_loading(false));
        assert!(loading.set_loading(true));
        assert!(!loading.set_loading(true));
        assert!(loading.set_loading(false));
        assert_eq!(*seen.borrow(), vec![true, false]);
    }

    #[test]
    fn shared_is_one_instance_per_thread() {
        let a = GlobalLoading::shared();
        let b = GlobalLoading::shared();
        a.set_loading(true);
        assert!(b.is_loading());
        b.set_loading(false);
    }

    #[test]
    fn consumer_rerenders_on_flip() {
        let loading = GlobalLoading::new();
        let spinner = Consumer::new("spinner");

        for _ in 0..2 {
            let shown = spinner.render(|cx| loading.use_loading(cx).is_loading);
            assert!(!shown);
        }
        assert_eq!(loading.subscriber_count(), 1);

        let handle = spinner.render(|cx| loading.use_loading(cx));
        handle.set_loading(true);
        assert_eq!(spinner.render_requests(), 1);

        assert!(spinner.render(|cx| loading.use_loading(cx).is_loading));
        handle.set_loading(true);
        assert_eq!(spinner.render_requests(), 1);
    }

    #[test]
    fn unmount_unsubscribes() {
        let loading = GlobalLoading::new();
        let spinner = Consumer::new("spinner");
        spinner.render(|cx| {
            let _ = loading.use_loading(cx);
        });
        spinner.unmount();
        assert_eq!(loading.subscriber_count(), 0);
    }

    #[test]
    fn free_hook_uses_shared_instance() {
        let spinner = Consumer::new("spinner");
        let handle = spinner.render(use_global_loading);
        assert!(!handle.is_loading);
        handle.set_loading(true);
        assert!(GlobalLoading::shared().is_loading());
        assert_eq!(spinner.render_requests(), 1);
        GlobalLoading::shared().set_loading(false);
    }
}
