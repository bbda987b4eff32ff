#![forbid(unsafe_code)]

//! Consumer instances: the minimal component model stores bind to.
//!
//! A [`Consumer`] stands for one mounted UI component instance. It provides
//! exactly what a granular store needs from a UI framework:
//!
//! - **Render passes**: [`Consumer::render`] runs a closure with a
//!   [`RenderCx`] and counts the pass.
//! - **Hook slots**: [`RenderCx::use_slot`] memoizes per-instance state by
//!   call order, so a store binding is created once and reused on every
//!   render.
//! - **Re-render requests**: [`Consumer::request_render`] flags the consumer
//!   dirty and enqueues it on its [`RenderQueue`], once per pending render.
//! - **Teardown**: [`Consumer::unmount`] runs unmount callbacks and drops all
//!   slots, which drops every store subscription the consumer held.
//! - **Tree position**: the ambient context (enclosing providers) seen on the
//!   first render is captured and reinstalled on every later render, so a
//!   re-render driven from a queue sees the same providers.
//!
//! # Invariants
//!
//! 1. `render_count` increments exactly once per `render` call.
//! 2. A consumer is rendered at most once per queue flush round, and a
//!    direct render retires any request still sitting in the queue.
//! 3. Requests on an unmounted consumer are ignored.
//!
//! # Failure Modes
//!
//! A first render that fails to bind a scoped store (see
//! [`RenderCx::abandon_mount`]) leaves the consumer unmounted with no
//! captured position, so a later render under a provider mounts it there.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use ahash::AHashSet;

use crate::context::{self, ContextSnapshot};

static NEXT_CONSUMER_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConsumerId(u64);

impl ConsumerId {
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConsumerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "consumer#{}", self.0)
    }
}

type Cleanup = Box<dyn FnOnce()>;

struct ConsumerInner {
    id: ConsumerId,
    /// Label used in logs and reports.
    name: String,
    /// True from the first render that is not abandoned until `unmount`.
    mounted: Cell<bool>,
    /// Completed render passes, including abandoned first renders.
    renders: Cell<u64>,
    /// Every accepted `request_render` call.
    render_requests: Cell<u64>,
    /// A render was requested and has not happened yet.
    pending: Cell<bool>,
    /// Set during a first render that must not mount the consumer.
    abandoned: Cell<bool>,
    /// Where re-render requests go. `None` only counts them.
    queue: Option<RenderQueue>,
    /// Hook state in call order.
    slots: RefCell<Vec<Rc<dyn Any>>>,
    /// Unmount callbacks in registration order.
    cleanups: RefCell<Vec<Cleanup>>,
    /// Providers captured on the first render.
    ambient: RefCell<Option<ContextSnapshot>>,
}

impl ConsumerInner {
    fn run_cleanups(&self) {
        let cleanups = std::mem::take(&mut *self.cleanups.borrow_mut());
        for cleanup in cleanups.into_iter().rev() {
            cleanup();
        }
    }

    /// Run cleanups and drop every slot and the captured position. Returns
    /// the number of slots released.
    fn release(&self) -> usize {
        self.run_cleanups();
        let slots = std::mem::take(&mut *self.slots.borrow_mut());
        let released = slots.len();
        drop(slots);
        self.ambient.borrow_mut().take();
        self.pending.set(false);
        released
    }
}

impl Drop for ConsumerInner {
    fn drop(&mut self) {
        if self.mounted.get() {
            self.run_cleanups();
        }
    }
}

/// A component instance. Cloning shares the instance.
#[derive(Clone)]
pub struct Consumer {
    inner: Rc<ConsumerInner>,
}

impl fmt::Debug for Consumer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Consumer")
            .field("id", &self.inner.id)
            .field("name", &self.inner.name)
            .field("mounted", &self.inner.mounted.get())
            .field("renders", &self.inner.renders.get())
            .field("render_requests", &self.inner.render_requests.get())
            .finish()
    }
}

impl Consumer {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self::build(name.into(), None)
    }

    /// A consumer whose re-render requests are pushed onto `queue`.
    #[must_use]
    pub fn with_queue(name: impl Into<String>, queue: &RenderQueue) -> Self {
        Self::build(name.into(), Some(queue.clone()))
    }

    fn build(name: String, queue: Option<RenderQueue>) -> Self {
        Self {
            inner: Rc::new(ConsumerInner {
                id: ConsumerId(NEXT_CONSUMER_ID.fetch_add(1, Ordering::Relaxed)),
                name,
                mounted: Cell::new(false),
                renders: Cell::new(0),
                render_requests: Cell::new(0),
                pending: Cell::new(false),
                abandoned: Cell::new(false),
                queue,
                slots: RefCell::new(Vec::new()),
                cleanups: RefCell::new(Vec::new()),
                ambient: RefCell::new(None),
            }),
        }
    }

    #[must_use]
    pub fn id(&self) -> ConsumerId {
        self.inner.id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    #[must_use]
    pub fn is_mounted(&self) -> bool {
        self.inner.mounted.get()
    }

    /// Completed render passes.
    #[must_use]
    pub fn render_count(&self) -> u64 {
        self.inner.renders.get()
    }

    /// Re-render requests received while mounted, including ones coalesced
    /// into an already pending render.
    #[must_use]
    pub fn render_requests(&self) -> u64 {
        self.inner.render_requests.get()
    }

    /// Whether a re-render was requested since the last render.
    #[must_use]
    pub fn needs_render(&self) -> bool {
        self.inner.pending.get()
    }

    #[must_use]
    pub fn downgrade(&self) -> WeakConsumer {
        WeakConsumer {
            inner: Rc::downgrade(&self.inner),
        }
    }

    /// Run one render pass.
    ///
    /// The first render mounts the consumer and captures the current ambient
    /// context as its tree position; every render runs with that context
    /// installed. A first render abandoned through
    /// [`RenderCx::abandon_mount`] leaves the consumer unmounted.
    pub fn render<R>(&self, body: impl FnOnce(&mut RenderCx<'_>) -> R) -> R {
        let snapshot = self
            .inner
            .ambient
            .borrow_mut()
            .get_or_insert_with(context::capture)
            .clone();

        let first = !self.inner.mounted.replace(true);
        self.inner.abandoned.set(false);
        self.inner.pending.set(false);
        let pass = self.inner.renders.get() + 1;
        self.inner.renders.set(pass);
        tracing::trace!(consumer = %self.inner.id, pass, "render pass");

        let out = context::with_snapshot(&snapshot, || {
            let mut cx = RenderCx {
                consumer: self,
                cursor: 0,
                first,
            };
            body(&mut cx)
        });

        if first {
            if self.inner.abandoned.replace(false) {
                self.inner.mounted.set(false);
                let released = self.inner.release();
                tracing::debug!(consumer = %self.inner.id, name = %self.inner.name, released, "consumer mount abandoned");
            } else {
                tracing::debug!(consumer = %self.inner.id, name = %self.inner.name, "consumer mounted");
            }
        }
        out
    }

    /// Ask for a re-render. Returns `false` if the consumer is unmounted.
    pub fn request_render(&self) -> bool {
        if !self.inner.mounted.get() {
            return false;
        }
        self.inner
            .render_requests
            .set(self.inner.render_requests.get() + 1);
        if !self.inner.pending.replace(true) {
            if let Some(queue) = &self.inner.queue {
                queue.push(self.downgrade());
            }
        }
        true
    }

    /// Tear the instance down: run unmount callbacks (newest first), then
    /// drop every hook slot. Idempotent.
    pub fn unmount(&self) {
        if !self.inner.mounted.replace(false) {
            return;
        }
        let released = self.inner.release();
        tracing::debug!(consumer = %self.inner.id, name = %self.inner.name, released, "consumer unmounted");
    }
}

/// Non-owning consumer handle, held by store listeners.
#[derive(Clone)]
pub struct WeakConsumer {
    inner: Weak<ConsumerInner>,
}

impl WeakConsumer {
    #[must_use]
    pub fn upgrade(&self) -> Option<Consumer> {
        self.inner.upgrade().map(|inner| Consumer { inner })
    }
}

impl fmt::Debug for WeakConsumer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakConsumer")
            .field("alive", &(self.inner.strong_count() > 0))
            .finish()
    }
}

/// Per-pass render context handed to [`Consumer::render`] bodies.
pub struct RenderCx<'a> {
    consumer: &'a Consumer,
    cursor: usize,
    first: bool,
}

impl RenderCx<'_> {
    #[must_use]
    pub fn consumer(&self) -> &Consumer {
        self.consumer
    }

    /// Whether this pass is the one that mounts the consumer.
    #[must_use]
    pub fn is_first_render(&self) -> bool {
        self.first
    }

    /// Undo the mount when this first render ends: slots are dropped and the
    /// captured position is forgotten. No effect on later renders.
    pub fn abandon_mount(&mut self) {
        if self.first {
            self.consumer.inner.abandoned.set(true);
        }
    }

    /// Per-instance state, created by `init` on first render and returned
    /// unchanged on every later render that calls hooks in the same order.
    ///
    /// # Panics
    ///
    /// Panics if the slot at this position holds a different type, which
    /// means hooks were called in a different order than on a previous
    /// render.
    pub fn use_slot<T: 'static>(&mut self, init: impl FnOnce(&Consumer) -> T) -> Rc<T> {
        let index = self.cursor;
        self.cursor += 1;

        let existing = self.consumer.inner.slots.borrow().get(index).cloned();
        if let Some(slot) = existing {
            return match slot.downcast::<T>() {
                Ok(value) => value,
                Err(_) => panic!(
                    "hook order changed in consumer `{}`: slot {index} holds a different type",
                    self.consumer.inner.name
                ),
            };
        }

        let value = Rc::new(init(self.consumer));
        let erased: Rc<dyn Any> = value.clone();
        self.consumer.inner.slots.borrow_mut().push(erased);
        value
    }

    /// Register `cleanup` to run when the consumer unmounts. Only the call
    /// made on the first render registers; later renders reuse it.
    pub fn on_unmount(&mut self, cleanup: impl FnOnce() + 'static) {
        let registered = self.use_slot(|_| Cell::new(false));
        if !registered.replace(true) {
            self.consumer
                .inner
                .cleanups
                .borrow_mut()
                .push(Box::new(cleanup));
        }
    }
}

/// FIFO of consumers awaiting a re-render. Cloning shares the queue.
#[derive(Clone, Default)]
pub struct RenderQueue {
    pending: Rc<RefCell<VecDeque<WeakConsumer>>>,
}

impl fmt::Debug for RenderQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderQueue")
            .field("len", &self.len())
            .finish()
    }
}

impl RenderQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, consumer: WeakConsumer) {
        self.pending.borrow_mut().push_back(consumer);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove and return queued consumers that are still mounted and still
    /// waiting for a render, in request order, each at most once.
    #[must_use]
    pub fn drain(&self) -> Vec<Consumer> {
        let drained: Vec<WeakConsumer> = self.pending.borrow_mut().drain(..).collect();
        let mut seen = AHashSet::with_capacity(drained.len());
        drained
            .iter()
            .filter_map(WeakConsumer::upgrade)
            .filter(|c| c.is_mounted() && c.needs_render())
            .filter(|c| seen.insert(c.id()))
            .collect()
    }

    /// Drain repeatedly, handing each consumer to `render`, until no request
    /// remains. Returns the number of renders performed.
    pub fn flush(&self, mut render: impl FnMut(&Consumer)) -> usize {
        let mut rendered = 0;
        loop {
            let batch = self.drain();
            if batch.is_empty() {
                return rendered;
            }
            for consumer in &batch {
                render(consumer);
                rendered += 1;
            }
        }
    }
}
