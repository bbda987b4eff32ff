#![forbid(unsafe_code)]

//! Ambient provider lookup.
//!
//! A thread-local stack of frames, one per entered provider. Lookup walks the
//! stack from the top and returns the nearest store of the requested value
//! type, so an inner provider shadows an outer one for everything rendered
//! inside it.
//!
//! Frames hold [`WeakStore`]s: the stack never extends a provider's lifetime.
//!
//! [`ContextSnapshot`] captures the stack so a consumer can re-render later
//! with the providers that enclosed it at mount time.

use std::any::{Any, TypeId};
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::reactive::store::WeakStore;

#[derive(Clone)]
struct Frame {
    value_type: TypeId,
    store: Rc<dyn Any>,
}

thread_local! {
    static AMBIENT: RefCell<Vec<Frame>> = const { RefCell::new(Vec::new()) };
}

/// Frozen copy of the ambient stack.
#[derive(Clone, Default)]
pub struct ContextSnapshot {
    frames: Rc<Vec<Frame>>,
}

impl ContextSnapshot {
    #[must_use]
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

impl fmt::Debug for ContextSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextSnapshot")
            .field("depth", &self.depth())
            .finish()
    }
}

/// Capture the current ambient stack.
#[must_use]
pub fn capture() -> ContextSnapshot {
    AMBIENT.with(|stack| ContextSnapshot {
        frames: Rc::new(stack.borrow().clone()),
    })
}

/// Current stack depth.
#[must_use]
pub fn depth() -> usize {
    AMBIENT.with(|stack| stack.borrow().len())
}

/// Run `f` with `snapshot` as the ambient stack, restoring the previous stack
/// afterwards (also on unwind).
pub fn with_snapshot<R>(snapshot: &ContextSnapshot, f: impl FnOnce() -> R) -> R {
    let previous = AMBIENT.with(|stack| stack.replace(snapshot.frames.as_ref().clone()));
    let _restore = Restore {
        previous: Some(previous),
    };
    f()
}

struct Restore {
    previous: Option<Vec<Frame>>,
}

impl Drop for Restore {
    fn drop(&mut self) {
        if let Some(previous) = self.previous.take() {
            AMBIENT.with(|stack| *stack.borrow_mut() = previous);
        }
    }
}

/// Pops the frame pushed by [`enter`] when dropped.
#[must_use = "the provider scope ends when this guard is dropped"]
pub struct ScopeGuard {
    depth: usize,
}

impl Drop for ScopeGuard {
    fn drop(&mut self) {
        AMBIENT.with(|stack| stack.borrow_mut().truncate(self.depth));
    }
}

impl fmt::Debug for ScopeGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopeGuard").field("depth", &self.depth).finish()
    }
}

pub(crate) fn enter<V: 'static>(store: WeakStore<V>) -> ScopeGuard {
    AMBIENT.with(|stack| {
        let mut stack = stack.borrow_mut();
        let depth = stack.len();
        stack.push(Frame {
            value_type: TypeId::of::<V>(),
            store: Rc::new(store),
        });
        ScopeGuard { depth }
    })
}

/// Nearest enclosing store holding `V` values.
#[must_use]
pub fn lookup<V: 'static>() -> Option<WeakStore<V>> {
    AMBIENT.with(|stack| {
        stack
            .borrow()
            .iter()
            .rev()
            .filter(|frame| frame.value_type == TypeId::of::<V>())
            .find_map(|frame| frame.store.downcast_ref::<WeakStore<V>>().cloned())
    })
}
