#![forbid(unsafe_code)]

//! Granular key-subscription stores.
//!
//! This module provides the change-tracking primitives consumers render from:
//!
//! - [`Store`]: a shared set of named fields. Every applied write notifies
//!   its listeners with a [`FieldChange`].
//! - [`View`]: a consumer's accessor onto a store that records which fields
//!   the consumer read.
//! - [`create`] / [`UseStore`]: the instance factory. Each call yields one
//!   independent store and an accessor that binds consumers to it.
//! - [`Provider`] / [`use_scoped_store`]: stores scoped to a subtree and
//!   found by ambient lookup.
//! - [`Observable`] and [`Computed`]: single values and memoized derivations.
//! - [`Subscription`]: RAII guard that unsubscribes on drop.
//!
//! # Architecture
//!
//! Everything is `Rc`-based and single-threaded. Listeners live in a
//! [`ListenerSet`] behind weak handles and are pruned lazily during
//! notification.
//!
//! A consumer bound to a store owns one listener. The listener fires for every
//! write but requests a re-render only when the written key is in that
//! consumer's tracked set.
//!
//! # Invariants
//!
//! 1. A write to key `k` requests a re-render of exactly the mounted
//!    consumers that read `k` (under the store's tracking mode).
//! 2. Listeners are notified in registration order, before the write returns.
//! 3. Dropping a [`Subscription`] removes the callback before the next
//!    notification cycle.
//! 4. `Computed::get()` never returns a stale value.

pub mod computed;
pub mod factory;
pub mod listeners;
pub mod observable;
pub mod provider;
pub mod store;
pub mod view;

pub use computed::Computed;
pub use factory::{LazyStore, UseStore, create, create_with_config};
pub use listeners::{ListenerSet, Subscription};
pub use observable::Observable;
pub use provider::{Provider, use_scoped_store};
pub use store::{FieldChange, Store, StoreId, WeakStore};
pub use view::View;
