#![forbid(unsafe_code)]

//! Runtime for granular key-subscription stores.
//!
//! # Role in stable-state
//! `stable-state-runtime` holds the moving parts: stores and their listener
//! sets, the consumer model stores bind to, ambient provider lookup, and the
//! shared services built on top of them.
//!
//! # How it fits in the system
//! Configuration and errors come from `stable-state-core`. A host UI maps its
//! component instances onto [`Consumer`]s, drains the [`RenderQueue`] after
//! each event, and re-renders whatever it yields.
//!
//! The runtime is single-threaded: every shared handle is `Rc`-based, so
//! stores, views and consumers cannot leave the thread that created them.

pub mod consumer;
pub mod context;
pub mod reactive;
pub mod services;

pub use consumer::{Consumer, ConsumerId, RenderCx, RenderQueue, WeakConsumer};
pub use reactive::{
    Computed, FieldChange, LazyStore, Observable, Provider, Store, StoreId, Subscription,
    UseStore, View, WeakStore, create, create_with_config, use_scoped_store,
};
pub use services::{GlobalLoading, LoadingHandle, use_global_loading};
pub use stable_state_core::{
    EqualityPolicy, Result, StateError, StoreConfig, TrackingMode, Value, fields_from_json,
};
