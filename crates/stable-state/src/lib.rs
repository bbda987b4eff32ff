#![forbid(unsafe_code)]

//! stable-state public facade crate.
//!
//! This crate provides the stable, ergonomic surface area for users.

pub use stable_state_runtime::{
    Computed, Consumer, EqualityPolicy, FieldChange, GlobalLoading, LazyStore, LoadingHandle,
    Observable, Provider, RenderCx, RenderQueue, Result, StateError, Store, StoreConfig, StoreId,
    Subscription, TrackingMode, UseStore, Value, View, create, create_with_config,
    fields_from_json, use_global_loading, use_scoped_store,
};

pub mod prelude {
    pub use stable_state_core as core;
    pub use stable_state_runtime as runtime;

    pub use stable_state_runtime::{
        Consumer, EqualityPolicy, Provider, RenderCx, RenderQueue, Result, StateError, StoreConfig,
        TrackingMode, UseStore, Value, View, create, create_with_config, use_global_loading,
        use_scoped_store,
    };
}
