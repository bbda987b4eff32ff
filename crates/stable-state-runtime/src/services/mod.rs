#![forbid(unsafe_code)]

//! Shared services built on the reactive primitives.

pub mod global_loading;

pub use global_loading::{GlobalLoading, LoadingHandle, use_global_loading};
