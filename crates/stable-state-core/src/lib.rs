#![forbid(unsafe_code)]

//! Core: errors, store configuration, JSON seeds, and logging setup.

pub mod config;
pub mod error;
#[cfg(feature = "tracing-json")]
pub mod logging;
pub mod seed;

pub use config::{EqualityPolicy, StoreConfig, TrackingMode};
pub use error::{Result, StateError};
pub use seed::{Value, fields_from_json};
