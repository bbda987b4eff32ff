#![forbid(unsafe_code)]

use thiserror::Error;

pub type Result<T> = std::result::Result<T, StateError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StateError {
    /// An ambient accessor was called with no enclosing provider.
    #[error("{accessor} must be used within a Provider")]
    Configuration { accessor: &'static str },

    #[error("initial fields must be a JSON object, got {kind}")]
    InvalidSeed { kind: &'static str },

    #[error("invalid value for {key}: {value:?}")]
    InvalidConfig { key: &'static str, value: String },
}

impl StateError {
    #[must_use]
    pub fn configuration(accessor: &'static str) -> Self {
        Self::Configuration { accessor }
    }

    /// Whether this error indicates a missing wrapper rather than bad data.
    #[must_use]
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration { .. })
    }
}
