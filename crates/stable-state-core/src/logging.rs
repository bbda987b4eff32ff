#![forbid(unsafe_code)]

//! Subscriber installation for binaries.
//!
//! Libraries in this workspace only emit `tracing` events; nothing is printed
//! until a binary calls [`init`]. The filter is read from `STABLE_STATE_LOG`
//! (standard `EnvFilter` syntax) and falls back to `info`.

use std::str::FromStr;

use tracing_subscriber::EnvFilter;

use crate::error::StateError;

pub const ENV_LOG: &str = "STABLE_STATE_LOG";

/// Output format for the installed subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    /// One JSON object per event, for postmortem analysis.
    Json,
}

impl FromStr for LogFormat {
    type Err = StateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" | "text" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            _ => Err(StateError::InvalidConfig {
                key: "log-format",
                value: s.to_string(),
            }),
        }
    }
}

/// Install a global subscriber. Returns `false` if one was already set.
pub fn init(format: LogFormat) -> bool {
    let filter = EnvFilter::try_from_env(ENV_LOG).unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    match format {
        LogFormat::Pretty => builder.try_init().is_ok(),
        LogFormat::Json => builder.json().try_init().is_ok(),
    }
}
