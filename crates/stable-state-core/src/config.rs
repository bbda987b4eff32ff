#![forbid(unsafe_code)]

//! Store configuration.
//!
//! Two behaviors of the store are policy rather than mechanism, and each is
//! selected here instead of being hard-wired:
//!
//! - [`EqualityPolicy`]: whether a write of a value equal to the current one
//!   still notifies listeners.
//! - [`TrackingMode`]: whether a consumer's tracked keys are reset at the
//!   start of every render pass or accumulate for the consumer's lifetime.
//!
//! Defaults can be overridden from the environment with
//! [`StoreConfig::from_env`]:
//!
//! | Variable                | Values                          |
//! |-------------------------|---------------------------------|
//! | `STABLE_STATE_EQUALITY` | `always`, `skip-unchanged`      |
//! | `STABLE_STATE_TRACKING` | `per-render`, `accumulate`      |

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Result, StateError};

pub const ENV_EQUALITY: &str = "STABLE_STATE_EQUALITY";
pub const ENV_TRACKING: &str = "STABLE_STATE_TRACKING";

/// Whether writing an equal value notifies listeners.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EqualityPolicy {
    /// Every `set` notifies, even when the value is unchanged.
    #[default]
    #[serde(rename = "always")]
    AlwaysNotify,
    /// A `set` whose value equals the stored one is dropped entirely:
    /// no write, no version bump, no notification.
    SkipUnchanged,
}

impl EqualityPolicy {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AlwaysNotify => "always",
            Self::SkipUnchanged => "skip-unchanged",
        }
    }
}

impl fmt::Display for EqualityPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EqualityPolicy {
    type Err = StateError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "always" | "always-notify" => Ok(Self::AlwaysNotify),
            "skip-unchanged" | "skip" => Ok(Self::SkipUnchanged),
            _ => Err(StateError::InvalidConfig {
                key: ENV_EQUALITY,
                value: s.to_string(),
            }),
        }
    }
}

/// Lifetime of a consumer's tracked-key set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TrackingMode {
    /// Tracked keys are cleared when a render pass begins, so only keys read
    /// during the latest render cause re-renders.
    #[default]
    PerRender,
    /// Tracked keys are never cleared; a consumer stays subscribed to every
    /// key it has ever read.
    Accumulate,
}

impl TrackingMode {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PerRender => "per-render",
            Self::Accumulate => "accumulate",
        }
    }
}

impl fmt::Display for TrackingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TrackingMode {
    type Err = StateError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "per-render" | "reset" => Ok(Self::PerRender),
            "accumulate" => Ok(Self::Accumulate),
            _ => Err(StateError::InvalidConfig {
                key: ENV_TRACKING,
                value: s.to_string(),
            }),
        }
    }
}

/// Per-store configuration.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub equality: EqualityPolicy,
    pub tracking: TrackingMode,
    /// Name used in log output. Purely diagnostic.
    pub label: Option<String>,
}

impl StoreConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_equality(mut self, equality: EqualityPolicy) -> Self {
        self.equality = equality;
        self
    }

    #[must_use]
    pub fn with_tracking(mut self, tracking: TrackingMode) -> Self {
        self.tracking = tracking;
        self
    }

    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Label for log fields, `"anonymous"` when unset.
    #[must_use]
    pub fn label_or_default(&self) -> &str {
        self.label.as_deref().unwrap_or("anonymous")
    }

    /// Defaults overridden by `STABLE_STATE_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`from_env`](Self::from_env) with an explicit variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();
        if let Some(raw) = lookup(ENV_EQUALITY) {
            config.equality = raw.parse()?;
        }
        if let Some(raw) = lookup(ENV_TRACKING) {
            config.tracking = raw.parse()?;
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults() {
        let config = StoreConfig::default();
        assert_eq!(config.equality, EqualityPolicy::AlwaysNotify);
        assert_eq!(config.tracking, TrackingMode::PerRender);
        assert_eq!(config.label_or_default(), "anonymous");
    }

    #[test]
    fn builder_chain() {
        let config = StoreConfig::new()
            .with_equality(EqualityPolicy::SkipUnchanged)
            .with_tracking(TrackingMode::Accumulate)
            .with_label("profile");
        assert_eq!(config.equality, EqualityPolicy::SkipUnchanged);
        assert_eq!(config.tracking, TrackingMode::Accumulate);
        assert_eq!(config.label_or_default(), "profile");
    }

    #[test]
    fn parse_is_case_insensitive_and_trims() {
        assert_eq!(
            " Skip-Unchanged ".parse::<EqualityPolicy>().unwrap(),
            EqualityPolicy::SkipUnchanged
        );
        assert_eq!(
            "ACCUMULATE".parse::<TrackingMode>().unwrap(),
            TrackingMode::Accumulate
        );
    }

    #[test]
    fn display_round_trips_through_parse() {
        for policy in [EqualityPolicy::AlwaysNotify, EqualityPolicy::SkipUnchanged] {
            assert_eq!(policy.to_string().parse::<EqualityPolicy>().unwrap(), policy);
        }
        for mode in [TrackingMode::PerRender, TrackingMode::Accumulate] {
            assert_eq!(mode.to_string().parse::<TrackingMode>().unwrap(), mode);
        }
    }

    #[test]
    fn lookup_overrides_defaults() {
        let config = StoreConfig::from_lookup(lookup_from(&[
            (ENV_EQUALITY, "skip-unchanged"),
            (ENV_TRACKING, "accumulate"),
        ]))
        .unwrap();
        assert_eq!(config.equality, EqualityPolicy::SkipUnchanged);
        assert_eq!(config.tracking, TrackingMode::Accumulate);
    }

    #[test]
    fn lookup_without_variables_is_default() {
        let config = StoreConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config, StoreConfig::default());
    }

    #[test]
    fn deserializes_partial_json() {
        let config: StoreConfig =
            serde_json::from_str(r#"{"equality":"skip-unchanged","label":"cart"}"#).unwrap();
        assert_eq!(config.equality, EqualityPolicy::SkipUnchanged);
        assert_eq!(config.tracking, TrackingMode::PerRender);
        assert_eq!(config.label.as_deref(), Some("cart"));

        let json = serde_json::to_string(&StoreConfig::default()).unwrap();
        assert!(json.contains(r#""equality":"always""#));
        assert!(json.contains(r#""tracking":"per-render""#));
    }

    #[test]
    fn bad_value_names_variable() {
        let err = StoreConfig::from_lookup(lookup_from(&[(ENV_TRACKING, "forever")])).unwrap_err();
        assert_eq!(
            err,
            StateError::InvalidConfig {
                key: ENV_TRACKING,
                value: "forever".into(),
            }
        );
    }
}
