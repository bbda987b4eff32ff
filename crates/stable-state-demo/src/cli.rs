#![forbid(unsafe_code)]

//! Command-line argument parsing for the demo.
//!
//! Parses args manually (no external dependencies) to keep the binary lean.
//! Supports environment variable overrides via `STABLE_STATE_DEMO_*` prefix.

use std::env;
use std::fmt;
use std::process;
use std::str::FromStr;

use stable_state::prelude::core::logging::LogFormat;
use stable_state::{EqualityPolicy, StateError, TrackingMode};

const VERSION: &str = env!("CARGO_PKG_VERSION");

const HELP_TEXT: &str = "\
stable-state demo: replays the stable state experiment page

USAGE:
    stable-state-demo [OPTIONS]

OPTIONS:
    --scenario=NAME      What to replay: 'factory', 'provider', 'unstable', or 'all' (default: all)
    --equality=POLICY    Equal-value writes: 'always' or 'skip-unchanged' (default: always)
    --tracking=MODE      Tracked keys: 'per-render' or 'accumulate' (default: per-render)
    --log-format=FORMAT  Log output: 'pretty' or 'json' (default: pretty)
    --help, -h           Show this help message
    --version, -V        Show version

ENVIRONMENT VARIABLES:
    STABLE_STATE_DEMO_SCENARIO    Override --scenario
    STABLE_STATE_DEMO_EQUALITY    Override --equality
    STABLE_STATE_DEMO_TRACKING    Override --tracking
    STABLE_STATE_DEMO_LOG_FORMAT  Override --log-format
    STABLE_STATE_LOG              Log filter (EnvFilter syntax, default: info)";

/// Which half of the experiment page to replay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Scenario {
    /// Components bound through a `create` accessor.
    Factory,
    /// Components bound through the nearest provider.
    Provider,
    /// Components reading the whole value, re-rendered on every write.
    Unstable,
    #[default]
    All,
}

impl Scenario {
    #[must_use]
    pub fn includes(self, other: Scenario) -> bool {
        self == Self::All || self == other
    }
}

impl FromStr for Scenario {
    type Err = StateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "factory" | "create" => Ok(Self::Factory),
            "provider" | "context" => Ok(Self::Provider),
            "unstable" | "baseline" => Ok(Self::Unstable),
            "all" => Ok(Self::All),
            _ => Err(StateError::InvalidConfig {
                key: "scenario",
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Factory => "factory",
            Self::Provider => "provider",
            Self::Unstable => "unstable",
            Self::All => "all",
        })
    }
}

/// Parsed command-line options.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Opts {
    pub scenario: Scenario,
    pub equality: EqualityPolicy,
    pub tracking: TrackingMode,
    pub log_format: LogFormat,
}

/// Outcome of argument parsing.
#[derive(Debug, PartialEq, Eq)]
pub enum Command {
    Run(Opts),
    Help,
    Version,
}

impl Opts {
    /// Parse command-line arguments and environment variables, exiting on
    /// `--help`, `--version`, or invalid input.
    ///
    /// Environment variables take precedence over defaults but are overridden
    /// by explicit command-line flags.
    pub fn parse() -> Self {
        match Self::parse_from(env::args().skip(1), |key| env::var(key).ok()) {
            Ok(Command::Run(opts)) => opts,
            Ok(Command::Help) => {
                println!("{HELP_TEXT}");
                process::exit(0);
            }
            Ok(Command::Version) => {
                println!("stable-state-demo {VERSION}");
                process::exit(0);
            }
            Err(message) => {
                eprintln!("{message}");
                eprintln!("Run with --help for usage information.");
                process::exit(1);
            }
        }
    }

    pub fn parse_from(
        args: impl IntoIterator<Item = String>,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Command, String> {
        let mut opts = Self::default();

        // Apply environment variable defaults first
        if let Some(val) = lookup("STABLE_STATE_DEMO_SCENARIO") {
            opts.scenario = parse_value(&val)?;
        }
        if let Some(val) = lookup("STABLE_STATE_DEMO_EQUALITY") {
            opts.equality = parse_value(&val)?;
        }
        if let Some(val) = lookup("STABLE_STATE_DEMO_TRACKING") {
            opts.tracking = parse_value(&val)?;
        }
        if let Some(val) = lookup("STABLE_STATE_DEMO_LOG_FORMAT") {
            opts.log_format = parse_value(&val)?;
        }

        // Parse command-line args (override env vars)
        for arg in args {
            match arg.as_str() {
                "--help" | "-h" => return Ok(Command::Help),
                "--version" | "-V" => return Ok(Command::Version),
                other => {
                    if let Some(val) = other.strip_prefix("--scenario=") {
                        opts.scenario = parse_value(val)?;
                    } else if let Some(val) = other.strip_prefix("--equality=") {
                        opts.equality = parse_value(val)?;
                    } else if let Some(val) = other.strip_prefix("--tracking=") {
                        opts.tracking = parse_value(val)?;
                    } else if let Some(val) = other.strip_prefix("--log-format=") {
                        opts.log_format = parse_value(val)?;
                    } else {
                        return Err(format!("Unknown argument: {other}"));
                    }
                }
            }
        }

        Ok(Command::Run(opts))
    }
}

fn parse_value<T: FromStr<Err = StateError>>(val: &str) -> Result<T, String> {
    val.parse().map_err(|err: StateError| err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn run(list: &[&str], env: &[(&str, &str)]) -> Result<Command, String> {
        let env: Vec<(String, String)> = env
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Opts::parse_from(args(list), move |key| {
            env.iter().find(|(k, _)| k == key).map(|(_, v)| v.clone())
        })
    }

    #[test]
    fn default_opts() {
        let opts = Opts::default();
        assert_eq!(opts.scenario, Scenario::All);
        assert_eq!(opts.equality, EqualityPolicy::AlwaysNotify);
        assert_eq!(opts.tracking, TrackingMode::PerRender);
        assert_eq!(opts.log_format, LogFormat::Pretty);
    }

    #[test]
    fn flags_parse() {
        let parsed = run(
            &["--scenario=provider", "--equality=skip-unchanged", "--tracking=accumulate"],
            &[],
        );
        assert_eq!(
            parsed,
            Ok(Command::Run(Opts {
                scenario: Scenario::Provider,
                equality: EqualityPolicy::SkipUnchanged,
                tracking: TrackingMode::Accumulate,
                log_format: LogFormat::Pretty,
            }))
        );
    }

    #[test]
    fn flags_override_env() {
        let parsed = run(
            &["--scenario=factory"],
            &[
                ("STABLE_STATE_DEMO_SCENARIO", "provider"),
                ("STABLE_STATE_DEMO_LOG_FORMAT", "json"),
            ],
        );
        let Ok(Command::Run(opts)) = parsed else {
            panic!("expected run, got {parsed:?}");
        };
        assert_eq!(opts.scenario, Scenario::Factory);
        assert_eq!(opts.log_format, LogFormat::Json);
    }

    #[test]
    fn help_and_version_short_circuit() {
        assert_eq!(run(&["-h", "--bogus"], &[]), Ok(Command::Help));
        assert_eq!(run(&["--version"], &[]), Ok(Command::Version));
    }

    #[test]
    fn invalid_values_are_reported() {
        let err = run(&["--equality=sometimes"], &[]).unwrap_err();
        assert!(err.contains("sometimes"));
        assert!(run(&["--frobnicate"], &[]).unwrap_err().contains("Unknown argument"));
        assert!(run(&[], &[("STABLE_STATE_DEMO_TRACKING", "never")]).is_err());
    }

    #[test]
    fn scenario_includes() {
        assert!(Scenario::All.includes(Scenario::Factory));
        assert!(Scenario::Provider.includes(Scenario::Provider));
        assert!(!Scenario::Factory.includes(Scenario::Provider));
        assert!(Scenario::All.includes(Scenario::Unstable));
        assert_eq!("baseline".parse::<Scenario>(), Ok(Scenario::Unstable));
        assert_eq!(Scenario::Unstable.to_string(), "unstable");
    }

    #[test]
    fn help_text_lists_env_overrides() {
        assert!(HELP_TEXT.contains("STABLE_STATE_DEMO_SCENARIO"));
        assert!(HELP_TEXT.contains("--tracking=MODE"));
        assert!(!VERSION.is_empty());
    }
}
