#![forbid(unsafe_code)]

//! Replays the stable state experiment page and prints per-component render
//! counts for the factory and provider variants and the unstable baseline.

mod cli;
mod page;

use std::process::ExitCode;

use stable_state::StoreConfig;
use stable_state::prelude::core::logging;

use cli::{Opts, Scenario};

fn main() -> ExitCode {
    let opts = Opts::parse();
    logging::init(opts.log_format);

    let config = StoreConfig::new()
        .with_equality(opts.equality)
        .with_tracking(opts.tracking);
    tracing::info!(
        scenario = %opts.scenario,
        equality = %config.equality,
        tracking = %config.tracking,
        "demo starting"
    );

    match run(opts.scenario, &config) {
        Ok(reports) => {
            for report in &reports {
                println!("{report}");
            }
            ExitCode::SUCCESS
        }
        Err(err) => {
            tracing::error!(%err, "demo failed");
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(scenario: Scenario, config: &StoreConfig) -> stable_state::Result<Vec<page::Report>> {
    let mut reports = Vec::new();
    if scenario.includes(Scenario::Factory) {
        reports.push(page::run_factory(config)?);
    }
    if scenario.includes(Scenario::Provider) {
        reports.push(page::run_provider(config)?);
    }
    if scenario.includes(Scenario::Unstable) {
        reports.push(page::run_unstable(config)?);
    }
    Ok(reports)
}
