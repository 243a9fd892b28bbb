//! Operator-triggered stock audit.
//!
//! Prints the report as JSON on stdout and exits with status 2 when any item's
//! stored balance disagrees with its movement log.

mod cli;

use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;

use carestock_infra::store::SqliteStorage;
use carestock_infra::{ConsistencyChecker, CoreConfig};

use crate::cli::Cli;

const EXIT_INCONSISTENT: u8 = 2;

fn main() -> anyhow::Result<ExitCode> {
    carestock_observability::init();
    let cli = Cli::parse();

    let mut config = CoreConfig::from_env().context("invalid configuration")?;
    if let Some(url) = cli.database_url {
        config.database_url = url;
    }

    let storage = SqliteStorage::open(&config)
        .with_context(|| format!("failed to open {}", config.database_url))?;
    let report = ConsistencyChecker::new(storage)
        .audit(cli.item)
        .context("audit failed")?;

    let rendered = if cli.compact {
        serde_json::to_string(&report)?
    } else {
        serde_json::to_string_pretty(&report)?
    };
    println!("{rendered}");

    if report.is_consistent() {
        Ok(ExitCode::SUCCESS)
    } else {
        tracing::warn!(
            mismatched = report.mismatches().count(),
            "stock audit found mismatches"
        );
        Ok(ExitCode::from(EXIT_INCONSISTENT))
    }
}
