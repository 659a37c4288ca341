// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// odie-pipeline — command line front end of the Odie document pipeline.
//
// Entry point. Initialises logging, loads the configuration and dispatches to
// the subcommand handlers.

mod cli;
mod commands;

use anyhow::{Context, Result};
use clap::Parser;

use cli::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = odie_core::config::load_config(&cli.config)
        .map_err(commands::report)
        .with_context(|| format!("loading {}", cli.config.display()))?;

    commands::run(cli.command, &config).await
}
