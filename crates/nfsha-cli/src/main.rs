#![warn(missing_docs)]

//! `nfsha` binary: invoked once per cluster event by the cluster manager.

use anyhow::Result;
use clap::Parser;
use nfsha_cli::Cli;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env())
        .init();

    Cli::parse().run()
}
