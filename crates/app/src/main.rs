mod cli;
mod tracker;

use anyhow::Context;
use clap::Parser;

use crate::{cli::Cli, tracker::TrackerConfig};

fn main() {
    if let Err(err) = run() {
        eprintln!("{err:?}");
        std::process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = TrackerConfig::try_from(cli.tracker).context("invalid tracker configuration")?;
    tracker::telemetry::init_tracing(config.verbose)?;
    tracker::run(config)
}
