//! CLI wiring for the schedtune developer toolkit.

use anyhow::Result;
use clap::Parser;
use schedtune_cli::Cli;

fn main() -> Result<()> {
    schedtune_cli::run_cli(Cli::parse())
}
