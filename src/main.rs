//! `qens`: inspect logic-tree ensembles of seismic source models.

use clap::Parser;

mod cli;

fn main() -> anyhow::Result<()> {
    cli::Cli::parse().run()
}
