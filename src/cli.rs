use std::path::{Path, PathBuf};

mod filter;
mod info;
mod realizations;
mod terminal;

use clap::ArgAction;
use filter::Filter;
use info::Info;
use quake_ensemble::{Ensemble, JobConfig};
use realizations::Realizations;

#[derive(Debug, clap::Parser)]
#[command(version, about)]
pub struct Cli {
    /// Verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count, global=true)]
    verbose: u8,

    /// The path to the job configuration (TOML)
    ///
    /// Defaults are used when the file does not exist.
    #[arg(short, long, default_value = "job.toml", global = true)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

impl Cli {
    pub fn run(self) -> anyhow::Result<()> {
        Self::setup_logging(self.verbose);

        let config = load_config(&self.config)?;
        self.command.run(&config)
    }

    fn setup_logging(verbosity: u8) {
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

        let level = match verbosity {
            0 => tracing::Level::WARN,
            1 => tracing::Level::INFO,
            2 => tracing::Level::DEBUG,
            _ => tracing::Level::TRACE,
        };

        let filter = tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into());

        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_thread_names(false)
            .with_line_number(false);

        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer)
            .init();
    }
}

#[derive(Debug, clap::Parser)]
pub enum Command {
    /// Summarize the source models, their regions and rupture counts
    Info(Info),

    /// Enumerate or sample the logic-tree realizations
    ///
    /// Regions without ruptures are pruned before enumeration.
    Realizations(Realizations),

    /// Keep only the sources close to the sites of the ensemble
    Filter(Filter),
}

impl Command {
    fn run(self, config: &JobConfig) -> anyhow::Result<()> {
        match self {
            Self::Info(command) => command.run(config)?,
            Self::Realizations(command) => command.run(config)?,
            Self::Filter(command) => command.run(config)?,
        }
        Ok(())
    }
}

/// Output format shared by the subcommands.
#[derive(Debug, Clone, Copy, Default, clap::ValueEnum)]
enum OutputFormat {
    #[default]
    Table,
    Json,
}

fn load_config(path: &Path) -> anyhow::Result<JobConfig> {
    if path.exists() {
        JobConfig::load(path).map_err(|e| anyhow::anyhow!(e))
    } else {
        tracing::debug!(
            "No configuration at {}, using defaults",
            path.display()
        );
        Ok(JobConfig::default())
    }
}

/// Loads an ensemble and counts the ruptures of its sources.
fn load_ensemble(path: &Path, config: &JobConfig) -> anyhow::Result<Ensemble> {
    let mut ensemble = Ensemble::load(path)?;
    ensemble.count_ruptures(config);
    Ok(ensemble)
}
