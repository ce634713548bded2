use std::path::PathBuf;

use clap::Parser;
use quake_ensemble::{JobConfig, TrtModel};
use tracing::instrument;

use super::{OutputFormat, load_ensemble, terminal::Style};

#[derive(Debug, Parser)]
#[command(about = "Keep only the sources within range of the sites")]
pub struct Filter {
    /// The ensemble document (YAML)
    input: PathBuf,

    /// Output format (table, json)
    #[arg(long, value_name = "FORMAT", default_value = "table")]
    output: OutputFormat,

    /// Maximum source-site distance in km, overriding the configuration
    #[arg(long, value_name = "KM")]
    maximum_distance: Option<f64>,

    /// Print only the number of surviving sources per region model
    #[arg(long)]
    quiet: bool,
}

impl Filter {
    #[instrument(level = "debug", skip(self, config))]
    pub fn run(self, config: &JobConfig) -> anyhow::Result<()> {
        let mut ensemble = load_ensemble(&self.input, config)?;
        if ensemble.sites.is_empty() {
            anyhow::bail!("The ensemble {} defines no sites", self.input.display());
        }

        let maximum_distance = self.maximum_distance.unwrap_or(config.maximum_distance);
        let before: usize = ensemble.composite.trt_models().map(TrtModel::len).sum();
        ensemble.composite.filter_sources(
            &ensemble.sites,
            maximum_distance,
            config.filter_threshold,
        )?;
        let after: usize = ensemble.composite.trt_models().map(TrtModel::len).sum();
        tracing::info!("Kept {after} of {before} source(s) within {maximum_distance} km");

        match self.output {
            OutputFormat::Json => {
                use serde_json::json;

                let trt_models: Vec<_> = ensemble
                    .composite
                    .trt_models()
                    .map(|tm| {
                        let ids: Vec<_> = tm.iter().map(|source| source.id.as_str()).collect();
                        json!({ "id": tm.id(), "trt": tm.trt(), "sources": ids })
                    })
                    .collect();
                let output = json!({
                    "maximum_distance": maximum_distance,
                    "kept": after,
                    "total": before,
                    "trt_models": trt_models,
                });
                println!("{}", serde_json::to_string_pretty(&output)?);
            }
            OutputFormat::Table => {
                let style = Style::detect();
                for tm in ensemble.composite.trt_models() {
                    println!("{tm}");
                    if !self.quiet {
                        for source in tm {
                            println!("  {} {}", source.id, style.muted(&source.name));
                        }
                    }
                }
                println!(
                    "Sources within {maximum_distance} km: {}",
                    style.kept(after, before)
                );
            }
        }
        Ok(())
    }
}
