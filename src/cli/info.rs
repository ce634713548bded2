use std::path::PathBuf;

use clap::Parser;
use quake_ensemble::{CompositeSourceModel, JobConfig};
use tracing::instrument;

use super::{OutputFormat, load_ensemble, terminal::Style};

#[derive(Debug, Parser)]
#[command(about = "Show source models, regions and rupture counts")]
pub struct Info {
    /// The ensemble document (YAML)
    input: PathBuf,

    /// Output format (table, json)
    #[arg(long, value_name = "FORMAT", default_value = "table")]
    output: OutputFormat,
}

impl Info {
    #[instrument(level = "debug", skip(self, config))]
    pub fn run(self, config: &JobConfig) -> anyhow::Result<()> {
        let ensemble = load_ensemble(&self.input, config)?;
        match self.output {
            OutputFormat::Json => Self::output_json(&ensemble.composite)?,
            OutputFormat::Table => Self::output_table(&ensemble.composite),
        }
        Ok(())
    }

    fn output_json(composite: &CompositeSourceModel) -> anyhow::Result<()> {
        use serde_json::json;

        let source_models: Vec<_> = composite
            .iter()
            .map(|source_model| {
                let trt_models: Vec<_> = source_model
                    .trt_models
                    .iter()
                    .map(|tm| {
                        json!({
                            "id": tm.id(),
                            "trt": tm.trt(),
                            "sources": tm.len(),
                            "ruptures": tm.num_ruptures(),
                            "min_mag": tm.min_mag(),
                            "max_mag": tm.max_mag(),
                        })
                    })
                    .collect();
                json!({
                    "ordinal": source_model.ordinal,
                    "name": source_model.name,
                    "path": source_model.path,
                    "weight": source_model.weight,
                    "gsim_paths": source_model.gsim_lt.num_paths(),
                    "trt_models": trt_models,
                })
            })
            .collect();

        let output = json!({
            "source_models": source_models,
            "independent_realizations": composite.num_independent_realizations(),
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        Ok(())
    }

    fn output_table(composite: &CompositeSourceModel) {
        let style = Style::detect();
        for source_model in composite {
            println!(
                "{} {} [{}] weight={}",
                style.heading(&format!("#{}", source_model.ordinal)),
                source_model.name,
                source_model.path.join("_"),
                style.weight(source_model.weight, 0)
            );
            if source_model.trt_models.is_empty() {
                println!("  {}", style.warning("no sources"));
            }
            for tm in &source_model.trt_models {
                if style.is_narrow() {
                    println!("  {tm}");
                    println!("    ruptures: {}", tm.num_ruptures());
                } else {
                    println!(
                        "  {:<50} {:>10} ruptures  {}",
                        tm.to_string(),
                        tm.num_ruptures(),
                        style.magnitudes(tm.min_mag(), tm.max_mag())
                    );
                }
            }
        }
        println!();
        println!(
            "Independent realizations: {}",
            style.count(composite.num_independent_realizations())
        );
    }
}
