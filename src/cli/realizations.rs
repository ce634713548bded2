use std::path::PathBuf;

use clap::Parser;
use quake_ensemble::{JobConfig, RlzAssoc};
use tracing::instrument;

use super::{OutputFormat, load_ensemble, terminal::Style};

#[derive(Debug, Parser)]
#[command(about = "Enumerate or sample the logic-tree realizations")]
pub struct Realizations {
    /// The ensemble document (YAML)
    input: PathBuf,

    /// Output format (table, json)
    #[arg(long, value_name = "FORMAT", default_value = "table")]
    output: OutputFormat,

    /// Sample this many realizations instead of using the document's setting
    ///
    /// Zero means full enumeration.
    #[arg(long, value_name = "N")]
    sample: Option<usize>,

    /// Seed for sampling, overriding the document's seed
    #[arg(long, requires = "sample")]
    seed: Option<u64>,

    /// Also show, for each region model and GSIM, the realizations using it
    #[arg(long)]
    assoc: bool,
}

impl Realizations {
    #[instrument(level = "debug", skip(self, config))]
    pub fn run(self, config: &JobConfig) -> anyhow::Result<()> {
        let mut ensemble = load_ensemble(&self.input, config)?;
        let composite = &mut ensemble.composite;

        if let Some(num_samples) = self.sample {
            let seed = self.seed.unwrap_or_else(|| composite.source_model_lt().seed());
            let source_model_lt = composite
                .source_model_lt()
                .clone()
                .with_sampling(num_samples, seed);
            composite.set_source_model_lt(source_model_lt);
        }

        composite.reduce_trt_models();
        let assoc = composite.rlz_assoc()?;

        match self.output {
            OutputFormat::Json => Self::output_json(&assoc)?,
            OutputFormat::Table => Self::output_table(&assoc, self.assoc),
        }
        Ok(())
    }

    fn output_json(assoc: &RlzAssoc) -> anyhow::Result<()> {
        use serde_json::json;

        let associations: Vec<_> = assoc
            .keys()
            .map(|(trt_model_id, gsim)| {
                let ordinals: Vec<_> = assoc
                    .realizations_for(trt_model_id, gsim)
                    .map(|rlz| rlz.ordinal)
                    .collect();
                json!({
                    "trt_model_id": trt_model_id,
                    "gsim": gsim,
                    "realizations": ordinals,
                })
            })
            .collect();

        let output = json!({
            "realizations": assoc.realizations(),
            "gsim_by_trt": assoc.gsim_by_trt(),
            "associations": associations,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        Ok(())
    }

    fn output_table(assoc: &RlzAssoc, show_assoc: bool) {
        let style = Style::detect();
        if assoc.is_empty() {
            println!(
                "{}",
                style.warning("No realizations: no source generates ruptures.")
            );
            return;
        }

        if style.is_narrow() {
            for rlz in assoc.realizations() {
                println!("{rlz} weight={}", style.weight(rlz.weight, 0));
            }
        } else {
            println!(
                "{}",
                style.heading(&format!(
                    "{:<8} {:<10} {:<24} GSIM path",
                    "Ordinal", "Weight", "Source model path"
                ))
            );
            for rlz in assoc.realizations() {
                println!(
                    "{:<8} {} {:<24} {}",
                    rlz.ordinal,
                    style.weight(rlz.weight, 10),
                    rlz.sm_lt_path.join("_"),
                    rlz.gsim_lt_path.join("_")
                );
            }
        }

        println!();
        println!("Realizations: {}", style.count(assoc.len()));

        if show_assoc {
            println!();
            print!("{assoc}");
        }
    }
}
