//! Loading a [`CompositeSourceModel`] from a YAML ensemble document.
//!
//! An ensemble document lists the branches of the source-model logic tree,
//! the source models they point to (each with its sources and its GSIM logic
//! tree), and optionally the sites of the calculation:
//!
//! ```yaml
//! source_model_logic_tree:
//!   seed: 42
//!   num_samples: 0
//!   branches:
//!     - { name: Base, weight: 1.0, path: [b1] }
//! source_models:
//!   - name: Base
//!     gsim_logic_tree:
//!       Active Shallow Crust:
//!         - { id: b11, gsim: BooreAtkinson2008, weight: 1.0 }
//!     sources: []
//! sites:
//!   - { lon: 0.0, lat: 0.0 }
//! ```

use std::{
    collections::BTreeSet,
    path::{Path, PathBuf},
};

use serde::Deserialize;

use crate::{
    CompositeSourceModel, JobConfig,
    calc::{GroupingError, group_sources},
    domain::{
        CompositeError, GsimLogicTree, LogicTreeError, Source, SourceModel, SourceModelBranch,
        SourceModelLogicTree, Trt, geo::SiteCollection,
    },
};

/// Errors raised while loading an ensemble document.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    /// The document could not be read.
    #[error("Failed to read ensemble file {path}: {source}")]
    Io {
        /// Path of the document.
        path: PathBuf,
        /// The underlying error.
        source: std::io::Error,
    },

    /// The document is not valid YAML or does not describe an ensemble.
    #[error("Failed to parse ensemble: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// A branch points to a source model that is not defined.
    #[error("Branch {path:?} refers to unknown source model {name}")]
    UnknownSourceModel {
        /// Name the branch refers to.
        name: String,
        /// Path of the branch.
        path: Vec<String>,
    },

    /// A source model has sources in a region its GSIM logic tree does not
    /// cover.
    #[error("Found in source model {source_model} the tectonic region {trt} but not in the GSIM logic tree")]
    MissingTrt {
        /// The uncovered region.
        trt: Trt,
        /// Name of the source model.
        source_model: String,
    },

    /// The sources of a source model could not be grouped.
    #[error(transparent)]
    Grouping(#[from] GroupingError),

    /// A logic tree is malformed.
    #[error(transparent)]
    LogicTree(#[from] LogicTreeError),

    /// The composite model could not be built.
    #[error(transparent)]
    Composite(#[from] CompositeError),
}

#[derive(Debug, Deserialize)]
struct Document {
    source_model_logic_tree: LogicTreeDocument,
    source_models: Vec<SourceModelDocument>,
    #[serde(default)]
    sites: SiteCollection,
}

#[derive(Debug, Deserialize)]
struct LogicTreeDocument {
    #[serde(default)]
    seed: u64,
    #[serde(default)]
    num_samples: usize,
    branches: Vec<SourceModelBranch>,
}

#[derive(Debug, Deserialize)]
struct SourceModelDocument {
    name: String,
    #[serde(default)]
    gsim_logic_tree: GsimLogicTree,
    #[serde(default)]
    sources: Vec<Source>,
}

/// A composite source model together with the sites it is computed for.
#[derive(Debug, Clone, PartialEq)]
pub struct Ensemble {
    /// The source models of every branch.
    pub composite: CompositeSourceModel,
    /// The sites of the calculation; may be empty.
    pub sites: SiteCollection,
}

impl Ensemble {
    /// Loads an ensemble from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or does not describe a
    /// valid ensemble.
    pub fn load(path: &Path) -> Result<Self, LoadError> {
        let content = std::fs::read_to_string(path).map_err(|source| LoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::debug!("Loading ensemble from {}", path.display());
        Self::parse(&content)
    }

    /// Parses an ensemble from a YAML string.
    ///
    /// Every branch gets its own copy of the source model it points to, with
    /// the sources grouped by tectonic region and the GSIM logic tree reduced
    /// to the regions that have sources.
    ///
    /// # Errors
    ///
    /// Returns an error if the document is malformed, a branch points to an
    /// undefined source model, two sources of a model share an id, or a
    /// model has sources in a region without ground-motion models.
    pub fn parse(content: &str) -> Result<Self, LoadError> {
        let document: Document = serde_yaml::from_str(content)?;
        let LogicTreeDocument {
            seed,
            num_samples,
            branches,
        } = document.source_model_logic_tree;

        let mut source_models = Vec::with_capacity(branches.len());
        for (ordinal, branch) in branches.iter().enumerate() {
            let model = document
                .source_models
                .iter()
                .find(|model| model.name == branch.name)
                .ok_or_else(|| LoadError::UnknownSourceModel {
                    name: branch.name.clone(),
                    path: branch.path.clone(),
                })?;
            source_models.push(build_source_model(model, branch, ordinal)?);
        }

        let source_model_lt = SourceModelLogicTree::new(branches)?.with_sampling(num_samples, seed);
        let composite = CompositeSourceModel::new(source_model_lt, source_models)?;
        tracing::info!(
            "Loaded {} source model(s) and {} site(s)",
            composite.len(),
            document.sites.len()
        );
        Ok(Self {
            composite,
            sites: document.sites,
        })
    }

    /// Splits the sources (if enabled) and counts their ruptures.
    pub fn count_ruptures(&mut self, config: &JobConfig) {
        match config.split_step() {
            Some(step) => self.composite.split_sources_and_count_ruptures(step),
            None => self.composite.count_ruptures(),
        }
    }
}

fn build_source_model(
    model: &SourceModelDocument,
    branch: &SourceModelBranch,
    ordinal: usize,
) -> Result<SourceModel, LoadError> {
    let trt_models = group_sources(model.sources.iter().cloned(), &model.name)?;

    let covered = model.gsim_logic_tree.filter_keys();
    let trts: BTreeSet<Trt> = trt_models.iter().map(|tm| tm.trt().clone()).collect();
    if let Some(trt) = trts.difference(&covered).next() {
        return Err(LoadError::MissingTrt {
            trt: trt.clone(),
            source_model: model.name.clone(),
        });
    }

    Ok(SourceModel {
        name: model.name.clone(),
        weight: branch.weight,
        path: branch.path.clone(),
        trt_models,
        gsim_lt: model.gsim_logic_tree.filter(&trts),
        ordinal,
    })
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use test_case::test_case;

    use super::*;

    const DOCUMENT: &str = r"
source_model_logic_tree:
  seed: 23
  branches:
    - { name: Base, weight: 0.7, path: [b1] }
    - { name: Alternative, weight: 0.3, path: [b2] }
source_models:
  - name: Base
    gsim_logic_tree:
      Active Shallow Crust:
        - { id: b11, gsim: BooreAtkinson2008, weight: 0.5 }
        - { id: b12, gsim: ChiouYoungs2008, weight: 0.5 }
      Subduction Interface:
        - { id: b21, gsim: Youngs1997, weight: 1.0 }
    sources:
      - id: '1'
        name: Point One
        trt: Active Shallow Crust
        kind: point
        location: { lon: 0.0, lat: 0.0 }
        mfd: { type: truncated_gr, a_val: 3.0, b_val: 1.0, min_mag: 5.0, max_mag: 6.0, bin_width: 0.1 }
        rupture:
          upper_seismogenic_depth: 0.0
          lower_seismogenic_depth: 10.0
          nodal_planes: [{ probability: 1.0, strike: 0.0, dip: 90.0, rake: 0.0 }]
          hypo_depths: [{ probability: 1.0, depth: 5.0 }]
  - name: Alternative
    gsim_logic_tree:
      Active Shallow Crust:
        - { id: b11, gsim: BooreAtkinson2008, weight: 1.0 }
    sources:
      - id: '1'
        trt: Active Shallow Crust
        kind: simple_fault
        fault_trace: [{ lon: 0.0, lat: 0.0 }, { lon: 0.0, lat: 0.5 }]
        mfd: { type: evenly_discretized, min_mag: 6.0, bin_width: 0.1, occurrence_rates: [0.01, 0.0, 0.02] }
        upper_seismogenic_depth: 0.0
        lower_seismogenic_depth: 15.0
        dip: 60.0
        rake: 90.0
sites:
  - { lon: 0.1, lat: 0.1 }
  - { lon: 30.0, lat: 30.0 }
";

    #[test]
    fn parses_branches_sources_and_sites() {
        let ensemble = Ensemble::parse(DOCUMENT).unwrap();
        let composite = &ensemble.composite;

        assert_eq!(composite.len(), 2);
        assert_eq!(ensemble.sites.len(), 2);
        assert_eq!(composite.source_model_lt().seed(), 23);
        assert_eq!(composite.source_model_lt().num_samples(), 0);

        let base = composite.get(0).unwrap();
        assert_eq!(base.name, "Base");
        assert_eq!(base.weight, Some(0.7));
        assert_eq!(base.path, vec!["b1"]);
        // the subduction branch set has no sources and is dropped
        assert_eq!(base.gsim_lt.num_paths(), 2);

        let ids: Vec<_> = composite.trt_models().map(crate::TrtModel::id).collect();
        assert_eq!(ids, vec![0, 1]);
    }

    #[test]
    fn enumerates_after_counting() {
        let mut ensemble = Ensemble::parse(DOCUMENT).unwrap();
        ensemble.count_ruptures(&JobConfig::default());

        let fault_model = ensemble.composite.trt_model(1).unwrap();
        let ids: Vec<_> = fault_model.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["1-0", "1-1"]);

        let assoc = ensemble.composite.rlz_assoc().unwrap();
        let labels: Vec<_> = assoc.realizations().iter().map(ToString::to_string).collect();
        assert_eq!(labels, vec!["#0-b1-b11", "#1-b1-b12", "#2-b2-b11"]);
    }

    #[test]
    fn counting_without_splitting_keeps_sources() {
        let mut ensemble = Ensemble::parse(DOCUMENT).unwrap();
        let config = JobConfig {
            split_sources: false,
            ..JobConfig::default()
        };
        ensemble.count_ruptures(&config);
        let fault_model = ensemble.composite.trt_model(1).unwrap();
        assert_eq!(fault_model.len(), 1);
        assert!(fault_model.num_ruptures() > 0);
    }

    #[test]
    fn load_reads_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(DOCUMENT.as_bytes()).unwrap();

        let ensemble = Ensemble::load(file.path()).unwrap();
        assert_eq!(ensemble.composite.len(), 2);
    }

    #[test]
    fn load_missing_file_returns_error() {
        let tmp = tempfile::tempdir().unwrap();
        let error = Ensemble::load(&tmp.path().join("missing.yaml")).unwrap_err();
        assert!(matches!(error, LoadError::Io { .. }));
        assert!(error.to_string().starts_with("Failed to read ensemble file"));
    }

    #[test]
    fn unknown_source_model_is_an_error() {
        let document = DOCUMENT.replace("name: Alternative, weight", "name: Missing, weight");
        let error = Ensemble::parse(&document).unwrap_err();
        assert!(matches!(
            error,
            LoadError::UnknownSourceModel { ref name, .. } if name == "Missing"
        ));
    }

    #[test]
    fn uncovered_region_is_an_error() {
        let document = DOCUMENT.replace(
            "      Active Shallow Crust:\n        - { id: b11, gsim: BooreAtkinson2008, weight: 1.0 }\n",
            "      Stable Continental:\n        - { id: b11, gsim: ToroEtAl2002, weight: 1.0 }\n",
        );
        let error = Ensemble::parse(&document).unwrap_err();
        assert_eq!(
            error.to_string(),
            "Found in source model Alternative the tectonic region Active Shallow Crust but not \
             in the GSIM logic tree"
        );
    }

    #[test]
    fn duplicated_source_ids_are_an_error() {
        let duplicated = r"
source_model_logic_tree:
  branches: [{ name: M, weight: 1.0, path: [b1] }]
source_models:
  - name: M
    sources:
      - { id: a, trt: X, kind: non_parametric, ruptures: [] }
      - { id: a, trt: X, kind: non_parametric, ruptures: [] }
";
        let error = Ensemble::parse(duplicated).unwrap_err();
        assert!(matches!(error, LoadError::Grouping(GroupingError::DuplicatedId { .. })));
    }

    #[test]
    fn invalid_weights_are_an_error() {
        let document = DOCUMENT.replace("weight: 0.3, path", "weight: 0.4, path");
        let error = Ensemble::parse(&document).unwrap_err();
        assert!(matches!(error, LoadError::LogicTree(_)));
    }

    const AREA_DOCUMENT: &str = r"
source_model_logic_tree:
  branches: [{ name: M, weight: 1.0, path: [b1] }]
source_models:
  - name: M
    gsim_logic_tree:
      Active Shallow Crust:
        - { id: b11, gsim: BooreAtkinson2008, weight: 1.0 }
    sources:
      - id: a
        trt: Active Shallow Crust
        kind: area
        polygon: [{ lon: 0.0, lat: 0.0 }, { lon: 1.0, lat: 0.0 }, { lon: 1.0, lat: 1.0 }]
        area_discretization: 25.0
        mfd: { type: evenly_discretized, min_mag: 5.0, bin_width: 0.1, occurrence_rates: [0.1] }
        rupture:
          upper_seismogenic_depth: 0.0
          lower_seismogenic_depth: 10.0
          nodal_planes: [{ probability: 1.0, strike: 0.0, dip: 90.0, rake: 0.0 }]
          hypo_depths: [{ probability: 1.0, depth: 5.0 }]
";

    #[test]
    fn area_source_is_split_into_points() {
        let mut ensemble = Ensemble::parse(AREA_DOCUMENT).unwrap();
        ensemble.count_ruptures(&JobConfig::default());
        let model = ensemble.composite.trt_model(0).unwrap();
        assert!(model.len() > 1);
        assert!(model.iter().all(crate::Source::is_point));
    }

    #[test_case("area_discretization: 25.0", "area_discretization: 0"; "zero spacing")]
    #[test_case("area_discretization: 25.0", "area_discretization: -3.0"; "negative spacing")]
    #[test_case(", { lon: 1.0, lat: 1.0 }]", "]"; "two vertices")]
    fn invalid_area_geometry_is_a_parse_error(from: &str, to: &str) {
        let document = AREA_DOCUMENT.replace(from, to);
        let error = Ensemble::parse(&document).unwrap_err();
        assert!(matches!(error, LoadError::Parse(_)));
    }

    #[test]
    fn no_branches_is_an_empty_composite() {
        let document = "source_model_logic_tree: { branches: [] }\nsource_models: []\n";
        let error = Ensemble::parse(document).unwrap_err();
        assert!(matches!(error, LoadError::Composite(CompositeError::Empty)));
    }
}
