//! The composite source model: every branch of the source-model logic tree,
//! with its sources grouped by tectonic region.

use std::collections::{BTreeMap, BTreeSet};

use nonempty::NonEmpty;
use rand::{SeedableRng, rngs::StdRng};
use tracing::instrument;

use crate::{
    calc::filter::{FilterError, filter_sources},
    domain::{
        GsimLogicTree, LogicTreeError, RlzAssoc, Source, SourceModelLogicTree, Trt, TrtModel,
        geo::{SiteCollection, Spacing},
        rlz_assoc::MissingTrtError,
    },
};

/// One branch of the source-model logic tree, with its parsed sources.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceModel {
    /// Name of the source model.
    pub name: String,
    /// Weight of the branch; undefined for sampled branches.
    pub weight: Option<f64>,
    /// Path of the branch in the source-model logic tree.
    pub path: Vec<String>,
    /// The sources, grouped by tectonic region.
    pub trt_models: Vec<TrtModel>,
    /// The ground-motion model logic tree of this branch.
    pub gsim_lt: GsimLogicTree,
    /// Position of the branch within the composite model.
    pub ordinal: usize,
}

impl SourceModel {
    /// The regions of this branch whose sources generate ruptures.
    #[must_use]
    pub fn trts_with_ruptures(&self) -> BTreeSet<Trt> {
        self.trt_models
            .iter()
            .filter(|tm| tm.num_ruptures() > 0)
            .map(|tm| tm.trt().clone())
            .collect()
    }
}

/// Errors raised by a [`CompositeSourceModel`].
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum CompositeError {
    /// The composite model was built from no source models.
    #[error("All sources were filtered away")]
    Empty,

    /// No source model has the requested logic-tree path.
    #[error("There is no source model with sm_lt_path={0:?}")]
    SourceModelNotFound(Vec<String>),

    /// A GSIM path does not cover a region of its source model.
    #[error(transparent)]
    MissingTrt(#[from] MissingTrtError),

    /// A logic tree is malformed.
    #[error(transparent)]
    LogicTree(#[from] LogicTreeError),
}

/// All the branches of a source-model logic tree.
///
/// The composite model exclusively owns its [`TrtModel`]s and numbers them
/// with dense ids, in branch order then within-branch order. Operations that
/// mutate those models ([`Self::reduce_trt_models`], [`Self::rlz_assoc`],
/// splitting and filtering) take `&mut self`.
#[derive(Debug, Clone, PartialEq)]
pub struct CompositeSourceModel {
    source_model_lt: SourceModelLogicTree,
    source_models: NonEmpty<SourceModel>,
    index: BTreeMap<usize, (usize, usize)>,
}

impl CompositeSourceModel {
    /// Builds a composite model and assigns every `TrtModel` its id.
    ///
    /// # Errors
    ///
    /// Returns [`CompositeError::Empty`] if `source_models` is empty.
    pub fn new(
        source_model_lt: SourceModelLogicTree,
        source_models: Vec<SourceModel>,
    ) -> Result<Self, CompositeError> {
        let source_models = NonEmpty::from_vec(source_models).ok_or(CompositeError::Empty)?;
        let mut composite = Self {
            source_model_lt,
            source_models,
            index: BTreeMap::new(),
        };

        let mut next_id = 0;
        for (sm, source_model) in composite.source_models.iter_mut().enumerate() {
            for (position, trt_model) in source_model.trt_models.iter_mut().enumerate() {
                trt_model.id = next_id;
                composite.index.insert(next_id, (sm, position));
                next_id += 1;
            }
        }
        Ok(composite)
    }

    /// The source-model logic tree.
    #[must_use]
    pub const fn source_model_lt(&self) -> &SourceModelLogicTree {
        &self.source_model_lt
    }

    /// Replaces the source-model logic tree, e.g. to switch sampling on.
    pub fn set_source_model_lt(&mut self, source_model_lt: SourceModelLogicTree) {
        self.source_model_lt = source_model_lt;
    }

    /// Number of source models.
    #[must_use]
    pub fn len(&self) -> usize {
        self.source_models.len()
    }

    /// Always `false`: a composite model holds at least one source model.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The source model at `ordinal`.
    #[must_use]
    pub fn get(&self, ordinal: usize) -> Option<&SourceModel> {
        self.source_models.get(ordinal)
    }

    /// Replaces the source model at `ordinal`.
    ///
    /// # Panics
    ///
    /// Panics if `ordinal` is out of bounds.
    pub fn set(&mut self, ordinal: usize, source_model: SourceModel) {
        let slot = self
            .source_models
            .get_mut(ordinal)
            .unwrap_or_else(|| panic!("no source model at ordinal {ordinal}"));
        *slot = source_model;
        self.rebuild_index();
    }

    /// Iterates over the source models in order.
    pub fn iter(&self) -> impl Iterator<Item = &SourceModel> + '_ {
        self.source_models.iter()
    }

    /// Every `TrtModel` of every source model, in order.
    ///
    /// Each call starts a fresh traversal, so replaced source models are
    /// reflected.
    pub fn trt_models(&self) -> impl Iterator<Item = &TrtModel> + '_ {
        self.source_models
            .iter()
            .flat_map(|source_model| source_model.trt_models.iter())
    }

    /// Mutable counterpart of [`Self::trt_models`].
    pub fn trt_models_mut(&mut self) -> impl Iterator<Item = &mut TrtModel> + '_ {
        self.source_models
            .iter_mut()
            .flat_map(|source_model| source_model.trt_models.iter_mut())
    }

    /// The `TrtModel` with the given id, if it is still part of the model.
    #[must_use]
    pub fn trt_model(&self, id: usize) -> Option<&TrtModel> {
        let &(sm, position) = self.index.get(&id)?;
        self.source_models.get(sm)?.trt_models.get(position)
    }

    /// Every source of every `TrtModel`, in order.
    ///
    /// Each source is annotated with the id of its owning `TrtModel` as it is
    /// visited.
    pub fn sources(&mut self) -> impl Iterator<Item = &Source> + '_ {
        self.trt_models_mut().flat_map(|trt_model| {
            let id = trt_model.id;
            trt_model.sources.iter_mut().map(move |source| {
                source.trt_model_id = Some(id);
                &*source
            })
        })
    }

    /// Removes the regions without ruptures from every source model and
    /// reduces the GSIM logic trees to the surviving regions.
    ///
    /// Source models that need no reduction are left untouched. Calling this
    /// twice is the same as calling it once.
    pub fn reduce_trt_models(&mut self) {
        let mut changed = false;
        for source_model in self.source_models.iter_mut() {
            let trts = source_model.trts_with_ruptures();
            if trts == source_model.gsim_lt.filter_keys() {
                continue;
            }
            let gsim_lt = source_model.gsim_lt.filter(&trts);
            let trt_models = std::mem::take(&mut source_model.trt_models)
                .into_iter()
                .filter(|tm| trts.contains(tm.trt()))
                .map(|mut tm| {
                    tm.ground_motion_models = gsim_lt.gsims(tm.trt());
                    tm
                })
                .collect();
            tracing::debug!(
                "Reduced source model {} {:?} to {} region(s)",
                source_model.name,
                source_model.path,
                trts.len()
            );
            source_model.trt_models = trt_models;
            source_model.gsim_lt = gsim_lt;
            changed = true;
        }
        if changed {
            self.rebuild_index();
        }
    }

    /// The source model with the given logic-tree path.
    ///
    /// # Errors
    ///
    /// Returns [`CompositeError::SourceModelNotFound`] if no source model has
    /// exactly this path.
    pub fn source_model(&self, path: &[String]) -> Result<&SourceModel, CompositeError> {
        self.iter()
            .find(|source_model| source_model.path == path)
            .ok_or_else(|| CompositeError::SourceModelNotFound(path.to_vec()))
    }

    fn source_model_mut(&mut self, path: &[String]) -> Result<&mut SourceModel, CompositeError> {
        self.source_models
            .iter_mut()
            .find(|source_model| source_model.path == path)
            .ok_or_else(|| CompositeError::SourceModelNotFound(path.to_vec()))
    }

    /// Splits the sources of every `TrtModel` and counts their ruptures.
    ///
    /// See [`TrtModel::split_sources_and_count_ruptures`].
    pub fn split_sources_and_count_ruptures(&mut self, area_source_discretization: Spacing) {
        for trt_model in self.trt_models_mut() {
            trt_model.split_sources_and_count_ruptures(area_source_discretization);
        }
    }

    /// Counts the ruptures of every `TrtModel` without splitting.
    ///
    /// See [`TrtModel::count_ruptures`].
    pub fn count_ruptures(&mut self) {
        for trt_model in self.trt_models_mut() {
            trt_model.count_ruptures();
        }
    }

    /// Drops, in every `TrtModel`, the sources with no site within
    /// `max_distance` kilometres.
    ///
    /// Rupture counts and magnitude ranges are recomputed from the surviving
    /// sources, so a region filtered down to nothing no longer counts as
    /// active for [`Self::reduce_trt_models`] and [`Self::rlz_assoc`].
    ///
    /// # Errors
    ///
    /// Returns an error if the distance to a source cannot be computed.
    pub fn filter_sources(
        &mut self,
        sites: &SiteCollection,
        max_distance: f64,
        threshold: usize,
    ) -> Result<(), FilterError> {
        for trt_model in self.trt_models_mut() {
            let sources = std::mem::take(&mut trt_model.sources);
            trt_model.replace_sources(filter_sources(sources, sites, max_distance, threshold)?);
        }
        Ok(())
    }

    /// Number of distinct paths over all the GSIM logic trees.
    #[must_use]
    pub fn num_independent_realizations(&self) -> usize {
        self.iter()
            .map(|source_model| source_model.gsim_lt.num_paths())
            .sum()
    }

    /// Enumerates or samples the realizations of the model.
    ///
    /// Branches of the source-model logic tree are visited in order. With
    /// sampling enabled, a single GSIM path is drawn per branch, seeded with
    /// the base seed plus the running realization count; otherwise every
    /// GSIM path of the branch is used. As a side effect, each contributing
    /// `TrtModel` receives the GSIMs of its region.
    ///
    /// # Errors
    ///
    /// Returns [`CompositeError::SourceModelNotFound`] if a branch has no
    /// matching source model, or [`CompositeError::MissingTrt`] if a GSIM
    /// logic tree does not cover a region with ruptures.
    #[instrument(level = "debug", skip(self))]
    pub fn rlz_assoc(&mut self) -> Result<RlzAssoc, CompositeError> {
        let mut assoc = RlzAssoc::default();
        let seed = self.source_model_lt.seed();
        let num_samples = self.source_model_lt.num_samples();
        let paths: Vec<Vec<String>> = self
            .source_model_lt
            .iter()
            .map(|branch| branch.path.clone())
            .collect();

        let mut idx = 0;
        for path in paths {
            let source_model = self.source_model_mut(&path)?;
            let candidates = if num_samples > 0 {
                let mut rng = StdRng::seed_from_u64(seed.wrapping_add(idx as u64));
                vec![source_model.gsim_lt.sample_one(&mut rng)]
            } else {
                source_model.gsim_lt.iter().collect()
            };
            tracing::info!(
                "Creating {} GMPE realization(s) for model {}, {:?}",
                candidates.len(),
                source_model.name,
                source_model.path
            );
            idx = assoc.add_realizations(idx, source_model, candidates)?;
        }

        let num_independent = self.num_independent_realizations();
        if num_samples > num_independent {
            tracing::warn!(
                "The number of independent realizations is {num_independent} but you are using \
                 {num_samples} samplings. That means that some GMPEs will be sampled more than \
                 once, resulting in duplicated data and redundant computation. You should switch \
                 to full enumeration mode, i.e. set the number of logic tree samples to 0."
            );
        }
        Ok(assoc)
    }

    fn rebuild_index(&mut self) {
        self.index = self
            .source_models
            .iter()
            .enumerate()
            .flat_map(|(sm, source_model)| {
                source_model
                    .trt_models
                    .iter()
                    .enumerate()
                    .map(move |(position, tm)| (tm.id, (sm, position)))
            })
            .collect();
    }
}

impl<'a> IntoIterator for &'a CompositeSourceModel {
    type Item = &'a SourceModel;
    type IntoIter = nonempty::Iter<'a, SourceModel>;

    fn into_iter(self) -> Self::IntoIter {
        self.source_models.iter()
    }
}
