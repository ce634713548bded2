//! Realizations of the two nested logic trees and their reverse indices.

use std::{collections::BTreeMap, fmt};

use serde::Serialize;

use crate::domain::{
    SourceModel, Trt,
    gsim::{GroundMotionModel, GsimRegistry, UnknownGsim},
    logic_tree::GsimRealization,
};

/// One concrete combination of modelling choices.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LtRealization {
    /// Dense, 0-based position of the realization.
    pub ordinal: usize,
    /// Path through the source-model logic tree.
    pub sm_lt_path: Vec<String>,
    /// Path through the GSIM logic tree of the source model.
    pub gsim_lt_path: Vec<String>,
    /// Combined weight; undefined when either contributing weight is.
    pub weight: Option<f64>,
}

impl fmt::Display for LtRealization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "#{}-{}-{}",
            self.ordinal,
            self.sm_lt_path.join("_"),
            self.gsim_lt_path.join("_")
        )
    }
}

/// The realizations of a composite source model.
///
/// Besides the flat list of realizations, keeps the ground-motion model chosen
/// for every region in each realization, and for each `(TrtModel id, GSIM)`
/// pair the realizations that select that GSIM for that model.
///
/// Built by
/// [`CompositeSourceModel::rlz_assoc`](crate::CompositeSourceModel::rlz_assoc);
/// it is not updated when the composite model changes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RlzAssoc {
    realizations: Vec<LtRealization>,
    gsim_by_trt: Vec<BTreeMap<Trt, String>>,
    assoc: BTreeMap<(usize, String), Vec<usize>>,
}

/// Error raised when a GSIM path has no choice for a region of its model.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("GSIM path {path} has no ground-motion model for {trt}")]
pub struct MissingTrtError {
    /// The region with no choice.
    pub trt: Trt,
    /// The offending GSIM path, joined with `_`.
    pub path: String,
}

impl RlzAssoc {
    /// All realizations, in ordinal order.
    #[must_use]
    pub fn realizations(&self) -> &[LtRealization] {
        &self.realizations
    }

    /// The region → GSIM choice of each realization, parallel to
    /// [`Self::realizations`].
    #[must_use]
    pub fn gsim_by_trt(&self) -> &[BTreeMap<Trt, String>] {
        &self.gsim_by_trt
    }

    /// Number of realizations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.realizations.len()
    }

    /// Whether there are no realizations.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.realizations.is_empty()
    }

    /// The `(TrtModel id, GSIM)` pairs that have realizations, in order.
    pub fn keys(&self) -> impl Iterator<Item = (usize, &str)> + '_ {
        self.assoc.keys().map(|(id, gsim)| (*id, gsim.as_str()))
    }

    /// The realizations selecting `gsim` for the model with the given id.
    pub fn realizations_for(
        &self,
        trt_model_id: usize,
        gsim: &str,
    ) -> impl Iterator<Item = &LtRealization> + '_ {
        self.assoc
            .get(&(trt_model_id, gsim.to_string()))
            .into_iter()
            .flatten()
            .map(|&ordinal| &self.realizations[ordinal])
    }

    /// Instantiates, for each model id, every GSIM associated to it.
    ///
    /// Models are listed in GSIM identifier order.
    ///
    /// # Errors
    ///
    /// Returns [`UnknownGsim`] if a GSIM is not in the registry.
    pub fn gsims_by_trt_model(
        &self,
        registry: &GsimRegistry,
    ) -> Result<BTreeMap<usize, Vec<Box<dyn GroundMotionModel>>>, UnknownGsim> {
        let mut gsims: BTreeMap<usize, Vec<Box<dyn GroundMotionModel>>> = BTreeMap::new();
        for (trt_model_id, gsim) in self.keys() {
            gsims
                .entry(trt_model_id)
                .or_default()
                .push(registry.instantiate(gsim)?);
        }
        Ok(gsims)
    }

    /// Instantiates the GSIMs associated to one model id.
    ///
    /// # Errors
    ///
    /// Returns [`UnknownGsim`] if a GSIM is not in the registry.
    pub fn gsims_for(
        &self,
        trt_model_id: usize,
        registry: &GsimRegistry,
    ) -> Result<Vec<Box<dyn GroundMotionModel>>, UnknownGsim> {
        self.keys()
            .filter(|(id, _)| *id == trt_model_id)
            .map(|(_, gsim)| registry.instantiate(gsim))
            .collect()
    }

    /// Appends the realizations of one source model, numbering them from
    /// `idx`, and returns the next free ordinal.
    ///
    /// Source models whose regions generate no ruptures contribute nothing.
    /// As a side effect, each contributing `TrtModel` receives the GSIMs its
    /// region can use.
    pub(crate) fn add_realizations(
        &mut self,
        mut idx: usize,
        source_model: &mut SourceModel,
        candidates: Vec<GsimRealization>,
    ) -> Result<usize, MissingTrtError> {
        if source_model.trt_models.iter().all(|tm| tm.num_ruptures() == 0) {
            return Ok(idx);
        }
        let gsims_by_trt = source_model.gsim_lt.values();

        for candidate in candidates {
            let weight = match (source_model.weight, candidate.weight) {
                (Some(sm_weight), Some(gsim_weight)) => Some(sm_weight * gsim_weight),
                _ => None,
            };
            let realization = LtRealization {
                ordinal: idx,
                sm_lt_path: source_model.path.clone(),
                gsim_lt_path: candidate.path.clone(),
                weight,
            };

            for trt_model in source_model
                .trt_models
                .iter_mut()
                .filter(|tm| tm.num_ruptures() > 0)
            {
                let trt = trt_model.trt();
                let gsim = candidate
                    .gsim_by_trt
                    .get(trt)
                    .ok_or_else(|| MissingTrtError {
                        trt: trt.clone(),
                        path: candidate.path.join("_"),
                    })?;
                self.assoc
                    .entry((trt_model.id(), gsim.clone()))
                    .or_default()
                    .push(idx);
                trt_model.ground_motion_models =
                    gsims_by_trt.get(trt).cloned().unwrap_or_default();
            }

            self.realizations.push(realization);
            self.gsim_by_trt.push(candidate.gsim_by_trt);
            idx += 1;
        }
        Ok(idx)
    }
}

impl fmt::Display for RlzAssoc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for ((trt_model_id, gsim), ordinals) in &self.assoc {
            let rlzs: Vec<String> = ordinals
                .iter()
                .map(|&ordinal| self.realizations[ordinal].to_string())
                .collect();
            writeln!(f, "({trt_model_id}, {gsim}) [{}]", rlzs.join(", "))?;
        }
        Ok(())
    }
}
