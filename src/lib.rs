//! Logic-tree ensembles of seismic source models
//!
//! A seismic hazard calculation considers several alternative source models,
//! each paired with alternative ground-motion models per tectonic region.
//! This crate groups the sources of every alternative into [`TrtModel`]s,
//! splits and filters them, and enumerates (or samples) the resulting
//! realizations of the two nested logic trees.

pub mod domain;
pub use domain::{
    CompositeError, CompositeSourceModel, GsimLogicTree, GsimRegistry, JobConfig, LtRealization,
    Mfd, RlzAssoc, Source, SourceKind, SourceModel, SourceModelLogicTree, Trt, TrtModel,
};

/// Source splitting, distance filtering and grouping.
pub mod calc;

pub mod ensemble;
pub use ensemble::Ensemble;
