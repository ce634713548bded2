//! Domain models for seismic source-model ensembles.
//!
//! This module contains the core domain types: tectonic regions, sources and
//! their groupings, the two nested logic trees, and the composite source
//! model that ties them together.

mod trt;
pub use trt::{InvalidTrtError, Trt};

/// Geographic primitives and great-circle distances.
pub mod geo;

mod mfd;
pub use mfd::Mfd;

/// Seismic sources and their type-specific parameters.
pub mod source;
pub use source::{Source, SourceKind};

mod trt_model;
pub use trt_model::TrtModel;

/// Source-model and ground-motion model logic trees.
pub mod logic_tree;
pub use logic_tree::{
    GsimBranch, GsimLogicTree, GsimRealization, LogicTreeError, SourceModelBranch,
    SourceModelLogicTree,
};

/// Ground-motion models and their registry.
pub mod gsim;
pub use gsim::{GroundMotionModel, GsimRegistry, NamedGsim, UnknownGsim};

/// Realizations and their association to `TrtModel`s.
pub mod rlz_assoc;
pub use rlz_assoc::{LtRealization, MissingTrtError, RlzAssoc};

mod composite;
pub use composite::{CompositeError, CompositeSourceModel, SourceModel};

mod config;
pub use config::JobConfig;
