use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{calc::LOTS_OF_SOURCES_SITES, domain::geo::Spacing};

/// Parameters of an ensemble calculation.
///
/// Controls how sources are split, how far from the sites they are kept, and
/// when distance filtering switches to the worker pool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "Versions", into = "Versions")]
pub struct JobConfig {
    /// Spacing of the mesh used to split area sources into point sources.
    pub area_source_discretization: Spacing,

    /// Sources farther than this from every site are discarded, in
    /// kilometres.
    pub maximum_distance: f64,

    /// Number of (source, site) pairs above which filtering runs in
    /// parallel.
    pub filter_threshold: usize,

    /// Whether to split area and fault sources before counting ruptures.
    ///
    /// When `false`, ruptures are still counted, on the unsplit sources.
    pub split_sources: bool,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            area_source_discretization: Spacing::default(),
            maximum_distance: default_maximum_distance(),
            filter_threshold: default_filter_threshold(),
            split_sources: true,
        }
    }
}

impl JobConfig {
    /// Loads the configuration from a TOML file at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or if the TOML content is
    /// invalid.
    pub fn load(path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file: {e}"))?;
        toml::from_str(&content).map_err(|e| format!("Failed to parse config file: {e}"))
    }

    /// Saves the configuration to a TOML file at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be serialized to TOML or if
    /// the file cannot be written.
    pub fn save(&self, path: &Path) -> Result<(), String> {
        let content =
            toml::to_string_pretty(self).map_err(|e| format!("Failed to serialize config: {e}"))?;
        std::fs::write(path, content).map_err(|e| format!("Failed to write config file: {e}"))
    }

    /// The discretization step used when splitting sources, or `None` if
    /// splitting is disabled.
    #[must_use]
    pub const fn split_step(&self) -> Option<Spacing> {
        if self.split_sources {
            Some(self.area_source_discretization)
        } else {
            None
        }
    }
}

const fn default_maximum_distance() -> f64 {
    200.0
}

const fn default_filter_threshold() -> usize {
    LOTS_OF_SOURCES_SITES
}

const fn default_true() -> bool {
    true
}

/// The serialized versions of the configuration.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "_version")]
enum Versions {
    #[serde(rename = "1")]
    V1 {
        #[serde(default)]
        area_source_discretization: Spacing,

        #[serde(default = "default_maximum_distance")]
        maximum_distance: f64,

        #[serde(default = "default_filter_threshold")]
        filter_threshold: usize,

        #[serde(default = "default_true")]
        split_sources: bool,
    },
}

impl From<Versions> for JobConfig {
    fn from(versions: Versions) -> Self {
        match versions {
            Versions::V1 {
                area_source_discretization,
                maximum_distance,
                filter_threshold,
                split_sources,
            } => Self {
                area_source_discretization,
                maximum_distance,
                filter_threshold,
                split_sources,
            },
        }
    }
}

impl From<JobConfig> for Versions {
    fn from(config: JobConfig) -> Self {
        Self::V1 {
            area_source_discretization: config.area_source_discretization,
            maximum_distance: config.maximum_distance,
            filter_threshold: config.filter_threshold,
            split_sources: config.split_sources,
        }
    }
}
