use std::collections::{BTreeMap, BTreeSet};

use crate::domain::{Source, Trt, TrtModel};

/// Progress is logged every this many sources.
const LOG_EVERY: usize = 10_000;

/// Error raised while grouping the sources of one source model.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum GroupingError {
    /// Two sources of the same source model share an id.
    #[error("The source ID {id} is duplicated in {origin}")]
    DuplicatedId {
        /// The duplicated id.
        id: String,
        /// Where the sources come from, e.g. the source model name.
        origin: String,
    },
}

/// Groups the sources of one source model by tectonic region.
///
/// The returned models are ordered by number of sources, then by region.
///
/// # Errors
///
/// Returns [`GroupingError::DuplicatedId`] if two sources share an id.
pub fn group_sources(
    sources: impl IntoIterator<Item = Source>,
    origin: &str,
) -> Result<Vec<TrtModel>, GroupingError> {
    let mut seen = BTreeSet::new();
    let mut by_trt: BTreeMap<Trt, TrtModel> = BTreeMap::new();

    for (i, source) in sources.into_iter().enumerate() {
        if !seen.insert(source.id.clone()) {
            return Err(GroupingError::DuplicatedId {
                id: source.id,
                origin: origin.to_string(),
            });
        }
        by_trt
            .entry(source.trt.clone())
            .or_insert_with_key(|trt| TrtModel::new(trt.clone()))
            .update(source);
        if (i + 1) % LOG_EVERY == 0 {
            tracing::info!("Instantiated {} sources from {origin}", i + 1);
        }
    }

    let mut trt_models: Vec<_> = by_trt.into_values().collect();
    trt_models.sort_by(TrtModel::cmp_by_size);
    Ok(trt_models)
}
