//! Calculations over sources: splitting, distance filtering and grouping.

/// Splitting of area and fault sources into finer sources.
pub mod split;
pub use split::split_source;

/// Distance-based source filtering.
pub mod filter;
pub use filter::{FilterError, LOTS_OF_SOURCES_SITES, filter_sources};

mod parallel;
pub use parallel::apply_reduce;

/// Grouping of sources by tectonic region.
pub mod grouping;
pub use grouping::{GroupingError, group_sources};
