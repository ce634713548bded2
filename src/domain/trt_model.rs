use std::{cmp::Ordering, fmt, ops::Index};

use crate::{
    calc::split::split_source,
    domain::{Source, Trt, geo::Spacing},
};

/// A group of sources sharing one tectonic region type.
///
/// Besides the sources themselves, a `TrtModel` tracks the total number of
/// ruptures they generate, their magnitude range, the ground-motion models
/// applicable to the region and an id that is unique across a
/// [`CompositeSourceModel`](crate::CompositeSourceModel).
#[derive(Debug, Clone, PartialEq)]
pub struct TrtModel {
    trt: Trt,
    pub(crate) sources: Vec<Source>,
    num_ruptures: usize,
    min_mag: Option<f64>,
    max_mag: Option<f64>,
    pub(crate) ground_motion_models: Vec<String>,
    pub(crate) id: usize,
}

impl TrtModel {
    /// Relative cost of a point-source rupture compared to a rupture of any
    /// other source type.
    pub const POINT_SOURCE_WEIGHT: f64 = 1.0 / 40.0;

    /// Creates an empty model for the given region.
    #[must_use]
    pub const fn new(trt: Trt) -> Self {
        Self {
            trt,
            sources: Vec::new(),
            num_ruptures: 0,
            min_mag: None,
            max_mag: None,
            ground_motion_models: Vec::new(),
            id: 0,
        }
    }

    /// Creates a model holding the given sources.
    ///
    /// # Panics
    ///
    /// Panics if any source belongs to a different tectonic region.
    #[must_use]
    pub fn with_sources(trt: Trt, sources: impl IntoIterator<Item = Source>) -> Self {
        let mut model = Self::new(trt);
        for source in sources {
            model.update(source);
        }
        model
    }

    /// The tectonic region type of every source in the model.
    #[must_use]
    pub const fn trt(&self) -> &Trt {
        &self.trt
    }

    /// The id of the model within its composite source model.
    #[must_use]
    pub const fn id(&self) -> usize {
        self.id
    }

    /// Total number of ruptures generated by the sources, as counted by
    /// [`Self::update_num_ruptures`].
    #[must_use]
    pub const fn num_ruptures(&self) -> usize {
        self.num_ruptures
    }

    /// Smallest magnitude over all sources, if there are any.
    #[must_use]
    pub const fn min_mag(&self) -> Option<f64> {
        self.min_mag
    }

    /// Largest magnitude over all sources, if there are any.
    #[must_use]
    pub const fn max_mag(&self) -> Option<f64> {
        self.max_mag
    }

    /// The ground-motion models applicable to this region.
    #[must_use]
    pub fn ground_motion_models(&self) -> &[String] {
        &self.ground_motion_models
    }

    /// The sources in the model.
    #[must_use]
    pub fn sources(&self) -> &[Source] {
        &self.sources
    }

    /// Number of sources.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    /// Whether the model holds no sources.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Iterates over the sources.
    pub fn iter(&self) -> std::slice::Iter<'_, Source> {
        self.sources.iter()
    }

    /// Adds a source and widens the magnitude range to cover it.
    ///
    /// # Panics
    ///
    /// Panics if the source belongs to a different tectonic region. Grouping
    /// sources by region is the caller's job; a mismatch is a bug.
    pub fn update(&mut self, source: Source) {
        assert!(
            source.trt == self.trt,
            "source {} has tectonic region {:?}, expected {:?}",
            source.id,
            source.trt.as_str(),
            self.trt.as_str()
        );
        let (min_mag, max_mag) = source.min_max_mag();
        if self.min_mag.is_none_or(|current| min_mag < current) {
            self.min_mag = Some(min_mag);
        }
        if self.max_mag.is_none_or(|current| max_mag > current) {
            self.max_mag = Some(max_mag);
        }
        self.sources.push(source);
    }

    /// Counts the ruptures of `source`, adds them to the model total and
    /// returns the weight of the source.
    ///
    /// The weight is the rupture count, discounted by
    /// [`Self::POINT_SOURCE_WEIGHT`] for point sources.
    #[allow(clippy::cast_precision_loss)]
    pub fn update_num_ruptures(&mut self, source: &Source) -> f64 {
        let num_ruptures = source.count_ruptures();
        self.num_ruptures += num_ruptures;
        if source.is_point() {
            num_ruptures as f64 * Self::POINT_SOURCE_WEIGHT
        } else {
            num_ruptures as f64
        }
    }

    /// Replaces the sources with their split counterparts, weighting each one
    /// and recomputing the total rupture count.
    ///
    /// The resulting sources are ordered by id.
    pub fn split_sources_and_count_ruptures(&mut self, area_source_discretization: Spacing) {
        self.num_ruptures = 0;
        let originals = std::mem::take(&mut self.sources);
        let mut sources = Vec::with_capacity(originals.len());
        for source in &originals {
            for mut split in split_source(source, area_source_discretization) {
                split.weight = self.update_num_ruptures(&split);
                sources.push(split);
            }
        }
        sources.sort_by(|a, b| a.id.cmp(&b.id));
        self.sources = sources;
    }

    /// Weights the sources as they are and recomputes the total rupture
    /// count.
    pub fn count_ruptures(&mut self) {
        self.num_ruptures = 0;
        let mut sources = std::mem::take(&mut self.sources);
        for source in &mut sources {
            source.weight = self.update_num_ruptures(source);
        }
        self.sources = sources;
    }

    /// Replaces the sources, recomputing the magnitude range and the total
    /// rupture count from the new ones.
    ///
    /// # Panics
    ///
    /// Panics if any source belongs to a different tectonic region.
    pub fn replace_sources(&mut self, sources: Vec<Source>) {
        self.sources.clear();
        self.min_mag = None;
        self.max_mag = None;
        for source in sources {
            self.update(source);
        }
        self.count_ruptures();
    }

    /// Orders models by number of sources, then by region name.
    ///
    /// Used to give the models of a source model a deterministic order.
    #[must_use]
    pub fn cmp_by_size(&self, other: &Self) -> Ordering {
        self.len()
            .cmp(&other.len())
            .then_with(|| self.trt.cmp(&other.trt))
    }
}

impl Index<usize> for TrtModel {
    type Output = Source;

    fn index(&self, index: usize) -> &Self::Output {
        &self.sources[index]
    }
}

impl<'a> IntoIterator for &'a TrtModel {
    type Item = &'a Source;
    type IntoIter = std::slice::Iter<'a, Source>;

    fn into_iter(self) -> Self::IntoIter {
        self.sources.iter()
    }
}

impl fmt::Display for TrtModel {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "<TrtModel #{} {}, {} source(s)>",
            self.id,
            self.trt,
            self.sources.len()
        )
    }
}
