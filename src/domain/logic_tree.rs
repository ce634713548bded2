//! Logic trees: the source-model tree and the per-branch GSIM trees.
//!
//! The source-model logic tree lists the alternative source models with their
//! weights. Each source model carries its own [`GsimLogicTree`], which holds
//! one branch set of alternative ground-motion models per tectonic region.
//! A path through a GSIM tree picks one ground-motion model for every region.

use std::collections::{BTreeMap, BTreeSet};

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::domain::Trt;

/// Tolerance on the sum of the weights of a branch set.
const WEIGHT_TOLERANCE: f64 = 1e-6;

/// Errors raised while building a logic tree.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum LogicTreeError {
    /// A tectonic region has no ground-motion model branches.
    #[error("branch set for {0} has no branches")]
    EmptyBranchSet(Trt),

    /// The weights of a branch set do not add up to one.
    #[error("weights of the branch set for {trt} sum to {sum}, expected 1")]
    InvalidWeights {
        /// The region of the offending branch set.
        trt: Trt,
        /// The actual sum.
        sum: f64,
    },

    /// The weights of the source-model branches do not add up to one.
    #[error("source model branch weights sum to {0}, expected 1")]
    InvalidSourceModelWeights(f64),

    /// Two branches of the same set share an id.
    #[error("branch id {0} is duplicated")]
    DuplicatedBranchId(String),
}

/// One branch of the source-model logic tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceModelBranch {
    /// Name of the source model this branch points to.
    pub name: String,
    /// Weight of the branch; undefined for sampled branches.
    pub weight: Option<f64>,
    /// Labels of the branches traversed to reach this source model.
    pub path: Vec<String>,
}

/// The source-model logic tree.
///
/// Yields its branches in definition order, and carries the sampling
/// configuration of the calculation.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceModelLogicTree {
    branches: Vec<SourceModelBranch>,
    seed: u64,
    num_samples: usize,
}

impl SourceModelLogicTree {
    /// Creates a tree enumerating all of its branches.
    ///
    /// # Errors
    ///
    /// Returns [`LogicTreeError::InvalidSourceModelWeights`] if every branch
    /// is weighted and the weights do not sum to one.
    pub fn new(branches: Vec<SourceModelBranch>) -> Result<Self, LogicTreeError> {
        let weights: Option<Vec<f64>> = branches.iter().map(|b| b.weight).collect();
        if let Some(weights) = weights {
            let sum: f64 = weights.iter().sum();
            if !branches.is_empty() && (sum - 1.0).abs() > WEIGHT_TOLERANCE {
                return Err(LogicTreeError::InvalidSourceModelWeights(sum));
            }
        }
        Ok(Self {
            branches,
            seed: 0,
            num_samples: 0,
        })
    }

    /// Switches the tree to sampling mode.
    ///
    /// A `num_samples` of zero means full enumeration.
    #[must_use]
    pub const fn with_sampling(mut self, num_samples: usize, seed: u64) -> Self {
        self.num_samples = num_samples;
        self.seed = seed;
        self
    }

    /// Base seed for sampling.
    #[must_use]
    pub const fn seed(&self) -> u64 {
        self.seed
    }

    /// Number of requested samples; zero means full enumeration.
    #[must_use]
    pub const fn num_samples(&self) -> usize {
        self.num_samples
    }

    /// Iterates over the branches in definition order.
    pub fn iter(&self) -> std::slice::Iter<'_, SourceModelBranch> {
        self.branches.iter()
    }

    /// Number of branches.
    #[must_use]
    pub fn len(&self) -> usize {
        self.branches.len()
    }

    /// Whether the tree has no branches.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.branches.is_empty()
    }
}

impl<'a> IntoIterator for &'a SourceModelLogicTree {
    type Item = &'a SourceModelBranch;
    type IntoIter = std::slice::Iter<'a, SourceModelBranch>;

    fn into_iter(self) -> Self::IntoIter {
        self.branches.iter()
    }
}

/// One ground-motion model choice within a branch set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GsimBranch {
    /// Branch label, used in realization paths.
    pub id: String,
    /// Identifier of the ground-motion model.
    pub gsim: String,
    /// Weight of the branch.
    pub weight: f64,
}

/// One path through a [`GsimLogicTree`].
#[derive(Debug, Clone, PartialEq)]
pub struct GsimRealization {
    /// The ground-motion model chosen for each region.
    pub gsim_by_trt: BTreeMap<Trt, String>,
    /// Product of the branch weights; undefined for sampled paths.
    pub weight: Option<f64>,
    /// Branch labels along the path, in region order.
    pub path: Vec<String>,
}

/// The ground-motion model logic tree of one source model.
///
/// Holds one branch set per tectonic region. Regions are visited in
/// lexicographic order, which fixes the order of paths and path labels.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(try_from = "BTreeMap<Trt, Vec<GsimBranch>>")]
#[serde(into = "BTreeMap<Trt, Vec<GsimBranch>>")]
pub struct GsimLogicTree {
    branch_sets: BTreeMap<Trt, Vec<GsimBranch>>,
}

impl GsimLogicTree {
    /// Creates a tree from its branch sets.
    ///
    /// # Errors
    ///
    /// Returns an error if a branch set is empty, contains duplicated branch
    /// ids, or has weights that do not sum to one.
    pub fn new(branch_sets: BTreeMap<Trt, Vec<GsimBranch>>) -> Result<Self, LogicTreeError> {
        for (trt, branches) in &branch_sets {
            if branches.is_empty() {
                return Err(LogicTreeError::EmptyBranchSet(trt.clone()));
            }
            let mut ids = BTreeSet::new();
            for branch in branches {
                if !ids.insert(branch.id.as_str()) {
                    return Err(LogicTreeError::DuplicatedBranchId(branch.id.clone()));
                }
            }
            let sum: f64 = branches.iter().map(|b| b.weight).sum();
            if (sum - 1.0).abs() > WEIGHT_TOLERANCE {
                return Err(LogicTreeError::InvalidWeights {
                    trt: trt.clone(),
                    sum,
                });
            }
        }
        Ok(Self { branch_sets })
    }

    /// The regions this tree has branch sets for.
    #[must_use]
    pub fn filter_keys(&self) -> BTreeSet<Trt> {
        self.branch_sets.keys().cloned().collect()
    }

    /// The available ground-motion models for every region.
    #[must_use]
    pub fn values(&self) -> BTreeMap<Trt, Vec<String>> {
        self.branch_sets
            .iter()
            .map(|(trt, branches)| {
                (
                    trt.clone(),
                    branches.iter().map(|b| b.gsim.clone()).collect(),
                )
            })
            .collect()
    }

    /// The available ground-motion models for one region.
    ///
    /// Empty if the tree has no branch set for the region.
    #[must_use]
    pub fn gsims(&self, trt: &Trt) -> Vec<String> {
        self.branch_sets
            .get(trt)
            .map(|branches| branches.iter().map(|b| b.gsim.clone()).collect())
            .unwrap_or_default()
    }

    /// A copy of the tree restricted to the given regions.
    #[must_use]
    pub fn filter(&self, trts: &BTreeSet<Trt>) -> Self {
        Self {
            branch_sets: self
                .branch_sets
                .iter()
                .filter(|(trt, _)| trts.contains(*trt))
                .map(|(trt, branches)| (trt.clone(), branches.clone()))
                .collect(),
        }
    }

    /// Number of distinct paths through the tree.
    #[must_use]
    pub fn num_paths(&self) -> usize {
        self.branch_sets.values().map(Vec::len).product()
    }

    /// Enumerates every path through the tree.
    ///
    /// The last region varies fastest. A tree without branch sets has a
    /// single, empty path of weight one.
    #[must_use]
    pub fn iter(&self) -> Paths<'_> {
        Paths {
            tree: self,
            cursor: Some(vec![0; self.branch_sets.len()]),
        }
    }

    /// Draws one path at random, picking each region's branch with a
    /// probability equal to its weight.
    ///
    /// Sampled paths carry no weight.
    pub fn sample_one<R: Rng>(&self, rng: &mut R) -> GsimRealization {
        let mut gsim_by_trt = BTreeMap::new();
        let mut path = Vec::with_capacity(self.branch_sets.len());
        for (trt, branches) in &self.branch_sets {
            let draw: f64 = rng.random();
            let mut cumulative = 0.0;
            let chosen = branches
                .iter()
                .find(|branch| {
                    cumulative += branch.weight;
                    draw < cumulative
                })
                .or_else(|| branches.last());
            if let Some(branch) = chosen {
                gsim_by_trt.insert(trt.clone(), branch.gsim.clone());
                path.push(branch.id.clone());
            }
        }
        GsimRealization {
            gsim_by_trt,
            weight: None,
            path,
        }
    }

    fn realization_at(&self, indices: &[usize]) -> GsimRealization {
        let mut gsim_by_trt = BTreeMap::new();
        let mut path = Vec::with_capacity(indices.len());
        let mut weight = 1.0;
        for ((trt, branches), &i) in self.branch_sets.iter().zip(indices) {
            let branch = &branches[i];
            gsim_by_trt.insert(trt.clone(), branch.gsim.clone());
            path.push(branch.id.clone());
            weight *= branch.weight;
        }
        GsimRealization {
            gsim_by_trt,
            weight: Some(weight),
            path,
        }
    }
}

impl TryFrom<BTreeMap<Trt, Vec<GsimBranch>>> for GsimLogicTree {
    type Error = LogicTreeError;

    fn try_from(value: BTreeMap<Trt, Vec<GsimBranch>>) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<GsimLogicTree> for BTreeMap<Trt, Vec<GsimBranch>> {
    fn from(tree: GsimLogicTree) -> Self {
        tree.branch_sets
    }
}

impl<'a> IntoIterator for &'a GsimLogicTree {
    type Item = GsimRealization;
    type IntoIter = Paths<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Iterator over every path of a [`GsimLogicTree`].
///
/// Created by [`GsimLogicTree::iter`].
#[derive(Debug, Clone)]
pub struct Paths<'a> {
    tree: &'a GsimLogicTree,
    cursor: Option<Vec<usize>>,
}

impl Iterator for Paths<'_> {
    type Item = GsimRealization;

    fn next(&mut self) -> Option<Self::Item> {
        let indices = self.cursor.take()?;
        let realization = self.tree.realization_at(&indices);

        // odometer increment, last region fastest
        let mut next = indices;
        let sizes: Vec<usize> = self.tree.branch_sets.values().map(Vec::len).collect();
        for position in (0..next.len()).rev() {
            next[position] += 1;
            if next[position] < sizes[position] {
                self.cursor = Some(next);
                break;
            }
            next[position] = 0;
        }

        Some(realization)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use rand::{SeedableRng, rngs::StdRng};

    use super::*;

    pub(crate) fn trt(label: &str) -> Trt {
        Trt::new(label).unwrap()
    }

    pub(crate) fn branch(id: &str, gsim: &str, weight: f64) -> GsimBranch {
        GsimBranch {
            id: id.to_string(),
            gsim: gsim.to_string(),
            weight,
        }
    }

    pub(crate) fn two_region_tree() -> GsimLogicTree {
        GsimLogicTree::new(BTreeMap::from([
            (
                trt("Active Shallow Crust"),
                vec![
                    branch("BA2008", "BooreAtkinson2008", 0.6),
                    branch("CB2008", "CampbellBozorgnia2008", 0.4),
                ],
            ),
            (
                trt("Stable Continental"),
                vec![
                    branch("C2003", "Campbell2003", 0.5),
                    branch("T2002", "ToroEtAl2002", 0.5),
                ],
            ),
        ]))
        .unwrap()
    }

    #[test]
    fn enumerates_cartesian_product_in_order() {
        let tree = two_region_tree();
        let paths: Vec<_> = tree.iter().map(|r| r.path.join("_")).collect();
        assert_eq!(
            paths,
            vec!["BA2008_C2003", "BA2008_T2002", "CB2008_C2003", "CB2008_T2002"]
        );
        assert_eq!(tree.num_paths(), 4);

        let total: f64 = tree.iter().filter_map(|r| r.weight).sum();
        assert!((total - 1.0).abs() < 1e-12);
    }

    #[test]
    fn enumeration_assigns_gsim_per_region() {
        let tree = two_region_tree();
        let last = tree.iter().last().unwrap();
        assert_eq!(last.gsim_by_trt["Active Shallow Crust"], "CampbellBozorgnia2008");
        assert_eq!(last.gsim_by_trt["Stable Continental"], "ToroEtAl2002");
        assert!((last.weight.unwrap() - 0.2).abs() < 1e-12);
    }

    #[test]
    fn empty_tree_has_one_empty_path() {
        let tree = GsimLogicTree::default();
        let paths: Vec<_> = tree.iter().collect();
        assert_eq!(paths.len(), 1);
        assert!(paths[0].path.is_empty());
        assert_eq!(tree.num_paths(), 1);
    }

    #[test]
    fn filter_keeps_only_requested_regions() {
        let tree = two_region_tree();
        let reduced = tree.filter(&BTreeSet::from([trt("Stable Continental")]));
        assert_eq!(reduced.filter_keys(), BTreeSet::from([trt("Stable Continental")]));
        assert_eq!(reduced.num_paths(), 2);
        assert_eq!(
            reduced.gsims(&trt("Stable Continental")),
            vec!["Campbell2003", "ToroEtAl2002"]
        );
        assert!(reduced.gsims(&trt("Active Shallow Crust")).is_empty());
    }

    #[test]
    fn sampling_is_reproducible_and_unweighted() {
        let tree = two_region_tree();
        let first = tree.sample_one(&mut StdRng::seed_from_u64(42));
        let second = tree.sample_one(&mut StdRng::seed_from_u64(42));
        assert_eq!(first, second);
        assert_eq!(first.weight, None);
        assert_eq!(first.path.len(), 2);
    }

    #[test]
    fn rejects_bad_weights() {
        let error = GsimLogicTree::new(BTreeMap::from([(
            trt("Active Shallow Crust"),
            vec![branch("a", "A", 0.5), branch("b", "B", 0.2)],
        )]))
        .unwrap_err();
        assert!(matches!(error, LogicTreeError::InvalidWeights { .. }));
    }

    #[test]
    fn rejects_empty_branch_set_and_duplicate_ids() {
        let empty = GsimLogicTree::new(BTreeMap::from([(trt("X"), vec![])]));
        assert_eq!(empty, Err(LogicTreeError::EmptyBranchSet(trt("X"))));

        let duplicated = GsimLogicTree::new(BTreeMap::from([(
            trt("X"),
            vec![branch("a", "A", 0.5), branch("a", "B", 0.5)],
        )]));
        assert_eq!(
            duplicated,
            Err(LogicTreeError::DuplicatedBranchId("a".to_string()))
        );
    }

    #[test]
    fn source_model_weights_must_sum_to_one() {
        let branch = |name: &str, weight| SourceModelBranch {
            name: name.to_string(),
            weight: Some(weight),
            path: vec![name.to_string()],
        };
        assert!(SourceModelLogicTree::new(vec![branch("a", 0.6), branch("b", 0.4)]).is_ok());
        assert_eq!(
            SourceModelLogicTree::new(vec![branch("a", 0.6), branch("b", 0.6)]),
            Err(LogicTreeError::InvalidSourceModelWeights(1.2))
        );
    }

    #[test]
    fn deserializes_from_yaml_map() {
        let yaml = "
Active Shallow Crust:
  - { id: b1, gsim: BooreAtkinson2008, weight: 1.0 }
";
        let tree: GsimLogicTree = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(tree.num_paths(), 1);
        let bad = "X:\n  - { id: b1, gsim: A, weight: 0.3 }\n";
        assert!(serde_yaml::from_str::<GsimLogicTree>(bad).is_err());
    }
}
