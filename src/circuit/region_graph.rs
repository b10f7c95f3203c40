//! Random binary region graphs
//!
//! Each replica shuffles the variables once and then halves the ordering
//! recursively. A region either is a leaf (a set of variables) or has
//! exactly one binary partition into two child regions.

use crate::{Error, Result};
use rand::seq::SliceRandom;
use rand::Rng;

/// Index of a region inside its graph
pub type RegionId = usize;

/// A set of variables, optionally split into two child regions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Region {
    /// Variables in this region's scope
    pub vars: Vec<usize>,
    /// Binary partition, `None` for leaf regions
    pub split: Option<(RegionId, RegionId)>,
}

impl Region {
    /// Whether the region has no partition.
    #[must_use]
    pub const fn is_leaf(&self) -> bool {
        self.split.is_none()
    }
}

/// Replicated random binary trees over the same variable set.
#[derive(Debug, Clone)]
pub struct RegionGraph {
    regions: Vec<Region>,
    replica_roots: Vec<RegionId>,
    num_vars: usize,
}

impl RegionGraph {
    /// Build `replicas` random trees of at most `depth` partition levels.
    ///
    /// Regions are stored children first. A single-variable region is
    /// never split, so deep graphs over few variables simply stop early.
    ///
    /// # Errors
    /// Returns error if `num_vars` or `replicas` is zero
    pub fn random_binary_trees<R: Rng + ?Sized>(
        num_vars: usize,
        depth: usize,
        replicas: usize,
        rng: &mut R,
    ) -> Result<Self> {
        if num_vars == 0 {
            return Err(Error::InvalidInput(
                "Region graph needs at least one variable".to_string(),
            ));
        }
        if replicas == 0 {
            return Err(Error::InvalidInput(
                "Region graph needs at least one replica".to_string(),
            ));
        }

        let mut graph = Self {
            regions: Vec::new(),
            replica_roots: Vec::with_capacity(replicas),
            num_vars,
        };
        let mut order: Vec<usize> = (0..num_vars).collect();
        for _ in 0..replicas {
            order.shuffle(rng);
            let root = graph.split(&order, depth);
            graph.replica_roots.push(root);
        }
        Ok(graph)
    }

    fn split(&mut self, vars: &[usize], depth: usize) -> RegionId {
        let split = if depth == 0 || vars.len() < 2 {
            None
        } else {
            let mid = vars.len() / 2;
            let left = self.split(&vars[..mid], depth - 1);
            let right = self.split(&vars[mid..], depth - 1);
            Some((left, right))
        };
        let mut scope = vars.to_vec();
        scope.sort_unstable();
        self.regions.push(Region { vars: scope, split });
        self.regions.len() - 1
    }

    /// All regions, children before parents.
    #[must_use]
    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    /// Region by id.
    #[must_use]
    pub fn region(&self, id: RegionId) -> &Region {
        &self.regions[id]
    }

    /// Root region of every replica.
    #[must_use]
    pub fn replica_roots(&self) -> &[RegionId] {
        &self.replica_roots
    }

    /// Number of variables covered by every replica.
    #[must_use]
    pub const fn num_vars(&self) -> usize {
        self.num_vars
    }

    /// Leaf regions of the whole graph.
    pub fn leaves(&self) -> impl Iterator<Item = &Region> + '_ {
        self.regions.iter().filter(|region| region.is_leaf())
    }
}
