//! Reference probabilistic circuit library
//!
//! Host-side circuits are DAGs of categorical input units, product units
//! and weighted sum units, stored in topological order (children before
//! parents). Two constructions are provided:
//!
//! - [`build_rat`]: random region graph, cross-product partitions
//! - [`build_hclt`]: Chow-Liu tree over the data with a hidden latent per variable
//!
//! A host circuit is inspected with [`HostCircuit::stats`] and then lowered
//! with [`CompiledCircuit::compile`] into flat edge arrays for batched
//! evaluation. Parameters live in the log domain throughout.

mod chow_liu;
mod compiled;
mod hclt;
mod params;
mod rat;
mod region_graph;

pub use chow_liu::{chow_liu_tree, mutual_information, ChowLiuTree};
pub use compiled::CompiledCircuit;
pub use hclt::{build_hclt, HcltParams};
pub use params::{init_parameters, perturbed_log_distribution};
pub use rat::{build_rat, RatParams};
pub use region_graph::{Region, RegionGraph, RegionId};

use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Index of a node inside its circuit
pub type NodeId = usize;

/// Categories per input unit for image pixels
pub const PIXEL_CATEGORIES: usize = 256;

/// One unit of a host circuit.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// Categorical distribution over one variable
    Input {
        /// Variable (feature column) index
        var: usize,
        /// Log-probability per category
        log_probs: Vec<f32>,
    },
    /// Factorization over children with disjoint scopes
    Product {
        /// Child node ids
        children: Vec<NodeId>,
    },
    /// Weighted mixture over children with identical scopes
    Sum {
        /// Child node ids
        children: Vec<NodeId>,
        /// Log-weight per child
        log_weights: Vec<f32>,
    },
}

/// Unit and parameter counts of a host circuit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructuralStats {
    /// Number of input (leaf) units
    pub num_inputs: u64,
    /// Number of product units
    pub num_prods: u64,
    /// Number of sum units
    pub num_sums: u64,
    /// Total learnable parameters, shared or not
    pub num_params: u64,
}

/// Host-resident circuit, prior to compilation.
#[derive(Debug, Clone)]
pub struct HostCircuit {
    nodes: Vec<Node>,
    root: NodeId,
    num_vars: usize,
    num_cats: usize,
}

impl HostCircuit {
    /// All nodes in topological order.
    #[must_use]
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Root node id (always the last node).
    #[must_use]
    pub const fn root(&self) -> NodeId {
        self.root
    }

    /// Number of variables the circuit is defined over.
    #[must_use]
    pub const fn num_vars(&self) -> usize {
        self.num_vars
    }

    /// Categories per input unit.
    #[must_use]
    pub const fn num_cats(&self) -> usize {
        self.num_cats
    }

    pub(crate) fn nodes_mut(&mut self) -> &mut [Node] {
        &mut self.nodes
    }

    /// Count units and parameters on the logical (uncompiled) graph.
    ///
    /// Every input contributes its full category table and every sum one
    /// weight per child edge.
    #[must_use]
    pub fn stats(&self) -> StructuralStats {
        let mut stats = StructuralStats::default();
        for node in &self.nodes {
            match node {
                Node::Input { log_probs, .. } => {
                    stats.num_inputs += 1;
                    stats.num_params += log_probs.len() as u64;
                }
                Node::Product { .. } => stats.num_prods += 1,
                Node::Sum { log_weights, .. } => {
                    stats.num_sums += 1;
                    stats.num_params += log_weights.len() as u64;
                }
            }
        }
        stats
    }
}

/// Incremental constructor that keeps nodes in topological order.
#[derive(Debug)]
pub struct CircuitBuilder {
    nodes: Vec<Node>,
    num_vars: usize,
    num_cats: usize,
}

impl CircuitBuilder {
    /// Start an empty circuit over `num_vars` variables with `num_cats`
    /// categories per input.
    #[must_use]
    pub const fn new(num_vars: usize, num_cats: usize) -> Self {
        Self {
            nodes: Vec::new(),
            num_vars,
            num_cats,
        }
    }

    /// Add a uniform categorical input over `var`.
    pub fn input(&mut self, var: usize) -> NodeId {
        #[allow(clippy::cast_precision_loss)]
        let uniform = -(self.num_cats as f32).ln();
        self.push(Node::Input {
            var,
            log_probs: vec![uniform; self.num_cats],
        })
    }

    /// Add a product over existing nodes.
    pub fn product(&mut self, children: Vec<NodeId>) -> NodeId {
        self.push(Node::Product { children })
    }

    /// Add a uniformly weighted sum over existing nodes.
    pub fn sum(&mut self, children: Vec<NodeId>) -> NodeId {
        #[allow(clippy::cast_precision_loss)]
        let uniform = -(children.len() as f32).ln();
        let log_weights = vec![uniform; children.len()];
        self.push(Node::Sum {
            children,
            log_weights,
        })
    }

    fn push(&mut self, node: Node) -> NodeId {
        self.nodes.push(node);
        self.nodes.len() - 1
    }

    /// Number of nodes added so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether no node was added yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Finish with the last added node as root.
    ///
    /// # Errors
    /// Returns error if the circuit is empty, an edge points forward, an
    /// inner node has no children, or an input references an unknown variable
    pub fn finish(self) -> Result<HostCircuit> {
        let root = self
            .nodes
            .len()
            .checked_sub(1)
            .ok_or_else(|| Error::Backend("Circuit has no nodes".to_string()))?;

        for (id, node) in self.nodes.iter().enumerate() {
            match node {
                Node::Input { var, .. } if *var >= self.num_vars => {
                    return Err(Error::Backend(format!(
                        "Input unit {id} references variable {var} of {}",
                        self.num_vars
                    )));
                }
                Node::Product { children } | Node::Sum { children, .. } => {
                    if children.is_empty() {
                        return Err(Error::Backend(format!("Inner unit {id} has no children")));
                    }
                    if let Some(&child) = children.iter().find(|&&child| child >= id) {
                        return Err(Error::Backend(format!(
                            "Unit {id} points to {child}, which is not earlier in topological order"
                        )));
                    }
                }
                Node::Input { .. } => {}
            }
        }

        Ok(HostCircuit {
            nodes: self.nodes,
            root,
            num_vars: self.num_vars,
            num_cats: self.num_cats,
        })
    }
}
