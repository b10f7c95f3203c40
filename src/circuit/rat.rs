//! Randomized circuits over a random binary region graph
//!
//! Region graph to circuit:
//! - leaf region: `num_nodes_leaf` units, each a product of one input per variable
//! - partition: cross product of the two child regions' units
//! - inner region: `num_nodes_region` sums over its partition's products
//! - root: a single sum over the top products of every replica

use super::{CircuitBuilder, HostCircuit, NodeId, RegionGraph, PIXEL_CATEGORIES};
use crate::{Error, Result};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Structure hyperparameters of a randomized circuit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RatParams {
    /// Sum units per inner region
    pub num_nodes_region: usize,
    /// Units per leaf region
    pub num_nodes_leaf: usize,
    /// Partition levels per replica
    pub rg_depth: usize,
    /// Independent random trees mixed at the root
    pub rg_replicas: usize,
}

impl Default for RatParams {
    fn default() -> Self {
        Self {
            num_nodes_region: 16,
            num_nodes_leaf: 16,
            rg_depth: 4,
            rg_replicas: 16,
        }
    }
}

/// Build a randomized circuit over `num_features` pixel variables with
/// [`PIXEL_CATEGORIES`] categories each.
///
/// Parameters are left uniform. The caller perturbs them afterwards.
///
/// # Errors
/// Returns error if any count is zero
pub fn build_rat<R: Rng + ?Sized>(
    num_features: usize,
    params: &RatParams,
    rng: &mut R,
) -> Result<HostCircuit> {
    if params.num_nodes_region == 0 || params.num_nodes_leaf == 0 {
        return Err(Error::InvalidInput(
            "RAT needs at least one unit per region and per leaf".to_string(),
        ));
    }

    let rg = RegionGraph::random_binary_trees(
        num_features,
        params.rg_depth,
        params.rg_replicas,
        rng,
    )?;
    let mut builder = CircuitBuilder::new(num_features, PIXEL_CATEGORIES);

    let mut top = Vec::new();
    for &root in rg.replica_roots() {
        top.extend(region_units(&rg, root, true, params, &mut builder));
    }
    builder.sum(top);
    builder.finish()
}

/// Emit the units of one region (recursively) and return their ids.
///
/// A replica root returns its products instead of summing them, since the
/// global root sum mixes them directly.
fn region_units(
    rg: &RegionGraph,
    id: usize,
    is_replica_root: bool,
    params: &RatParams,
    builder: &mut CircuitBuilder,
) -> Vec<NodeId> {
    let region = rg.region(id);
    let Some((left, right)) = region.split else {
        return (0..params.num_nodes_leaf)
            .map(|_| {
                let inputs: Vec<NodeId> = region.vars.iter().map(|&v| builder.input(v)).collect();
                if inputs.len() == 1 {
                    inputs[0]
                } else {
                    builder.product(inputs)
                }
            })
            .collect();
    };

    let left_units = region_units(rg, left, false, params, builder);
    let right_units = region_units(rg, right, false, params, builder);

    let mut products = Vec::with_capacity(left_units.len() * right_units.len());
    for &l in &left_units {
        for &r in &right_units {
            products.push(builder.product(vec![l, r]));
        }
    }

    if is_replica_root {
        return products;
    }
    (0..params.num_nodes_region)
        .map(|_| builder.sum(products.clone()))
        .collect()
}
