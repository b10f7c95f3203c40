//! Hidden Chow-Liu tree circuits
//!
//! Every variable `v` gets a latent `Z_v` with `latents` states. For state
//! `k` the unit is `input(v, k) * prod_{c in children(v)} sum_{c,k}(units of c)`,
//! where each `sum_{c,k}` mixes all latent states of child `c`. The root
//! is a single sum over the root variable's states.

use super::{chow_liu_tree, CircuitBuilder, HostCircuit, NodeId, PIXEL_CATEGORIES};
use crate::dataset::Matrix;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Hyperparameters of a hidden Chow-Liu tree circuit
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HcltParams {
    /// Latent states per variable
    pub latents: usize,
    /// Categories per input unit
    pub num_cats: usize,
    /// Smoothing mass for mutual-information estimates
    pub pseudocount: f64,
}

impl Default for HcltParams {
    fn default() -> Self {
        Self {
            latents: 16,
            num_cats: PIXEL_CATEGORIES,
            pseudocount: 0.1,
        }
    }
}

/// Learn a Chow-Liu tree over `data` and expand it into a latent circuit.
///
/// `data` is only used for structure. Parameters are left uniform and are
/// perturbed by the caller.
///
/// # Errors
/// Returns error if `latents` or `num_cats` is zero, or structure learning fails
pub fn build_hclt(data: &Matrix<u8>, params: &HcltParams) -> Result<HostCircuit> {
    if params.latents == 0 || params.num_cats == 0 {
        return Err(Error::InvalidInput(
            "HCLT needs at least one latent state and one category".to_string(),
        ));
    }

    let tree = chow_liu_tree(data, params.pseudocount)?;
    let mut builder = CircuitBuilder::new(tree.num_vars(), params.num_cats);
    let mut units: Vec<Vec<NodeId>> = vec![Vec::new(); tree.num_vars()];

    for var in tree.post_order() {
        let var_units: Vec<NodeId> = (0..params.latents)
            .map(|_| {
                let leaf = builder.input(var);
                if tree.children(var).is_empty() {
                    return leaf;
                }
                let mut factors = Vec::with_capacity(tree.children(var).len() + 1);
                factors.push(leaf);
                for &child in tree.children(var) {
                    factors.push(builder.sum(units[child].clone()));
                }
                builder.product(factors)
            })
            .collect();
        units[var] = var_units;
    }

    builder.sum(units[tree.root()].clone());
    builder.finish()
}
