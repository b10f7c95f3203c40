//! Perturbed parameter initialization

use super::{HostCircuit, Node};
use crate::{Error, Result};
use rand::Rng;

/// Draw a normalized log-distribution of `len` entries, each proportional
/// to `1 - perturbation * u` with `u ~ U[0, 1)`.
///
/// `perturbation == 0` gives the uniform distribution.
pub fn perturbed_log_distribution<R: Rng + ?Sized>(
    rng: &mut R,
    len: usize,
    perturbation: f32,
) -> Vec<f32> {
    let raw: Vec<f32> = (0..len)
        .map(|_| perturbation.mul_add(-rng.gen::<f32>(), 1.0))
        .collect();
    let total: f32 = raw.iter().sum();
    let log_total = total.ln();
    raw.into_iter().map(|w| w.ln() - log_total).collect()
}

/// Re-draw every input table and sum weight vector away from uniform.
///
/// Nodes are visited in topological order, so a given seed always yields
/// the same parameters for the same structure.
///
/// # Errors
/// Returns error if `perturbation` is outside `[0, 1)`
pub fn init_parameters<R: Rng + ?Sized>(
    circuit: &mut HostCircuit,
    perturbation: f32,
    rng: &mut R,
) -> Result<()> {
    if !(0.0..1.0).contains(&perturbation) {
        return Err(Error::InvalidInput(format!(
            "Parameter perturbation must be in [0, 1), got {perturbation}"
        )));
    }

    for node in circuit.nodes_mut() {
        match node {
            Node::Input { log_probs, .. } => {
                *log_probs = perturbed_log_distribution(rng, log_probs.len(), perturbation);
            }
            Node::Sum { log_weights, .. } => {
                *log_weights = perturbed_log_distribution(rng, log_weights.len(), perturbation);
            }
            Node::Product { .. } => {}
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuit::CircuitBuilder;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_distribution_normalized() {
        let mut rng = StdRng::seed_from_u64(42);
        let dist = perturbed_log_distribution(&mut rng, 16, 0.5);
        let total: f32 = dist.iter().map(|w| w.exp()).sum();
        assert!((total - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_zero_perturbation_is_uniform() {
        let mut rng = StdRng::seed_from_u64(0);
        let dist = perturbed_log_distribution(&mut rng, 4, 0.0);
        for w in dist {
            assert!((w - 0.25f32.ln()).abs() < 1e-6);
        }
    }

    #[test]
    fn test_init_rejects_full_perturbation() {
        let mut b = CircuitBuilder::new(1, 2);
        b.input(0);
        let mut circuit = b.finish().unwrap();
        let mut rng = StdRng::seed_from_u64(42);
        assert!(init_parameters(&mut circuit, 1.0, &mut rng).is_err());
    }
}
