//! Flat, batch-evaluable circuit
//!
//! Compilation drops the nested host representation in favor of one
//! contiguous edge array plus a fixed-size record per unit. Evaluation runs
//! one upward pass per row over a per-batch workspace of
//! `batch_rows x num_units` log-values, allocated through [`DeviceMemory`].

use super::{HostCircuit, Node};
use crate::backend::DeviceMemory;
use crate::dataset::Matrix;
use crate::{Error, Result};

#[cfg(feature = "rayon")]
use rayon::prelude::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Unit {
    Input { var: u32, params: u32 },
    Product { start: u32, len: u32 },
    Sum { start: u32, len: u32 },
}

/// Compiled circuit: read-only during inference.
#[derive(Debug, Clone)]
pub struct CompiledCircuit {
    units: Vec<Unit>,
    edge_child: Vec<u32>,
    edge_log_weight: Vec<f32>,
    input_params: Vec<f32>,
    /// Per input unit (indexed by params offset / `num_cats`): max log-prob and its category
    input_mode: Vec<(f32, u8)>,
    num_vars: usize,
    num_cats: usize,
    root: usize,
}

fn to_u32(value: usize, what: &str) -> Result<u32> {
    u32::try_from(value)
        .map_err(|_| Error::Backend(format!("Circuit too large to compile: {what} = {value}")))
}

impl CompiledCircuit {
    /// Lower a host circuit. Consumes it: structural stats must be taken first.
    ///
    /// # Errors
    /// Returns error if the circuit exceeds 32-bit indexing or inputs do
    /// not have between 1 and 256 categories
    pub fn compile(host: HostCircuit) -> Result<Self> {
        if host.num_cats() == 0 || host.num_cats() > usize::from(u8::MAX) + 1 {
            return Err(Error::Backend(format!(
                "Inputs with {} categories cannot be addressed by u8 values",
                host.num_cats()
            )));
        }

        let mut units = Vec::with_capacity(host.nodes().len());
        let mut edge_child = Vec::new();
        let mut edge_log_weight = Vec::new();
        let mut input_params = Vec::new();
        let mut input_mode = Vec::new();

        for node in host.nodes() {
            let unit = match node {
                Node::Input { var, log_probs } => {
                    let params = to_u32(input_params.len(), "input parameters")?;
                    input_mode.push(mode_of(log_probs));
                    input_params.extend_from_slice(log_probs);
                    Unit::Input {
                        var: to_u32(*var, "variable index")?,
                        params,
                    }
                }
                Node::Product { children } => {
                    let start = to_u32(edge_child.len(), "edges")?;
                    for &c in children {
                        edge_child.push(to_u32(c, "unit index")?);
                        edge_log_weight.push(0.0);
                    }
                    Unit::Product {
                        start,
                        len: to_u32(children.len(), "fan-in")?,
                    }
                }
                Node::Sum {
                    children,
                    log_weights,
                } => {
                    let start = to_u32(edge_child.len(), "edges")?;
                    for (&c, &w) in children.iter().zip(log_weights) {
                        edge_child.push(to_u32(c, "unit index")?);
                        edge_log_weight.push(w);
                    }
                    Unit::Sum {
                        start,
                        len: to_u32(children.len(), "fan-in")?,
                    }
                }
            };
            units.push(unit);
        }

        Ok(Self {
            units,
            edge_child,
            edge_log_weight,
            input_params,
            input_mode,
            num_vars: host.num_vars(),
            num_cats: host.num_cats(),
            root: host.root(),
        })
    }

    /// Number of units (the per-row workspace width).
    #[must_use]
    pub fn num_units(&self) -> usize {
        self.units.len()
    }

    /// Number of variables rows must provide.
    #[must_use]
    pub const fn num_vars(&self) -> usize {
        self.num_vars
    }

    /// Bytes held by the compiled arrays.
    #[must_use]
    pub fn size_bytes(&self) -> usize {
        self.units.len() * std::mem::size_of::<Unit>()
            + self.edge_child.len() * 4
            + self.edge_log_weight.len() * 4
            + self.input_params.len() * 4
            + self.input_mode.len() * std::mem::size_of::<(f32, u8)>()
    }

    fn edges(&self, start: u32, len: u32) -> impl Iterator<Item = (usize, f32)> + Clone + '_ {
        let range = start as usize..(start + len) as usize;
        self.edge_child[range.clone()]
            .iter()
            .zip(&self.edge_log_weight[range])
            .map(|(&c, &w)| (c as usize, w))
    }

    /// Upward pass for one row. `max_product` switches sums to max and
    /// unobserved inputs to their mode; otherwise unobserved inputs are
    /// marginalized (log 1).
    fn upward<F: Fn(usize) -> Option<u8>>(&self, values: &mut [f32], cell: F, max_product: bool) {
        for (id, unit) in self.units.iter().enumerate() {
            let value = match *unit {
                Unit::Input { var, params } => match cell(var as usize) {
                    Some(x) if usize::from(x) < self.num_cats => {
                        self.input_params[params as usize + usize::from(x)]
                    }
                    Some(_) => f32::NEG_INFINITY,
                    None if max_product => self.input_mode[params as usize / self.num_cats].0,
                    None => 0.0,
                },
                Unit::Product { start, len } => {
                    self.edges(start, len).map(|(c, _)| values[c]).sum()
                }
                Unit::Sum { start, len } => {
                    if max_product {
                        self.edges(start, len)
                            .map(|(c, w)| w + values[c])
                            .fold(f32::NEG_INFINITY, f32::max)
                    } else {
                        log_sum_exp(self.edges(start, len).map(|(c, w)| w + values[c]))
                    }
                }
            };
            values[id] = value;
        }
    }

    /// Top-down argmax selection after a max-product pass, filling every
    /// unobserved variable of `out` with its chosen input's mode.
    fn backtrack<F: Fn(usize) -> Option<u8>>(&self, values: &[f32], cell: F, out: &mut [u8]) {
        let mut stack = vec![self.root];
        while let Some(id) = stack.pop() {
            match self.units[id] {
                Unit::Input { var, params } => {
                    let var = var as usize;
                    if cell(var).is_none() {
                        out[var] = self.input_mode[params as usize / self.num_cats].1;
                    }
                }
                Unit::Product { start, len } => {
                    stack.extend(self.edges(start, len).map(|(c, _)| c));
                }
                Unit::Sum { start, len } => {
                    let best = self
                        .edges(start, len)
                        .max_by(|&(a, wa), &(b, wb)| (wa + values[a]).total_cmp(&(wb + values[b])))
                        .map(|(c, _)| c);
                    stack.extend(best);
                }
            }
        }
    }

    fn check_input(&self, cols: usize, batch_size: usize) -> Result<()> {
        if batch_size == 0 {
            return Err(Error::InvalidInput("Batch size must be positive".to_string()));
        }
        if cols != self.num_vars {
            return Err(Error::InvalidInput(format!(
                "Data has {cols} columns, circuit is defined over {} variables",
                self.num_vars
            )));
        }
        Ok(())
    }

    /// Log-likelihood of every fully observed row, evaluated `batch_size`
    /// rows at a time.
    ///
    /// # Errors
    /// Returns error if `batch_size` is zero or the width does not match
    pub fn log_likelihoods(
        &self,
        data: &Matrix<u8>,
        batch_size: usize,
        memory: &DeviceMemory,
    ) -> Result<Vec<f32>> {
        self.check_input(data.cols(), batch_size)?;
        let width = self.num_units();
        let cols = data.cols();
        let mut out = Vec::with_capacity(data.rows());

        for start in (0..data.rows()).step_by(batch_size) {
            let rows = data.row_range(start, batch_size);
            let mut workspace = memory.alloc_f32(rows.len() / cols * width);
            let eval = |(values, row): (&mut [f32], &[u8])| {
                self.upward(values, |v| Some(row[v]), false);
                values[self.root]
            };

            #[cfg(feature = "rayon")]
            let batch: Vec<f32> = workspace
                .par_chunks_mut(width)
                .zip(rows.par_chunks(cols))
                .map(eval)
                .collect();
            #[cfg(not(feature = "rayon"))]
            let batch: Vec<f32> = workspace
                .chunks_mut(width)
                .zip(rows.chunks(cols))
                .map(eval)
                .collect();

            out.extend(batch);
        }
        Ok(out)
    }

    /// Most probable completion of every row: observed cells are copied,
    /// unobserved cells get the MAP assignment.
    ///
    /// # Errors
    /// Returns error if `batch_size` is zero or the width does not match
    pub fn map_states(
        &self,
        data: &Matrix<Option<u8>>,
        batch_size: usize,
        memory: &DeviceMemory,
    ) -> Result<Matrix<u8>> {
        self.check_input(data.cols(), batch_size)?;
        let width = self.num_units();
        let cols = data.cols();
        let mut out: Vec<u8> = data.as_slice().iter().map(|c| c.unwrap_or(0)).collect();

        for start in (0..data.rows()).step_by(batch_size) {
            let rows = data.row_range(start, batch_size);
            let mut workspace = memory.alloc_f32(rows.len() / cols * width);
            let completed = &mut out[start * cols..start * cols + rows.len()];
            let complete = |((values, row), dst): ((&mut [f32], &[Option<u8>]), &mut [u8])| {
                self.upward(values, |v| row[v], true);
                self.backtrack(values, |v| row[v], dst);
            };

            #[cfg(feature = "rayon")]
            workspace
                .par_chunks_mut(width)
                .zip(rows.par_chunks(cols))
                .zip(completed.par_chunks_mut(cols))
                .for_each(complete);
            #[cfg(not(feature = "rayon"))]
            workspace
                .chunks_mut(width)
                .zip(rows.chunks(cols))
                .zip(completed.chunks_mut(cols))
                .for_each(complete);
        }

        Matrix::from_vec(data.rows(), cols, out)
    }
}

fn mode_of(log_probs: &[f32]) -> (f32, u8) {
    log_probs
        .iter()
        .enumerate()
        .max_by(|(_, a), (_, b)| a.total_cmp(b))
        .map_or((f32::NEG_INFINITY, 0), |(k, &p)| {
            (p, u8::try_from(k).unwrap_or(u8::MAX))
        })
}

fn log_sum_exp<I: Iterator<Item = f32> + Clone>(terms: I) -> f32 {
    let max = terms.clone().fold(f32::NEG_INFINITY, f32::max);
    if max == f32::NEG_INFINITY {
        return max;
    }
    max + terms.map(|t| (t - max).exp()).sum::<f32>().ln()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuit::{init_parameters, CircuitBuilder};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    /// Mixture of two fully factorized components over 2 binary variables.
    fn mixture() -> HostCircuit {
        let mut b = CircuitBuilder::new(2, 2);
        let a0 = b.input(0);
        let a1 = b.input(1);
        let b0 = b.input(0);
        let b1 = b.input(1);
        let p = b.product(vec![a0, a1]);
        let q = b.product(vec![b0, b1]);
        b.sum(vec![p, q]);
        let mut circuit = b.finish().unwrap();
        init_parameters(&mut circuit, 0.5, &mut StdRng::seed_from_u64(42)).unwrap();
        circuit
    }

    #[test]
    fn test_likelihoods_normalize() {
        let compiled = CompiledCircuit::compile(mixture()).unwrap();
        let all = Matrix::from_rows(&[vec![0u8, 0], vec![0, 1], vec![1, 0], vec![1, 1]]).unwrap();
        let memory = DeviceMemory::new();
        let lls = compiled.log_likelihoods(&all, 3, &memory).unwrap();
        let total: f32 = lls.iter().map(|ll| ll.exp()).sum();
        assert!((total - 1.0).abs() < 1e-5);
        // two batches: 3 rows + 1 row
        assert_eq!(memory.snapshot().allocations, 2);
    }

    #[test]
    fn test_map_keeps_observed_cells() {
        let compiled = CompiledCircuit::compile(mixture()).unwrap();
        let data = Matrix::from_rows(&[vec![Some(1u8), None], vec![None, Some(0)]]).unwrap();
        let completed = compiled.map_states(&data, 8, &DeviceMemory::new()).unwrap();
        assert_eq!(completed.get(0, 0), 1);
        assert_eq!(completed.get(1, 1), 0);
        assert!(completed.as_slice().iter().all(|&v| v < 2));
    }

    #[test]
    fn test_map_of_factorized_circuit_is_per_variable_mode() {
        let mut b = CircuitBuilder::new(3, 4);
        let inputs: Vec<_> = (0..3).map(|v| b.input(v)).collect();
        b.product(inputs);
        let mut host = b.finish().unwrap();
        init_parameters(&mut host, 0.5, &mut StdRng::seed_from_u64(7)).unwrap();
        let modes: Vec<u8> = host
            .nodes()
            .iter()
            .filter_map(|node| match node {
                Node::Input { log_probs, .. } => Some(mode_of(log_probs).1),
                _ => None,
            })
            .collect();

        let compiled = CompiledCircuit::compile(host).unwrap();
        let data = Matrix::from_rows(&[vec![None, Some(3u8), None]]).unwrap();
        let completed = compiled.map_states(&data, 4, &DeviceMemory::new()).unwrap();
        assert_eq!(completed.row(0), &[modes[0], 3, modes[2]]);
    }

    #[test]
    fn test_out_of_range_value_has_zero_likelihood() {
        let compiled = CompiledCircuit::compile(mixture()).unwrap();
        let data = Matrix::from_rows(&[vec![0u8, 5]]).unwrap();
        let lls = compiled.log_likelihoods(&data, 1, &DeviceMemory::new()).unwrap();
        assert_eq!(lls[0], f32::NEG_INFINITY);
    }

    #[test]
    fn test_rejects_wrong_width() {
        let compiled = CompiledCircuit::compile(mixture()).unwrap();
        let data = Matrix::from_rows(&[vec![0u8, 1, 1]]).unwrap();
        assert!(compiled
            .log_likelihoods(&data, 1, &DeviceMemory::new())
            .is_err());
    }

    #[test]
    fn test_rejects_zero_batch() {
        let compiled = CompiledCircuit::compile(mixture()).unwrap();
        let data = Matrix::from_rows(&[vec![0u8, 1]]).unwrap();
        assert!(compiled
            .log_likelihoods(&data, 0, &DeviceMemory::new())
            .is_err());
    }
}
