//! Chow-Liu structure learning
//!
//! Pairwise mutual information is estimated from smoothed counts, and the
//! maximum spanning tree (Prim, dense `O(F^2)`) is rooted at variable 0.

use crate::dataset::Matrix;
use crate::{Error, Result};

#[cfg(feature = "rayon")]
use rayon::prelude::*;

/// Rooted spanning tree over the variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChowLiuTree {
    parent: Vec<Option<usize>>,
    children: Vec<Vec<usize>>,
    root: usize,
}

impl ChowLiuTree {
    /// Parent of `var`, `None` for the root.
    #[must_use]
    pub fn parent(&self, var: usize) -> Option<usize> {
        self.parent[var]
    }

    /// Children of `var`, ascending.
    #[must_use]
    pub fn children(&self, var: usize) -> &[usize] {
        &self.children[var]
    }

    /// Root variable.
    #[must_use]
    pub const fn root(&self) -> usize {
        self.root
    }

    /// Number of variables.
    #[must_use]
    pub fn num_vars(&self) -> usize {
        self.parent.len()
    }

    /// Variables ordered so every child comes before its parent.
    #[must_use]
    pub fn post_order(&self) -> Vec<usize> {
        let mut order = Vec::with_capacity(self.num_vars());
        let mut stack = vec![(self.root, false)];
        while let Some((var, expanded)) = stack.pop() {
            if expanded {
                order.push(var);
            } else {
                stack.push((var, true));
                stack.extend(self.children[var].iter().rev().map(|&c| (c, false)));
            }
        }
        order
    }
}

/// Dense symmetric mutual-information matrix (row-major, `F x F`).
///
/// Values are assumed to lie in `0..num_cats`, where `num_cats` is one past
/// the largest value in `data`. `pseudocount` mass is spread uniformly over
/// the joint and marginal tables.
///
/// # Errors
/// Returns error if the dataset has no rows or `pseudocount` is negative
#[allow(clippy::cast_precision_loss)]
pub fn mutual_information(data: &Matrix<u8>, pseudocount: f64) -> Result<Vec<f64>> {
    if data.rows() == 0 {
        return Err(Error::InvalidInput(
            "Structure learning needs at least one row".to_string(),
        ));
    }
    if pseudocount < 0.0 {
        return Err(Error::InvalidInput(format!(
            "Pseudocount must be non-negative, got {pseudocount}"
        )));
    }

    let f = data.cols();
    let k = data.as_slice().iter().copied().max().map_or(1, |m| usize::from(m) + 1);
    let n = data.rows() as f64;
    let denom = n + pseudocount;

    let marginals: Vec<Vec<f64>> = (0..f)
        .map(|j| {
            let mut counts = vec![0.0; k];
            for value in data.column(j) {
                counts[usize::from(value)] += 1.0;
            }
            counts
                .into_iter()
                .map(|c| (c + pseudocount / k as f64) / denom)
                .collect()
        })
        .collect();

    let row_mi = |i: usize| -> Vec<f64> {
        let mut row = vec![0.0; f];
        for (j, slot) in row.iter_mut().enumerate().skip(i + 1) {
            let mut joint = vec![0.0; k * k];
            for r in data.iter_rows() {
                joint[usize::from(r[i]) * k + usize::from(r[j])] += 1.0;
            }
            let smooth = pseudocount / (k * k) as f64;
            let mut mi = 0.0;
            for a in 0..k {
                for b in 0..k {
                    let pxy = (joint[a * k + b] + smooth) / denom;
                    if pxy > 0.0 {
                        mi += pxy * (pxy / (marginals[i][a] * marginals[j][b])).ln();
                    }
                }
            }
            *slot = mi;
        }
        row
    };

    #[cfg(feature = "rayon")]
    let upper: Vec<Vec<f64>> = (0..f).into_par_iter().map(row_mi).collect();
    #[cfg(not(feature = "rayon"))]
    let upper: Vec<Vec<f64>> = (0..f).map(row_mi).collect();

    let mut mi = vec![0.0; f * f];
    for (i, row) in upper.iter().enumerate() {
        for j in i + 1..f {
            mi[i * f + j] = row[j];
            mi[j * f + i] = row[j];
        }
    }
    Ok(mi)
}

/// Learn the maximum mutual-information spanning tree of `data`.
///
/// # Errors
/// Returns error if the dataset has no columns or no rows
pub fn chow_liu_tree(data: &Matrix<u8>, pseudocount: f64) -> Result<ChowLiuTree> {
    let f = data.cols();
    if f == 0 {
        return Err(Error::InvalidInput(
            "Structure learning needs at least one column".to_string(),
        ));
    }
    let mi = mutual_information(data, pseudocount)?;

    // Prim's algorithm on the dense graph, maximizing weight
    let mut in_tree = vec![false; f];
    let mut best = vec![f64::NEG_INFINITY; f];
    let mut parent = vec![None; f];
    best[0] = 0.0;

    for _ in 0..f {
        let Some(u) = (0..f)
            .filter(|&v| !in_tree[v])
            .max_by(|&a, &b| best[a].total_cmp(&best[b]).then(b.cmp(&a)))
        else {
            break;
        };
        in_tree[u] = true;
        for v in 0..f {
            if !in_tree[v] && mi[u * f + v] > best[v] {
                best[v] = mi[u * f + v];
                parent[v] = Some(u);
            }
        }
    }

    let mut children = vec![Vec::new(); f];
    for (v, p) in parent.iter().enumerate() {
        if let Some(p) = *p {
            children[p].push(v);
        }
    }

    Ok(ChowLiuTree {
        parent,
        children,
        root: 0,
    })
}
