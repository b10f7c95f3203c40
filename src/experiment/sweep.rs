//! One-dimensional hyperparameter sweeps

use super::{ModelFamily, ModelParams};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Hyperparameter varied by a sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SweepAxis {
    /// RAT region and leaf units, set jointly
    NumSumRegion,
    /// RAT region graph depth
    RgDepth,
    /// RAT region graph replicas
    RgReplicas,
    /// HCLT latent states
    Latents,
}

impl SweepAxis {
    /// Report key of this axis.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::NumSumRegion => "num_sum_region",
            Self::RgDepth => "rg_depth",
            Self::RgReplicas => "rg_replicas",
            Self::Latents => "latents",
        }
    }

    /// Family whose parameters this axis varies.
    #[must_use]
    pub const fn family(self) -> ModelFamily {
        match self {
            Self::NumSumRegion | Self::RgDepth | Self::RgReplicas => ModelFamily::Rat,
            Self::Latents => ModelFamily::Hclt,
        }
    }

    /// `base` with this axis set to `value`.
    ///
    /// # Errors
    /// Returns error if `base` belongs to another family
    pub fn apply(self, base: ModelParams, value: usize) -> Result<ModelParams> {
        match (self, base) {
            (Self::NumSumRegion, ModelParams::Rat(mut p)) => {
                p.num_nodes_region = value;
                p.num_nodes_leaf = value;
                Ok(ModelParams::Rat(p))
            }
            (Self::RgDepth, ModelParams::Rat(mut p)) => {
                p.rg_depth = value;
                Ok(ModelParams::Rat(p))
            }
            (Self::RgReplicas, ModelParams::Rat(mut p)) => {
                p.rg_replicas = value;
                Ok(ModelParams::Rat(p))
            }
            (Self::Latents, ModelParams::Hclt(mut p)) => {
                p.latents = value;
                Ok(ModelParams::Hclt(p))
            }
            (axis, base) => Err(Error::Configuration(format!(
                "Sweep axis '{axis}' does not apply to {} parameters",
                base.family()
            ))),
        }
    }
}

impl fmt::Display for SweepAxis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Values taken by one axis, in sweep order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sweep {
    /// Varied hyperparameter
    pub axis: SweepAxis,
    /// Values, in order
    pub values: Vec<usize>,
}

impl Sweep {
    /// Sweep `axis` over `values`.
    #[must_use]
    pub const fn new(axis: SweepAxis, values: Vec<usize>) -> Self {
        Self { axis, values }
    }
}

/// Sweeps of one family around shared defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepPlan {
    base: ModelParams,
    sweeps: Vec<Sweep>,
}

impl SweepPlan {
    /// Plan varying `base` along each sweep in turn.
    ///
    /// # Errors
    /// Returns error if a sweep's axis belongs to another family or a sweep is empty
    pub fn new(base: ModelParams, sweeps: Vec<Sweep>) -> Result<Self> {
        for sweep in &sweeps {
            if sweep.axis.family() != base.family() {
                return Err(Error::Configuration(format!(
                    "Sweep axis '{}' belongs to {}, plan is for {}",
                    sweep.axis,
                    sweep.axis.family(),
                    base.family()
                )));
            }
            if sweep.values.is_empty() {
                return Err(Error::Configuration(format!(
                    "Sweep over '{}' has no values",
                    sweep.axis
                )));
            }
        }
        Ok(Self { base, sweeps })
    }

    /// Full benchmark plan of `family`.
    ///
    /// RAT varies units (jointly for regions and leaves), depth and
    /// replicas one at a time around 16 units, depth 4, 16 replicas.
    /// HCLT varies the latent state count.
    #[must_use]
    pub fn default_for(family: ModelFamily) -> Self {
        let base = ModelParams::default_for(family);
        let sweeps = match family {
            ModelFamily::Rat => vec![
                Sweep::new(SweepAxis::NumSumRegion, vec![2, 4, 8, 16, 32, 64]),
                Sweep::new(SweepAxis::RgDepth, vec![4, 5, 6, 7, 8, 9]),
                Sweep::new(SweepAxis::RgReplicas, vec![2, 4, 8, 16, 32, 64]),
            ],
            ModelFamily::Hclt => vec![Sweep::new(
                SweepAxis::Latents,
                vec![2, 4, 8, 16, 32, 64, 128],
            )],
        };
        Self { base, sweeps }
    }

    /// Family of every point in this plan.
    #[must_use]
    pub const fn family(&self) -> ModelFamily {
        self.base.family()
    }

    /// Shared defaults.
    #[must_use]
    pub const fn base(&self) -> &ModelParams {
        &self.base
    }

    /// Sweeps, in run order.
    #[must_use]
    pub fn sweeps(&self) -> &[Sweep] {
        &self.sweeps
    }

    /// Total number of points.
    #[must_use]
    pub fn num_points(&self) -> usize {
        self.sweeps.iter().map(|s| s.values.len()).sum()
    }

    /// Every point as `(axis, params)`, sweeps in order, values in order.
    ///
    /// # Errors
    /// Returns error if an axis does not apply to the base parameters
    pub fn points(&self) -> Result<Vec<(SweepAxis, ModelParams)>> {
        let mut points = Vec::with_capacity(self.num_points());
        for sweep in &self.sweeps {
            for &value in &sweep.values {
                points.push((sweep.axis, sweep.axis.apply(self.base, value)?));
            }
        }
        Ok(points)
    }
}
