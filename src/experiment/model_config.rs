//! Model family and per-point configuration

use crate::circuit::{HcltParams, RatParams};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Circuit construction strategy.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    clap::ValueEnum,
)]
pub enum ModelFamily {
    /// Random region-graph circuits
    #[serde(rename = "RAT")]
    #[value(name = "RAT")]
    Rat,
    /// Hidden Chow-Liu tree circuits
    #[serde(rename = "HCLT")]
    #[value(name = "HCLT")]
    Hclt,
}

impl ModelFamily {
    /// Name as used on the command line and in report file names.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Rat => "RAT",
            Self::Hclt => "HCLT",
        }
    }
}

impl fmt::Display for ModelFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelFamily {
    type Err = Error;

    /// Case-sensitive: only `RAT` and `HCLT` are accepted.
    fn from_str(s: &str) -> Result<Self> {
        match s {
            "RAT" => Ok(Self::Rat),
            "HCLT" => Ok(Self::Hclt),
            other => Err(Error::Configuration(format!(
                "Unknown model family '{other}'\nExpected RAT or HCLT (case-sensitive)"
            ))),
        }
    }
}

/// Family-specific hyperparameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ModelParams {
    /// Randomized circuit structure
    Rat(RatParams),
    /// Hidden Chow-Liu tree structure
    Hclt(HcltParams),
}

impl ModelParams {
    /// Family these parameters build.
    #[must_use]
    pub const fn family(&self) -> ModelFamily {
        match self {
            Self::Rat(_) => ModelFamily::Rat,
            Self::Hclt(_) => ModelFamily::Hclt,
        }
    }

    /// Default parameters of `family`.
    #[must_use]
    pub fn default_for(family: ModelFamily) -> Self {
        match family {
            ModelFamily::Rat => Self::Rat(RatParams::default()),
            ModelFamily::Hclt => Self::Hclt(HcltParams::default()),
        }
    }
}

/// Everything needed to build one sweep point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelConfig {
    /// Structure hyperparameters
    pub params: ModelParams,
    /// Rows per inference batch
    pub batch_size: usize,
    /// Seed for structure and parameter initialization
    pub seed: u64,
}

impl ModelConfig {
    /// Family of this configuration.
    #[must_use]
    pub const fn family(&self) -> ModelFamily {
        self.params.family()
    }

    /// Hyperparameters as written to the report.
    #[must_use]
    pub const fn hparams(&self) -> Hparams {
        Hparams {
            params: self.params,
            batch_size: self.batch_size,
        }
    }
}

/// Report form of a point's hyperparameters: family parameters plus batch size.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Hparams {
    /// Family parameters, inlined
    #[serde(flatten)]
    pub params: ModelParams,
    /// Rows per inference batch
    pub batch_size: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_family_parse_is_case_sensitive() {
        assert_eq!("RAT".parse::<ModelFamily>().unwrap(), ModelFamily::Rat);
        assert_eq!("HCLT".parse::<ModelFamily>().unwrap(), ModelFamily::Hclt);
        assert!(matches!(
            "rat".parse::<ModelFamily>(),
            Err(Error::Configuration(_))
        ));
        assert!("FOO".parse::<ModelFamily>().is_err());
    }

    #[test]
    fn test_hparams_are_flat() {
        let config = ModelConfig {
            params: ModelParams::default_for(ModelFamily::Rat),
            batch_size: 512,
            seed: 42,
        };
        let json = serde_json::to_value(config.hparams()).unwrap();
        assert_eq!(json["rg_depth"], 4);
        assert_eq!(json["num_nodes_region"], 16);
        assert_eq!(json["batch_size"], 512);
        assert!(json.get("seed").is_none());
    }

    #[test]
    fn test_hparams_read_back() {
        let config = ModelConfig {
            params: ModelParams::default_for(ModelFamily::Hclt),
            batch_size: 64,
            seed: 42,
        };
        let text = serde_json::to_string(&config.hparams()).unwrap();
        let back: Hparams = serde_json::from_str(&text).unwrap();
        assert_eq!(back.params.family(), ModelFamily::Hclt);
        assert_eq!(back.batch_size, 64);
    }
}
