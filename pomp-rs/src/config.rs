use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::measurement::MeasurementConfig;
use crate::model::Pomp;
use crate::models::ProcessConfig;
use crate::params::ParamVector;
use crate::pfilter::ParticleFilter;
use crate::transform::ParTrans;

fn default_replicates() -> u64 {
    10
}

/// Everything needed to evaluate a likelihood: model structure, parameters,
/// filter settings and the replicate schedule.
///
/// ```toml
/// replicates = 10
/// seed = 8675309
///
/// [process]
/// kind = "sirr"
///
/// [measurement]
/// distribution = "poisson"
/// offset = 1e-6
///
/// [params]
/// Beta = 2.0
/// mu_I = 1.0
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    pub process: ProcessConfig,
    pub measurement: MeasurementConfig,
    pub params: ParamVector,
    #[serde(default)]
    pub filter: ParticleFilter,
    #[serde(default = "default_replicates")]
    pub replicates: u64,
    /// Seed for TOML-driven runs. A JSON run request supplies its own
    /// top-level `seed`, which replaces this one.
    #[serde(default)]
    pub seed: u64,
    #[serde(default)]
    pub transforms: ParTrans,
}

impl RunConfig {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        Ok(toml::from_str(s)?)
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        Self::from_toml_str(&std::fs::read_to_string(path)?)
    }

    /// Validate the parameters and bind them into a model.
    pub fn build(&self) -> Result<Pomp> {
        Pomp::build(&self.process, &self.measurement, &self.params)
    }

    /// Parameters on the optimizer's unconstrained scale.
    pub fn estimation_params(&self) -> Result<ParamVector> {
        self.transforms.to_estimation_scale(&self.params)
    }
}
