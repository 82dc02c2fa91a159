//! Compartmental model variants.
//!
//! Each variant binds its parameters at construction, after validating them,
//! and exposes its structure through [`Process`].

pub mod gamma_chain;
pub mod seir;
pub mod sir;
pub mod sirr;

use serde::{Deserialize, Serialize};

use crate::error::{PompError, Result};
use crate::measurement::Observable;
use crate::params::ParamVector;
use crate::process::Process;

pub use gamma_chain::GammaChain;
pub use seir::Seir;
pub use sir::Sir;
pub use sirr::Sirr;

fn one() -> u64 {
    1
}

/// Structural choice of model; parameters come from a [`ParamVector`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProcessConfig {
    Sir {
        #[serde(default = "one")]
        initial_infected: u64,
    },
    Seir {
        #[serde(default = "one")]
        initial_infected: u64,
    },
    Sirr {
        #[serde(default = "one")]
        initial_infected: u64,
    },
    GammaChain {
        stages: usize,
        #[serde(default = "one")]
        initial_infected: u64,
    },
}

impl ProcessConfig {
    pub fn build(&self, params: &ParamVector) -> Result<Box<dyn Process>> {
        let process: Box<dyn Process> = match *self {
            ProcessConfig::Sir { initial_infected } => {
                Box::new(Sir::new(params, initial_infected)?)
            }
            ProcessConfig::Seir { initial_infected } => {
                Box::new(Seir::new(params, initial_infected)?)
            }
            ProcessConfig::Sirr { initial_infected } => {
                Box::new(Sirr::new(params, initial_infected)?)
            }
            ProcessConfig::GammaChain {
                stages,
                initial_infected,
            } => Box::new(GammaChain::new(params, stages, initial_infected)?),
        };
        Ok(process)
    }

    /// The quantity reports are usually conditioned on for this variant.
    pub fn default_observable(&self) -> Observable {
        match self {
            ProcessConfig::Sir { .. } | ProcessConfig::GammaChain { .. } => {
                Observable::Accumulator("H".to_string())
            }
            ProcessConfig::Seir { .. } => Observable::Accumulator("N_EI".to_string()),
            ProcessConfig::Sirr { .. } => Observable::Compartment("R1".to_string()),
        }
    }
}

/// Initial susceptible fraction; absent means everyone not seeded is susceptible.
pub(crate) fn susceptible_fraction(params: &ParamVector) -> Result<f64> {
    if params.contains("eta") {
        params.probability("eta")
    } else {
        Ok(1.0)
    }
}

/// Closed-population initial counts: `S = min(round(N·eta), N - I0)`, `I0`
/// seeded infectives, the rest in the terminal removed compartment.
pub(crate) fn initial_counts(
    n_compartments: usize,
    population: u64,
    eta: f64,
    (susceptible, infected, removed): (usize, usize, usize),
    initial_infected: u64,
) -> Vec<u64> {
    let mut counts = vec![0; n_compartments];
    let s = ((population as f64 * eta).round() as u64).min(population - initial_infected);
    counts[susceptible] = s;
    counts[infected] = initial_infected;
    counts[removed] = population - s - initial_infected;
    counts
}

pub(crate) fn check_seed(population: u64, initial_infected: u64) -> Result<()> {
    if initial_infected > population {
        return Err(PompError::config(format!(
            "initial_infected ({initial_infected}) exceeds the population ({population})"
        )));
    }
    Ok(())
}
