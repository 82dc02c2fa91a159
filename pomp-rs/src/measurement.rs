//! Measurement models: the probability of a reported count given the latent
//! state.
//!
//! Densities are evaluated in log space. Which state variable reports are
//! conditioned on, and the small offset added to the reporting mean, are
//! per-model configuration.

use rand::{RngCore, distr::Distribution};
use rand_distr::{Gamma, Poisson};
use serde::{Deserialize, Serialize};
use statrs::distribution::{self as sd, Discrete};

use crate::error::Result;
use crate::params::ParamVector;
use crate::process::binomial_draw;
use crate::state::{State, StateLayout};

/// State variable a report is generated from, by name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Observable {
    Accumulator(String),
    Compartment(String),
}

impl Observable {
    pub fn resolve(&self, layout: &StateLayout) -> Result<ObservableIndex> {
        Ok(match self {
            Observable::Accumulator(name) => ObservableIndex::Accumulator(layout.accumulator(name)?),
            Observable::Compartment(name) => ObservableIndex::Compartment(layout.compartment(name)?),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObservableIndex {
    Accumulator(usize),
    Compartment(usize),
}

impl ObservableIndex {
    pub fn value(&self, state: &State) -> u64 {
        match *self {
            ObservableIndex::Accumulator(i) => state.accumulators[i],
            ObservableIndex::Compartment(i) => state.counts[i],
        }
    }
}

/// Reporting distribution family, as named in configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DensityKind {
    /// `Poisson(rho·H + offset)`. Parameters: `rho`.
    Poisson,
    /// `Binomial(H, rho)`. Parameters: `rho`.
    Binomial,
    /// Mean `m = rho·H + offset`, variance `m + m²/psi`. Parameters: `rho`, `psi`.
    NegBinomialSize,
    /// Mean `m = rho·H + offset`, variance `m·(1 + k·m)`. Parameters: `rho`, `k`.
    NegBinomialK,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Density {
    Poisson { rho: f64 },
    Binomial { rho: f64 },
    NegBinomial { rho: f64, size: f64 },
}

impl Density {
    pub fn from_params(kind: DensityKind, params: &ParamVector) -> Result<Self> {
        let rho = params.probability("rho")?;
        Ok(match kind {
            DensityKind::Poisson => Density::Poisson { rho },
            DensityKind::Binomial => Density::Binomial { rho },
            DensityKind::NegBinomialSize => Density::NegBinomial {
                rho,
                size: params.positive("psi")?,
            },
            DensityKind::NegBinomialK => Density::NegBinomial {
                rho,
                size: 1.0 / params.positive("k")?,
            },
        })
    }
}

fn one_point_log_mass(observed: u64) -> f64 {
    if observed == 0 { 0.0 } else { f64::NEG_INFINITY }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct MeasurementConfig {
    pub distribution: DensityKind,
    /// Defaults to the process variant's usual observable.
    #[serde(default)]
    pub observable: Option<Observable>,
    /// Added to the reporting mean; ignored by the binomial family.
    #[serde(default)]
    pub offset: f64,
}

/// A bound measurement model.
#[derive(Debug, Clone, PartialEq)]
pub struct MeasurementModel {
    pub density: Density,
    pub observable: ObservableIndex,
    pub offset: f64,
}

impl MeasurementModel {
    pub fn new(density: Density, observable: ObservableIndex, offset: f64) -> Self {
        Self {
            density,
            observable,
            offset,
        }
    }

    pub fn log_density(&self, observed: u64, state: &State) -> f64 {
        measurement_log_density(observed, self.observable.value(state), self)
    }

    pub fn sample(&self, state: &State, rng: &mut dyn RngCore) -> u64 {
        measurement_sample(self.observable.value(state), self, rng)
    }
}

/// Log probability of reporting `observed` cases when the true quantity is
/// `incidence`. Returns negative infinity for impossible reports.
pub fn measurement_log_density(observed: u64, incidence: u64, model: &MeasurementModel) -> f64 {
    let h = incidence as f64;
    match model.density {
        Density::Poisson { rho } => {
            let mean = rho * h + model.offset;
            if !(mean > 0.0) {
                return one_point_log_mass(observed);
            }
            sd::Poisson::new(mean).map_or(f64::NEG_INFINITY, |d| d.ln_pmf(observed))
        }
        Density::Binomial { rho } => {
            if observed > incidence {
                return f64::NEG_INFINITY;
            }
            sd::Binomial::new(rho, incidence).map_or(f64::NEG_INFINITY, |d| d.ln_pmf(observed))
        }
        Density::NegBinomial { rho, size } => {
            let mean = rho * h + model.offset;
            if !(mean > 0.0) {
                return one_point_log_mass(observed);
            }
            sd::NegativeBinomial::new(size, size / (size + mean))
                .map_or(f64::NEG_INFINITY, |d| d.ln_pmf(observed))
        }
    }
}

/// Draw a report given the true quantity `incidence`.
pub fn measurement_sample(incidence: u64, model: &MeasurementModel, rng: &mut dyn RngCore) -> u64 {
    let h = incidence as f64;
    match model.density {
        Density::Poisson { rho } => poisson_draw(rho * h + model.offset, rng),
        Density::Binomial { rho } => binomial_draw(incidence, rho, rng),
        Density::NegBinomial { rho, size } => {
            let mean = rho * h + model.offset;
            if !(mean > 0.0) {
                return 0;
            }
            // Gamma-Poisson mixture.
            let lambda: f64 = Gamma::new(size, mean / size).map_or(mean, |g| g.sample(rng));
            poisson_draw(lambda, rng)
        }
    }
}

fn poisson_draw(mean: f64, rng: &mut dyn RngCore) -> u64 {
    if !(mean > 0.0) {
        return 0;
    }
    Poisson::new(mean).map_or(0, |d| {
        let draw: f64 = d.sample(rng);
        draw as u64
    })
}
