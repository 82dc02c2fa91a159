use rand::RngCore;

use crate::error::Result;
use crate::params::ParamVector;
use crate::process::{Flow, Flows, Process};
use crate::state::{State, StateLayout};

use super::{check_seed, initial_counts, susceptible_fraction};

const S: usize = 0;
const I: usize = 1;
const R: usize = 2;
const H: usize = 0;

/// Susceptible → Infected → Recovered, with `H` counting new infections.
///
/// Parameters: `Beta`, `mu_IR`, `N`, optional `eta`.
#[derive(Debug, Clone)]
pub struct Sir {
    beta: f64,
    mu_ir: f64,
    population: u64,
    eta: f64,
    initial_infected: u64,
    layout: StateLayout,
    flows: Flows,
}

impl Sir {
    pub fn new(params: &ParamVector, initial_infected: u64) -> Result<Self> {
        let population = params.population("N")?;
        check_seed(population, initial_infected)?;
        Ok(Self {
            beta: params.rate("Beta")?,
            mu_ir: params.rate("mu_IR")?,
            population,
            eta: susceptible_fraction(params)?,
            initial_infected,
            layout: StateLayout::new(["S", "I", "R"], ["H"]),
            flows: Flows::new(3, vec![Flow::new(S, I).counted_by(H), Flow::new(I, R)]),
        })
    }

    /// Basic reproduction number `Beta / mu_IR`.
    pub fn r0(&self) -> f64 {
        self.beta / self.mu_ir
    }
}

impl Process for Sir {
    fn layout(&self) -> &StateLayout {
        &self.layout
    }

    fn flows(&self) -> &Flows {
        &self.flows
    }

    fn rates(&self, counts: &[f64], _t: f64, rates: &mut [f64]) {
        rates[0] = self.beta * counts[I] / self.population as f64;
        rates[1] = self.mu_ir;
    }

    fn population(&self) -> u64 {
        self.population
    }

    fn initialize(&self, _rng: &mut dyn RngCore) -> State {
        State::new(
            initial_counts(3, self.population, self.eta, (S, I, R), self.initial_infected),
            1,
        )
    }
}
