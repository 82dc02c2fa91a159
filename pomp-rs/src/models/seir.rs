use rand::RngCore;

use crate::error::Result;
use crate::params::ParamVector;
use crate::process::{Flow, Flows, Process};
use crate::state::{State, StateLayout};

use super::{check_seed, initial_counts, susceptible_fraction};

const S: usize = 0;
const E: usize = 1;
const I: usize = 2;
const R: usize = 3;
const N_EI: usize = 0;
const N_IR: usize = 1;

/// SIR with a latent (exposed, not yet infectious) class.
///
/// Parameters: `Beta`, `mu_EI`, `mu_IR`, `N`, optional `eta`. Accumulators
/// `N_EI` and `N_IR` count onsets of infectiousness and removals.
#[derive(Debug, Clone)]
pub struct Seir {
    beta: f64,
    mu_ei: f64,
    mu_ir: f64,
    population: u64,
    eta: f64,
    initial_infected: u64,
    layout: StateLayout,
    flows: Flows,
}

impl Seir {
    pub fn new(params: &ParamVector, initial_infected: u64) -> Result<Self> {
        let population = params.population("N")?;
        check_seed(population, initial_infected)?;
        Ok(Self {
            beta: params.rate("Beta")?,
            mu_ei: params.rate("mu_EI")?,
            mu_ir: params.rate("mu_IR")?,
            population,
            eta: susceptible_fraction(params)?,
            initial_infected,
            layout: StateLayout::new(["S", "E", "I", "R"], ["N_EI", "N_IR"]),
            flows: Flows::new(
                4,
                vec![
                    Flow::new(S, E),
                    Flow::new(E, I).counted_by(N_EI),
                    Flow::new(I, R).counted_by(N_IR),
                ],
            ),
        })
    }
}

impl Process for Seir {
    fn layout(&self) -> &StateLayout {
        &self.layout
    }

    fn flows(&self) -> &Flows {
        &self.flows
    }

    fn rates(&self, counts: &[f64], _t: f64, rates: &mut [f64]) {
        rates[0] = self.beta * counts[I] / self.population as f64;
        rates[1] = self.mu_ei;
        rates[2] = self.mu_ir;
    }

    fn population(&self) -> u64 {
        self.population
    }

    fn initialize(&self, _rng: &mut dyn RngCore) -> State {
        State::new(
            initial_counts(4, self.population, self.eta, (S, I, R), self.initial_infected),
            2,
        )
    }
}
