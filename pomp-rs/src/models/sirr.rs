use rand::RngCore;

use crate::error::Result;
use crate::params::ParamVector;
use crate::process::{Flow, Flows, Process};
use crate::state::{State, StateLayout};

use super::{check_seed, initial_counts, susceptible_fraction};

const S: usize = 0;
const I: usize = 1;
const R1: usize = 2;
const R2: usize = 3;
const R3: usize = 4;
const H: usize = 0;

/// SIR with three recovery stages: `R1` (confined to bed), `R2`
/// (convalescent) and `R3` (fully recovered).
///
/// Parameters: `Beta`, `mu_I`, `mu_R1`, `mu_R2`, `N`, optional `eta`.
#[derive(Debug, Clone)]
pub struct Sirr {
    beta: f64,
    mu_i: f64,
    mu_r1: f64,
    mu_r2: f64,
    population: u64,
    eta: f64,
    initial_infected: u64,
    layout: StateLayout,
    flows: Flows,
}

impl Sirr {
    pub fn new(params: &ParamVector, initial_infected: u64) -> Result<Self> {
        let population = params.population("N")?;
        check_seed(population, initial_infected)?;
        Ok(Self {
            beta: params.rate("Beta")?,
            mu_i: params.rate("mu_I")?,
            mu_r1: params.rate("mu_R1")?,
            mu_r2: params.rate("mu_R2")?,
            population,
            eta: susceptible_fraction(params)?,
            initial_infected,
            layout: StateLayout::new(["S", "I", "R1", "R2", "R3"], ["H"]),
            flows: Flows::new(
                5,
                vec![
                    Flow::new(S, I).counted_by(H),
                    Flow::new(I, R1),
                    Flow::new(R1, R2),
                    Flow::new(R2, R3),
                ],
            ),
        })
    }
}

impl Process for Sirr {
    fn layout(&self) -> &StateLayout {
        &self.layout
    }

    fn flows(&self) -> &Flows {
        &self.flows
    }

    fn rates(&self, counts: &[f64], _t: f64, rates: &mut [f64]) {
        rates[0] = self.beta * counts[I] / self.population as f64;
        rates[1] = self.mu_i;
        rates[2] = self.mu_r1;
        rates[3] = self.mu_r2;
    }

    fn population(&self) -> u64 {
        self.population
    }

    fn initialize(&self, _rng: &mut dyn RngCore) -> State {
        State::new(
            initial_counts(5, self.population, self.eta, (S, I, R3), self.initial_infected),
            1,
        )
    }
}
