use rand::RngCore;

use crate::error::{PompError, Result};
use crate::params::ParamVector;
use crate::process::{Flow, Flows, Process};
use crate::state::{State, StateLayout};

use super::{check_seed, initial_counts, susceptible_fraction};

const H: usize = 0;

/// SEIR whose latent period is split into `m` exponential stages
/// `E1..Em`, each left at rate `m·mu_EI`, so the total latent period is
/// Gamma distributed with shape `m` and mean `1/mu_EI`.
///
/// Layout: `S, E1..Em, I, R`. `H` counts new infections (S → E1).
#[derive(Debug, Clone)]
pub struct GammaChain {
    beta: f64,
    stage_rate: f64,
    mu_ir: f64,
    stages: usize,
    population: u64,
    eta: f64,
    initial_infected: u64,
    layout: StateLayout,
    flows: Flows,
}

impl GammaChain {
    pub fn new(params: &ParamVector, stages: usize, initial_infected: u64) -> Result<Self> {
        if stages == 0 {
            return Err(PompError::config("a gamma chain needs at least one stage"));
        }
        let population = params.population("N")?;
        check_seed(population, initial_infected)?;

        let (s, i, r) = (0, stages + 1, stages + 2);
        let mut flows = vec![Flow::new(s, 1).counted_by(H)];
        flows.extend((1..=stages).map(|e| Flow::new(e, e + 1)));
        flows.push(Flow::new(i, r));

        let compartments = std::iter::once("S".to_string())
            .chain((1..=stages).map(|e| format!("E{e}")))
            .chain(["I".to_string(), "R".to_string()]);

        Ok(Self {
            beta: params.rate("Beta")?,
            stage_rate: stages as f64 * params.rate("mu_EI")?,
            mu_ir: params.rate("mu_IR")?,
            stages,
            population,
            eta: susceptible_fraction(params)?,
            initial_infected,
            layout: StateLayout::new(compartments, ["H"]),
            flows: Flows::new(stages + 3, flows),
        })
    }

    fn infectious(&self) -> usize {
        self.stages + 1
    }
}

impl Process for GammaChain {
    fn layout(&self) -> &StateLayout {
        &self.layout
    }

    fn flows(&self) -> &Flows {
        &self.flows
    }

    fn rates(&self, counts: &[f64], _t: f64, rates: &mut [f64]) {
        rates[0] = self.beta * counts[self.infectious()] / self.population as f64;
        rates[1..=self.stages].fill(self.stage_rate);
        rates[self.stages + 1] = self.mu_ir;
    }

    fn population(&self) -> u64 {
        self.population
    }

    fn initialize(&self, _rng: &mut dyn RngCore) -> State {
        let i = self.infectious();
        State::new(
            initial_counts(
                self.stages + 3,
                self.population,
                self.eta,
                (0, i, i + 1),
                self.initial_infected,
            ),
            1,
        )
    }
}

#[cfg(test)]
mod tests {
    use rand::{SeedableRng, rngs::StdRng};

    use super::*;

    #[test]
    fn test_layout() {
        let params = ParamVector::from([
            ("Beta", 1.0),
            ("mu_EI", 0.5),
            ("mu_IR", 0.5),
            ("N", 100.0),
        ]);
        let chain = GammaChain::new(&params, 3, 1).unwrap();
        assert_eq!(
            chain.layout().compartments,
            vec!["S", "E1", "E2", "E3", "I", "R"]
        );
        assert_eq!(chain.flows().len(), 5);
        let mut rng = StdRng::seed_from_u64(0);
        assert_eq!(chain.initialize(&mut rng).counts, vec![99, 0, 0, 0, 1, 0]);
        assert!(GammaChain::new(&params, 0, 1).is_err());
    }

    #[test]
    fn test_mean_latent_period() {
        // Track a cohort through the chain with no onward transmission.
        let params = ParamVector::from([
            ("Beta", 0.0),
            ("mu_EI", 0.5),
            ("mu_IR", 0.0),
            ("N", 20000.0),
        ]);
        let stages = 4;
        let chain = GammaChain::new(&params, stages, 0).unwrap();
        let mut rng = StdRng::seed_from_u64(8675309);
        let mut state = State::new(vec![0, 20000, 0, 0, 0, 0, 0], 1);
        let dt = 0.01;
        let mut weighted_onsets = 0.0;
        let mut previous = 0;
        for step in 1..=4000 {
            chain.step(&mut state, step as f64 * dt, dt, &mut rng);
            let onsets = state.counts[stages + 1] - previous;
            weighted_onsets += onsets as f64 * step as f64 * dt;
            previous = state.counts[stages + 1];
        }
        let mean = weighted_onsets / previous as f64;
        assert!((mean - 2.0).abs() < 0.05, "mean latent period {mean}");
    }
}
