//! The latent Markov process: compartments connected by flows with per-capita
//! rates, advanced by Euler-multinomial steps.

use std::fmt;

use rand::{RngCore, distr::Distribution};
use rand_distr::Binomial;

use crate::state::{State, StateLayout};

/// Movement of individuals from one compartment to another.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Flow {
    pub from: usize,
    pub to: usize,
    /// Accumulators incremented by every individual taking this flow.
    pub accumulators: Vec<usize>,
}

impl Flow {
    pub fn new(from: usize, to: usize) -> Self {
        Self {
            from,
            to,
            accumulators: Vec::new(),
        }
    }

    pub fn counted_by(mut self, accumulator: usize) -> Self {
        self.accumulators.push(accumulator);
        self
    }
}

/// The flows of a model, indexed by source compartment.
#[derive(Debug, Clone)]
pub struct Flows {
    flows: Vec<Flow>,
    by_source: Vec<Vec<usize>>,
}

impl Flows {
    pub fn new(n_compartments: usize, flows: Vec<Flow>) -> Self {
        let mut by_source = vec![Vec::new(); n_compartments];
        for (k, flow) in flows.iter().enumerate() {
            by_source[flow.from].push(k);
        }
        Self { flows, by_source }
    }

    pub fn len(&self) -> usize {
        self.flows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flows.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Flow> {
        self.flows.iter()
    }

    /// Indices of the flows leaving `source`, in declaration order.
    pub fn outgoing(&self, source: usize) -> &[usize] {
        &self.by_source[source]
    }
}

/// A closed-population compartmental model with its parameters bound.
///
/// Implementors describe structure (`layout`, `flows`) and dynamics (`rates`);
/// the provided [`Process::step`] performs the stochastic update.
pub trait Process: Send + Sync + fmt::Debug {
    fn layout(&self) -> &StateLayout;

    fn flows(&self) -> &Flows;

    /// Per-capita rate of every flow, in flow order, given compartment sizes.
    ///
    /// Rates must be finite and non-negative.
    fn rates(&self, counts: &[f64], t: f64, rates: &mut [f64]);

    /// Total population size, preserved by every step.
    fn population(&self) -> u64;

    /// Initial state; accumulators start at zero.
    fn initialize(&self, rng: &mut dyn RngCore) -> State;

    fn step(&self, state: &mut State, t: f64, dt: f64, rng: &mut dyn RngCore) {
        euler_multinomial_step(self, state, t, dt, rng);
    }
}

/// `Binomial(n, p)` with the degenerate cases handled up front.
pub fn binomial_draw(n: u64, p: f64, rng: &mut dyn RngCore) -> u64 {
    if n == 0 || !(p > 0.0) {
        0
    } else if p >= 1.0 {
        n
    } else {
        Binomial::new(n, p)
            .expect("probability lies strictly inside (0, 1)")
            .sample(rng)
    }
}

/// Probability of leaving a compartment within `dt` at total rate `rate`.
pub fn exit_probability(rate: f64, dt: f64) -> f64 {
    -(-rate * dt).exp_m1()
}

/// Split `n` individuals among competing exits with the given per-capita
/// rates over `dt`. `out[k]` receives the number taking exit `k`; the
/// remainder stays. The total never exceeds `n`.
pub fn euler_multinomial(n: u64, rates: &[f64], dt: f64, rng: &mut dyn RngCore, out: &mut [u64]) {
    debug_assert_eq!(rates.len(), out.len());
    debug_assert!(rates.iter().all(|r| *r >= 0.0), "negative rate: {rates:?}");
    out.fill(0);
    let total: f64 = rates.iter().sum();
    if n == 0 || !(total > 0.0) {
        return;
    }
    let mut leaving = binomial_draw(n, exit_probability(total, dt), rng);
    // Zero-rate exits take nobody, including the remainder.
    let Some(last) = rates.iter().rposition(|&r| r > 0.0) else {
        return;
    };
    for (k, &rate) in rates.iter().enumerate().take(last + 1) {
        if leaving == 0 {
            break;
        }
        if !(rate > 0.0) {
            continue;
        }
        if k == last {
            out[k] = leaving;
            break;
        }
        let remaining_rate: f64 = rates[k..=last].iter().sum();
        let moved = binomial_draw(leaving, rate / remaining_rate, rng);
        out[k] = moved;
        leaving -= moved;
    }
}

/// One stochastic step of length `dt`. All transitions are drawn from the
/// counts at the start of the step, then applied together.
pub fn euler_multinomial_step<P: Process + ?Sized>(
    process: &P,
    state: &mut State,
    t: f64,
    dt: f64,
    rng: &mut dyn RngCore,
) {
    let flows = process.flows();
    let counts: Vec<f64> = state.counts.iter().map(|&c| c as f64).collect();
    let mut rates = vec![0.0; flows.len()];
    process.rates(&counts, t, &mut rates);

    let mut transitions = vec![0u64; flows.len()];
    let mut group_rates = Vec::new();
    let mut group_draws = Vec::new();
    for (source, &n) in state.counts.iter().enumerate() {
        let outgoing = flows.outgoing(source);
        if outgoing.is_empty() {
            continue;
        }
        group_rates.clear();
        group_rates.extend(outgoing.iter().map(|&k| rates[k]));
        group_draws.clear();
        group_draws.resize(outgoing.len(), 0);
        euler_multinomial(n, &group_rates, dt, rng, &mut group_draws);
        for (&k, &moved) in outgoing.iter().zip(&group_draws) {
            transitions[k] = moved;
        }
    }

    for (flow, &moved) in flows.iter().zip(&transitions) {
        state.counts[flow.from] -= moved;
        state.counts[flow.to] += moved;
        for &a in &flow.accumulators {
            state.accumulators[a] += moved;
        }
    }
}

/// Deterministic counterpart of [`euler_multinomial_step`]: every flow takes
/// its expected value. `counts` and `accumulators` are continuous.
pub fn skeleton_step<P: Process + ?Sized>(
    process: &P,
    counts: &mut [f64],
    accumulators: &mut [f64],
    t: f64,
    dt: f64,
) {
    let flows = process.flows();
    let mut rates = vec![0.0; flows.len()];
    process.rates(counts, t, &mut rates);

    let mut transitions = vec![0.0; flows.len()];
    for (source, &n) in counts.iter().enumerate() {
        let outgoing = flows.outgoing(source);
        let total: f64 = outgoing.iter().map(|&k| rates[k]).sum();
        if outgoing.is_empty() || !(total > 0.0) {
            continue;
        }
        let leaving = n * exit_probability(total, dt);
        for &k in outgoing {
            transitions[k] = leaving * rates[k] / total;
        }
    }

    for (flow, &moved) in flows.iter().zip(&transitions) {
        counts[flow.from] -= moved;
        counts[flow.to] += moved;
        for &a in &flow.accumulators {
            accumulators[a] += moved;
        }
    }
}
