//! Driving a [`Process`] through time.

use rand::RngCore;
use serde::Serialize;

use crate::error::{PompError, Result};
use crate::model::Pomp;
use crate::observations::{Observation, Observations};
use crate::process::{Process, skeleton_step};
use crate::state::State;

fn check_dt(dt: f64) -> Result<()> {
    if !(dt > 0.0 && dt.is_finite()) {
        return Err(PompError::config(format!(
            "step size must be positive and finite, got {dt}"
        )));
    }
    Ok(())
}

/// One checked step of length `dt` from time `t`.
///
/// Returns the new state and leaves `state` untouched.
pub fn simulate_step(
    process: &dyn Process,
    state: &State,
    t: f64,
    dt: f64,
    rng: &mut dyn RngCore,
) -> Result<State> {
    check_dt(dt)?;
    let mut next = state.clone();
    process.step(&mut next, t, dt, rng);
    next.check_population(state.population())?;
    Ok(next)
}

/// Advance `state` from `t0` to `t1` in steps of `dt`; the last step is
/// shortened to end exactly at `t1`.
pub fn advance(
    process: &dyn Process,
    state: &mut State,
    t0: f64,
    t1: f64,
    dt: f64,
    rng: &mut dyn RngCore,
) -> Result<()> {
    check_dt(dt)?;
    if t1 < t0 {
        return Err(PompError::config(format!(
            "cannot advance backwards from {t0} to {t1}"
        )));
    }
    let expected = state.population();
    // Leftovers below this are floating-point residue from summing steps.
    let sliver = dt * 1e-8;
    let mut t = t0;
    while t1 - t > sliver {
        let h = dt.min(t1 - t);
        process.step(state, t, h, rng);
        t += h;
    }
    state.check_population(expected)
}

/// A simulated realization: latent states and reports at each time.
#[derive(Debug, Clone, Serialize)]
pub struct Simulation {
    pub states: Vec<State>,
    pub observations: Observations,
}

fn check_times(t0: f64, times: &[f64]) -> Result<()> {
    let first = *times
        .first()
        .ok_or_else(|| PompError::EmptyInput("simulation times".to_string()))?;
    if !(first >= t0) {
        return Err(PompError::config(format!(
            "first time {first} precedes t0 = {t0}"
        )));
    }
    if let Some(pair) = times.windows(2).find(|w| !(w[1] > w[0])) {
        return Err(PompError::config(format!(
            "times must be strictly increasing, found {} after {}",
            pair[1], pair[0]
        )));
    }
    Ok(())
}

/// Simulate the latent process from its initial state and draw a report at
/// every time in `times`. Accumulators restart at zero on each interval.
pub fn simulate(
    pomp: &Pomp,
    t0: f64,
    times: &[f64],
    dt: f64,
    rng: &mut dyn RngCore,
) -> Result<Simulation> {
    check_times(t0, times)?;
    let process = pomp.process();
    let mut state = process.initialize(rng);
    let mut states = Vec::with_capacity(times.len());
    let mut records = Vec::with_capacity(times.len());
    let mut t = t0;
    for &time in times {
        state.reset_accumulators();
        advance(process, &mut state, t, time, dt, rng)?;
        records.push(Observation {
            time,
            count: pomp.measurement().sample(&state, rng),
        });
        states.push(state.clone());
        t = time;
    }
    Ok(Simulation {
        states,
        observations: Observations::new(records)?,
    })
}

/// Continuous-valued state of the deterministic skeleton.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkeletonPoint {
    pub time: f64,
    pub counts: Vec<f64>,
    pub accumulators: Vec<f64>,
}

/// Deterministic mean-field trajectory from `initial`: every flow takes its
/// expected size. As `dt` shrinks this approaches the ODE solution.
pub fn skeleton(
    process: &dyn Process,
    initial: &State,
    t0: f64,
    times: &[f64],
    dt: f64,
) -> Result<Vec<SkeletonPoint>> {
    check_dt(dt)?;
    check_times(t0, times)?;
    let mut counts: Vec<f64> = initial.counts.iter().map(|&c| c as f64).collect();
    let mut accumulators = vec![0.0; initial.accumulators.len()];
    let sliver = dt * 1e-8;
    let mut t = t0;
    let mut points = Vec::with_capacity(times.len());
    for &time in times {
        accumulators.fill(0.0);
        while time - t > sliver {
            let h = dt.min(time - t);
            skeleton_step(process, &mut counts, &mut accumulators, t, h);
            t += h;
        }
        t = time;
        points.push(SkeletonPoint {
            time,
            counts: counts.clone(),
            accumulators: accumulators.clone(),
        });
    }
    Ok(points)
}

#[cfg(test)]
mod tests {
    use rand::{SeedableRng, rngs::StdRng};

    use super::*;
    use crate::measurement::{DensityKind, MeasurementConfig};
    use crate::models::{ProcessConfig, Sir};
    use crate::params::ParamVector;

    fn sir_params() -> ParamVector {
        ParamVector::from([("Beta", 2.0), ("mu_IR", 1.0), ("N", 763.0), ("rho", 0.9)])
    }

    #[test]
    fn test_simulate_step_is_pure_and_conserving() {
        let sir = Sir::new(&sir_params(), 10).unwrap();
        let mut rng = StdRng::seed_from_u64(8675309);
        let state = sir.initialize(&mut rng);
        for dt in [1e-3, 0.1, 1.0, 50.0] {
            let next = simulate_step(&sir, &state, 0.0, dt, &mut rng).unwrap();
            assert_eq!(next.population(), state.population());
            assert_eq!(state.counts, vec![753, 10, 0]);
        }
        assert!(simulate_step(&sir, &state, 0.0, 0.0, &mut rng).is_err());
        assert!(simulate_step(&sir, &state, 0.0, f64::NAN, &mut rng).is_err());
    }

    #[derive(Debug)]
    struct Leaky(Sir);

    impl Process for Leaky {
        fn layout(&self) -> &crate::state::StateLayout {
            self.0.layout()
        }
        fn flows(&self) -> &crate::process::Flows {
            self.0.flows()
        }
        fn rates(&self, counts: &[f64], t: f64, rates: &mut [f64]) {
            self.0.rates(counts, t, rates)
        }
        fn population(&self) -> u64 {
            self.0.population()
        }
        fn initialize(&self, rng: &mut dyn RngCore) -> State {
            self.0.initialize(rng)
        }
        fn step(&self, state: &mut State, _t: f64, _dt: f64, _rng: &mut dyn RngCore) {
            state.counts[0] += 1;
        }
    }

    #[test]
    fn test_population_violation_fails_fast() {
        let leaky = Leaky(Sir::new(&sir_params(), 1).unwrap());
        let mut rng = StdRng::seed_from_u64(1);
        let state = leaky.initialize(&mut rng);
        let err = simulate_step(&leaky, &state, 0.0, 1.0, &mut rng).unwrap_err();
        assert!(matches!(
            err,
            PompError::PopulationInvariant {
                expected: 763,
                found: 764
            }
        ));
    }

    #[derive(Debug)]
    struct Counting(Sir, std::sync::atomic::AtomicUsize, std::sync::Mutex<Vec<f64>>);

    impl Process for Counting {
        fn layout(&self) -> &crate::state::StateLayout {
            self.0.layout()
        }
        fn flows(&self) -> &crate::process::Flows {
            self.0.flows()
        }
        fn rates(&self, counts: &[f64], t: f64, rates: &mut [f64]) {
            self.0.rates(counts, t, rates)
        }
        fn population(&self) -> u64 {
            self.0.population()
        }
        fn initialize(&self, rng: &mut dyn RngCore) -> State {
            self.0.initialize(rng)
        }
        fn step(&self, state: &mut State, t: f64, dt: f64, rng: &mut dyn RngCore) {
            self.1.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            self.2.lock().unwrap().push(dt);
            self.0.step(state, t, dt, rng)
        }
    }

    #[test]
    fn test_advance_partial_final_step() {
        let counting = Counting(
            Sir::new(&sir_params(), 1).unwrap(),
            Default::default(),
            Default::default(),
        );
        let mut rng = StdRng::seed_from_u64(2);
        let mut state = counting.initialize(&mut rng);
        advance(&counting, &mut state, 0.0, 1.0, 0.3, &mut rng).unwrap();
        let dts = counting.2.lock().unwrap().clone();
        assert_eq!(dts.len(), 4);
        assert!((dts[3] - 0.1).abs() < 1e-12);

        // Twelve steps of 1/12 cover a day without a trailing sliver.
        advance(&counting, &mut state, 1.0, 2.0, 1.0 / 12.0, &mut rng).unwrap();
        assert_eq!(counting.1.load(std::sync::atomic::Ordering::SeqCst), 16);
    }

    #[test]
    fn test_simulate_resets_accumulators() {
        let measurement = MeasurementConfig {
            distribution: DensityKind::Binomial,
            observable: None,
            offset: 0.0,
        };
        let pomp = Pomp::build(
            &ProcessConfig::Sir { initial_infected: 1 },
            &measurement,
            &sir_params(),
        )
        .unwrap();
        let mut rng = StdRng::seed_from_u64(8675309);
        let times: Vec<f64> = (1..=14).map(|d| d as f64).collect();
        let sim = simulate(&pomp, 0.0, &times, 1.0 / 12.0, &mut rng).unwrap();
        assert_eq!(sim.states.len(), 14);
        let total_infections: u64 = sim.states.iter().map(|s| s.accumulators[0]).sum();
        let last = sim.states.last().unwrap();
        assert_eq!(total_infections, 762 - last.counts[0]);
        for (state, obs) in sim.states.iter().zip(&sim.observations) {
            assert!(obs.count <= state.accumulators[0]);
        }
    }

    #[test]
    fn test_skeleton_exponential_decay() {
        let params = ParamVector::from([("Beta", 0.0), ("mu_IR", 0.5), ("N", 1000.0)]);
        let sir = Sir::new(&params, 1000).unwrap();
        let initial = State::new(vec![0, 1000, 0], 1);
        let points = skeleton(&sir, &initial, 0.0, &[1.0, 4.0], 0.25).unwrap();
        for point in points {
            let expected = 1000.0 * (-0.5 * point.time).exp();
            assert!((point.counts[1] - expected).abs() < 1e-9);
        }
    }

    #[test]
    fn test_skeleton_rejects_unordered_times() {
        let sir = Sir::new(&sir_params(), 1).unwrap();
        let initial = State::new(vec![762, 1, 0], 1);
        for times in [[2.0, 1.0], [2.0, 2.0]] {
            assert!(matches!(
                skeleton(&sir, &initial, 0.0, &times, 0.1),
                Err(PompError::InvalidConfig(_))
            ));
        }
        assert!(matches!(
            skeleton(&sir, &initial, 0.0, &[], 0.1),
            Err(PompError::EmptyInput(_))
        ));
    }

    #[test]
    fn test_stochastic_mean_approaches_skeleton() {
        let params = ParamVector::from([("Beta", 1.5), ("mu_IR", 0.5), ("N", 1_000_000.0)]);
        let sir = Sir::new(&params, 10_000).unwrap();
        let mut rng = StdRng::seed_from_u64(8675309);
        let initial = sir.initialize(&mut rng);
        let dt = 0.01;
        let times = [2.0, 6.0];
        let reference = skeleton(&sir, &initial, 0.0, &times, dt).unwrap();

        let runs = 20;
        let mut mean_infected = [0.0; 2];
        for _ in 0..runs {
            let mut state = initial.clone();
            let mut t = 0.0;
            for (k, &time) in times.iter().enumerate() {
                advance(&sir, &mut state, t, time, dt, &mut rng).unwrap();
                mean_infected[k] += state.counts[1] as f64 / runs as f64;
                t = time;
            }
        }
        for (mean, point) in mean_infected.iter().zip(&reference) {
            let relative = (mean - point.counts[1]).abs() / point.counts[1];
            assert!(relative < 0.05, "t = {}: {mean} vs {}", point.time, point.counts[1]);
        }
    }
}
