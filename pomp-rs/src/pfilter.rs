//! Bootstrap particle filter estimating the log-likelihood of an observation
//! series under a [`Pomp`].

use log::{debug, warn};
use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::error::{PompError, Result};
use crate::model::Pomp;
use crate::observations::Observations;
use crate::resample::{Resampling, resample};
use crate::simulator::advance;
use crate::state::State;

/// Filter settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParticleFilter {
    /// Number of particles, J.
    pub particles: usize,
    /// Simulator step size.
    pub dt: f64,
    /// Time of the initial state; no later than the first observation.
    pub t0: f64,
    pub resampling: Resampling,
    /// Likelihood credited to an observation no particle can explain.
    pub tolerance: f64,
    /// Record the weighted mean of every compartment after each observation.
    pub save_filter_means: bool,
}

impl Default for ParticleFilter {
    fn default() -> Self {
        Self {
            particles: 1000,
            dt: 1.0 / 12.0,
            t0: 0.0,
            resampling: Resampling::Systematic,
            tolerance: 1e-17,
            save_filter_means: false,
        }
    }
}

/// One state hypothesis and its log-weight.
#[derive(Debug, Clone, PartialEq)]
pub struct Particle {
    pub state: State,
    pub log_weight: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PfilterOutput {
    /// Sum of `cond_loglik`.
    pub loglik: f64,
    /// Conditional log-likelihood of each observation given the previous ones.
    pub cond_loglik: Vec<f64>,
    /// Effective sample size at each observation; zero on a failure.
    pub ess: Vec<f64>,
    /// Observations at which every particle had zero weight.
    pub nfail: usize,
    pub filter_means: Option<Vec<Vec<f64>>>,
    #[serde(skip)]
    pub final_particles: Vec<Particle>,
}

impl ParticleFilter {
    pub fn new(particles: usize) -> Self {
        Self {
            particles,
            ..Self::default()
        }
    }

    pub fn validate(&self, observations: &Observations) -> Result<()> {
        if self.particles == 0 {
            return Err(PompError::config("the particle filter needs at least one particle"));
        }
        if !(self.dt > 0.0 && self.dt.is_finite()) {
            return Err(PompError::config(format!(
                "step size must be positive and finite, got {}",
                self.dt
            )));
        }
        if !(self.tolerance > 0.0 && self.tolerance.is_finite()) {
            return Err(PompError::config(format!(
                "tolerance must be positive and finite, got {}",
                self.tolerance
            )));
        }
        if !self.t0.is_finite() || self.t0 > observations.first_time() {
            return Err(PompError::config(format!(
                "t0 = {} must not come after the first observation at {}",
                self.t0,
                observations.first_time()
            )));
        }
        Ok(())
    }

    /// Filter `observations`, drawing all randomness from `rng`.
    pub fn run(
        &self,
        pomp: &Pomp,
        observations: &Observations,
        rng: &mut dyn RngCore,
    ) -> Result<PfilterOutput> {
        self.validate(observations)?;
        let process = pomp.process();
        let measurement = pomp.measurement();
        let j = self.particles;
        debug!(
            "particle filter: {} particles over {} observations",
            j,
            observations.len()
        );

        let mut particles: Vec<Particle> = (0..j)
            .map(|_| Particle {
                state: process.initialize(rng),
                log_weight: 0.0,
            })
            .collect();

        let mut cond_loglik = Vec::with_capacity(observations.len());
        let mut ess = Vec::with_capacity(observations.len());
        let mut filter_means = self
            .save_filter_means
            .then(|| Vec::with_capacity(observations.len()));
        let mut nfail = 0;
        let mut t = self.t0;

        for obs in observations {
            for particle in particles.iter_mut() {
                particle.state.reset_accumulators();
                advance(process, &mut particle.state, t, obs.time, self.dt, rng)?;
                let lw = measurement.log_density(obs.count, &particle.state);
                particle.log_weight = if lw.is_nan() { f64::NEG_INFINITY } else { lw };
            }
            t = obs.time;

            let max = particles
                .iter()
                .map(|p| p.log_weight)
                .fold(f64::NEG_INFINITY, f64::max);
            if max == f64::NEG_INFINITY {
                warn!(
                    "filtering failure at t = {}: no particle can explain {} reported",
                    obs.time, obs.count
                );
                nfail += 1;
                cond_loglik.push(self.tolerance.ln());
                ess.push(0.0);
                if let Some(means) = filter_means.as_mut() {
                    means.push(weighted_mean(&particles, &vec![1.0; j]));
                }
                particles.iter_mut().for_each(|p| p.log_weight = 0.0);
                continue;
            }

            let weights: Vec<f64> = particles
                .iter()
                .map(|p| (p.log_weight - max).exp())
                .collect();
            let sum: f64 = weights.iter().sum();
            let sum_sq: f64 = weights.iter().map(|w| w * w).sum();
            cond_loglik.push(max + (sum / j as f64).ln());
            ess.push(sum * sum / sum_sq);
            if let Some(means) = filter_means.as_mut() {
                means.push(weighted_mean(&particles, &weights));
            }

            let ancestors = resample(&weights, j, self.resampling, rng);
            particles = ancestors
                .into_iter()
                .map(|i| Particle {
                    state: particles[i].state.clone(),
                    log_weight: 0.0,
                })
                .collect();
        }

        let loglik: f64 = cond_loglik.iter().sum();
        debug!("particle filter: loglik = {loglik:.3}, {nfail} failures");
        Ok(PfilterOutput {
            loglik,
            cond_loglik,
            ess,
            nfail,
            filter_means,
            final_particles: particles,
        })
    }
}

/// Run a filter with `particles` particles, step `dt`, starting at time 0.
pub fn particle_filter(
    pomp: &Pomp,
    observations: &Observations,
    particles: usize,
    dt: f64,
    rng: &mut dyn RngCore,
) -> Result<PfilterOutput> {
    ParticleFilter {
        particles,
        dt,
        ..ParticleFilter::default()
    }
    .run(pomp, observations, rng)
}

fn weighted_mean(particles: &[Particle], weights: &[f64]) -> Vec<f64> {
    let n_compartments = particles.first().map_or(0, |p| p.state.counts.len());
    let total: f64 = weights.iter().sum();
    let mut mean = vec![0.0; n_compartments];
    for (particle, w) in particles.iter().zip(weights) {
        for (m, &c) in mean.iter_mut().zip(&particle.state.counts) {
            *m += w * c as f64;
        }
    }
    mean.iter_mut().for_each(|m| *m /= total);
    mean
}

#[cfg(test)]
mod tests {
    use rand::{SeedableRng, rngs::StdRng};
    use rand_chacha::ChaCha8Rng;

    use super::*;
    use crate::measurement::{DensityKind, MeasurementConfig, Observable};
    use crate::models::ProcessConfig;
    use crate::params::ParamVector;

    /// Bed-confined boys, days 1 to 14 of the 1978 boarding school outbreak.
    const BSFLU: [u64; 14] = [3, 8, 28, 76, 222, 293, 257, 237, 192, 126, 71, 28, 11, 7];

    fn sir(distribution: DensityKind, offset: f64) -> Pomp {
        let params = ParamVector::from([
            ("Beta", 2.0),
            ("mu_IR", 1.0),
            ("N", 763.0),
            ("rho", 0.9),
            ("psi", 10.0),
        ]);
        let measurement = MeasurementConfig {
            distribution,
            observable: Some(Observable::Accumulator("H".to_string())),
            offset,
        };
        Pomp::build(&ProcessConfig::Sir { initial_infected: 1 }, &measurement, &params).unwrap()
    }

    #[test]
    fn test_boarding_school_sir() {
        let pomp = sir(DensityKind::Poisson, 1e-6);
        let obs = Observations::daily(1.0, &BSFLU).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(8675309);
        let out = particle_filter(&pomp, &obs, 5000, 1.0 / 12.0, &mut rng).unwrap();
        assert!(out.loglik.is_finite());
        assert_eq!(out.nfail, 0);
        assert_eq!(out.cond_loglik.len(), 14);
        assert_eq!(out.ess.len(), 14);
        assert!(out.ess.iter().all(|&e| (1.0..=5000.0 + 1e-6).contains(&e)));
        assert_eq!(out.final_particles.len(), 5000);
        let summed: f64 = out.cond_loglik.iter().sum();
        assert_eq!(out.loglik, summed);
    }

    #[test]
    fn test_same_seed_same_result() {
        let pomp = sir(DensityKind::NegBinomialSize, 0.0);
        let obs = Observations::daily(1.0, &BSFLU).unwrap();
        let filter = ParticleFilter::new(500);
        let a = filter
            .run(&pomp, &obs, &mut StdRng::seed_from_u64(42))
            .unwrap();
        let b = filter
            .run(&pomp, &obs, &mut StdRng::seed_from_u64(42))
            .unwrap();
        assert_eq!(a.loglik.to_bits(), b.loglik.to_bits());
        assert_eq!(a.ess, b.ess);
        assert_eq!(a.cond_loglik, b.cond_loglik);
        assert_eq!(a.final_particles, b.final_particles);
    }

    #[test]
    fn test_impossible_report_is_a_failure() {
        let pomp = sir(DensityKind::Binomial, 0.0);
        // More reports than people on day 2: no particle can produce them.
        let obs = Observations::daily(1.0, &[0, 10_000, 0]).unwrap();
        let filter = ParticleFilter::new(200);
        let mut rng = StdRng::seed_from_u64(8675309);
        let out = filter.run(&pomp, &obs, &mut rng).unwrap();
        assert_eq!(out.nfail, 1);
        assert_eq!(out.cond_loglik[1], 1e-17f64.ln());
        assert_eq!(out.ess[1], 0.0);
        assert!(out.loglik.is_finite());
        assert_eq!(out.final_particles.len(), 200);
    }

    #[test]
    fn test_filter_means() {
        let pomp = sir(DensityKind::Poisson, 1e-6);
        let obs = Observations::daily(1.0, &BSFLU[..5]).unwrap();
        let filter = ParticleFilter {
            particles: 300,
            save_filter_means: true,
            ..ParticleFilter::default()
        };
        let out = filter
            .run(&pomp, &obs, &mut StdRng::seed_from_u64(3))
            .unwrap();
        let means = out.filter_means.unwrap();
        assert_eq!(means.len(), 5);
        for mean in means {
            assert!((mean.iter().sum::<f64>() - 763.0).abs() < 1e-6);
        }
    }

    #[test]
    fn test_invalid_settings() {
        let pomp = sir(DensityKind::Poisson, 1e-6);
        let obs = Observations::daily(1.0, &BSFLU).unwrap();
        let mut rng = StdRng::seed_from_u64(0);
        for filter in [
            ParticleFilter::new(0),
            ParticleFilter {
                dt: 0.0,
                ..ParticleFilter::default()
            },
            ParticleFilter {
                t0: 2.0,
                ..ParticleFilter::default()
            },
            ParticleFilter {
                tolerance: 0.0,
                ..ParticleFilter::default()
            },
        ] {
            assert!(matches!(
                filter.run(&pomp, &obs, &mut rng),
                Err(PompError::InvalidConfig(_))
            ));
        }
    }

    #[test]
    fn test_deserialize_with_defaults() {
        let filter: ParticleFilter =
            toml::from_str("particles = 5000\nresampling = \"multinomial\"").unwrap();
        assert_eq!(filter.particles, 5000);
        assert_eq!(filter.resampling, Resampling::Multinomial);
        assert_eq!(filter.dt, 1.0 / 12.0);
    }
}
