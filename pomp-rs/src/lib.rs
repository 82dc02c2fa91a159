//! Simulation-based inference for stochastic compartmental epidemic models.
//!
//! A model is a partially observed Markov process ([`Pomp`]): a
//! closed-population compartmental [`Process`] advanced by Euler-multinomial
//! steps, observed through a [`MeasurementModel`]. [`ParticleFilter`]
//! estimates the log-likelihood of an observation series; replicate estimates
//! are combined with [`log_mean_exp`].
//!
//! All randomness comes from a caller-supplied generator.

pub mod config;
pub mod environment;
pub mod error;
pub mod logmeanexp;
pub mod measurement;
pub mod model;
pub mod models;
pub mod observations;
pub mod params;
pub mod pfilter;
pub mod process;
pub mod replicate;
pub mod resample;
pub mod simulator;
pub mod state;
pub mod transform;

pub use config::RunConfig;
pub use environment::RunEnvironment;
pub use error::{PompError, Result};
pub use logmeanexp::{LogMeanExp, log_mean_exp};
pub use measurement::{
    DensityKind, MeasurementConfig, MeasurementModel, Observable, measurement_log_density,
    measurement_sample,
};
pub use model::Pomp;
pub use models::ProcessConfig;
pub use observations::{Observation, Observations};
pub use params::ParamVector;
pub use pfilter::{ParticleFilter, PfilterOutput, particle_filter};
pub use process::Process;
pub use replicate::{LikelihoodEstimate, ReplicateResult, estimate_loglik, run_replicates};
pub use simulator::{advance, simulate, simulate_step, skeleton};
pub use state::{State, StateLayout};
pub use transform::ParTrans;
