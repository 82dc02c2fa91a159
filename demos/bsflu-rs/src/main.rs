pub mod output;
pub mod parameters;

use log::{error, info};
use pomp::replicate::{estimate_loglik, replicate_rng};
use pomp::{PompError, RunEnvironment, simulate};

use output::LoglikSummary;
use parameters::Input;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    if let Err(err) = run() {
        error!("{err}");
        std::process::exit(1);
    }
}

/// Base seed for this run. The run protocol strips `seed` and `replicate` out
/// of `input`, so the request's values always win over `RunConfig::seed`.
fn run_seed<I>(env: &RunEnvironment<I>) -> u64 {
    env.seed.wrapping_add(env.replicate)
}

fn run() -> pomp::Result<()> {
    let env = RunEnvironment::<Input>::load()?;
    let input = env
        .input
        .as_ref()
        .ok_or_else(|| PompError::config("missing input section"))?;
    let config = &input.run;
    let seed = run_seed(&env);
    let pomp = config.build()?;

    // Use the registered data file, or simulate a series from the model itself
    let observations = match env.observations("data", &input.time_column, &input.count_column)? {
        Some(observations) => observations,
        None => {
            let times: Vec<f64> = (1..=input.days).map(|d| d as f64).collect();
            let mut rng = replicate_rng(seed, u64::MAX);
            let sim = simulate(&pomp, config.filter.t0, &times, config.filter.dt, &mut rng)?;
            info!("no data file given; simulated {} days", input.days);
            env.write_records("observations.csv", &sim.observations.iter().collect::<Vec<_>>())?;
            sim.observations
        }
    };

    let estimate = estimate_loglik(
        &pomp,
        &observations,
        &config.filter,
        config.replicates,
        seed,
    )?;

    env.write_records("pfilter_replicates.csv", &estimate.replicates)?;
    env.write_records(
        "loglik_summary.csv",
        &[LoglikSummary::new(&estimate, config.filter.particles)],
    )?;
    Ok(())
}
