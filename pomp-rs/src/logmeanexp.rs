//! Combining replicate log-likelihood estimates.
//!
//! Particle filter likelihoods are unbiased on the natural scale, so
//! replicates are averaged there: `log(mean(exp(x)))`. The result is
//! consistent but biased downwards by roughly half the variance of the
//! replicate log-likelihoods.

use serde::Serialize;

use crate::error::{PompError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LogMeanExp {
    pub estimate: f64,
    /// Jackknife standard error; infinite with fewer than two replicates.
    pub standard_error: f64,
    /// Sample standard deviation of the inputs, in log units.
    pub spread: f64,
}

impl LogMeanExp {
    /// The jackknife breaks down once replicates disagree by more than
    /// about one log unit.
    pub fn is_reliable(&self) -> bool {
        self.standard_error.is_finite() && self.spread <= 1.0
    }
}

/// `log(mean(exp(values)))` with a jackknife standard error.
///
/// Inputs are sorted first, so the result does not depend on their order.
pub fn log_mean_exp(values: &[f64]) -> Result<LogMeanExp> {
    if values.is_empty() {
        return Err(PompError::EmptyInput("log_mean_exp needs at least one value".to_string()));
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let n = sorted.len();
    let estimate = lme(sorted.iter().copied(), n);
    if n == 1 {
        return Ok(LogMeanExp {
            estimate,
            standard_error: f64::INFINITY,
            spread: 0.0,
        });
    }

    let jackknife: Vec<f64> = (0..n)
        .map(|k| {
            let rest = sorted
                .iter()
                .enumerate()
                .filter(|&(i, _)| i != k)
                .map(|(_, &x)| x);
            lme(rest, n - 1)
        })
        .collect();
    let standard_error = (n as f64 - 1.0) * sample_sd(&jackknife) / (n as f64).sqrt();

    Ok(LogMeanExp {
        estimate,
        standard_error: if standard_error.is_nan() {
            f64::INFINITY
        } else {
            standard_error
        },
        spread: sample_sd(&sorted),
    })
}

fn lme(values: impl Iterator<Item = f64> + Clone, n: usize) -> f64 {
    let max = values.clone().fold(f64::NEG_INFINITY, f64::max);
    if max.is_infinite() {
        return max;
    }
    let sum: f64 = values.map(|x| (x - max).exp()).sum();
    max + (sum / n as f64).ln()
}

fn sample_sd(values: &[f64]) -> f64 {
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let ss: f64 = values.iter().map(|x| (x - mean).powi(2)).sum();
    (ss / (n - 1.0)).sqrt()
}
