use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resampling {
    /// One uniform draw, `n` evenly spaced pointers. Lowest variance.
    #[default]
    Systematic,
    /// `n` independent draws.
    Multinomial,
}

/// Draw `n` ancestor indices with probability proportional to `weights`.
///
/// Weights must be non-negative with a positive, finite sum. The returned
/// indices are sorted.
pub fn resample(weights: &[f64], n: usize, method: Resampling, rng: &mut dyn RngCore) -> Vec<usize> {
    let total: f64 = weights.iter().sum();
    debug_assert!(total > 0.0 && total.is_finite(), "bad weight total {total}");
    debug_assert!(!weights.is_empty());

    let mut pointers: Vec<f64> = match method {
        Resampling::Systematic => {
            let offset: f64 = rng.random();
            (0..n).map(|i| (i as f64 + offset) / n as f64).collect()
        }
        Resampling::Multinomial => (0..n).map(|_| rng.random::<f64>()).collect(),
    };
    if method == Resampling::Multinomial {
        pointers.sort_by(f64::total_cmp);
    }

    let mut indices = Vec::with_capacity(n);
    let mut cumulative = 0.0;
    let mut j = 0;
    // Never land on a trailing zero-weight particle through rounding.
    let last = weights.iter().rposition(|&w| w > 0.0).unwrap_or(0);
    for u in pointers {
        let target = u * total;
        while j < last && cumulative + weights[j] <= target {
            cumulative += weights[j];
            j += 1;
        }
        indices.push(j);
    }
    indices
}
