use pomp::LikelihoodEstimate;
use serde::Serialize;

/// One row summarizing a likelihood evaluation.
#[derive(Debug, Serialize)]
pub struct LoglikSummary {
    pub loglik: f64,
    pub loglik_se: f64,
    pub spread: f64,
    pub reliable: bool,
    pub replicates: usize,
    pub particles: usize,
    pub nfail: usize,
}

impl LoglikSummary {
    pub fn new(estimate: &LikelihoodEstimate, particles: usize) -> LoglikSummary {
        LoglikSummary {
            loglik: estimate.combined.estimate,
            loglik_se: estimate.combined.standard_error,
            spread: estimate.combined.spread,
            reliable: estimate.combined.is_reliable(),
            replicates: estimate.replicates.len(),
            particles,
            nfail: estimate.replicates.iter().map(|r| r.nfail).sum(),
        }
    }
}
