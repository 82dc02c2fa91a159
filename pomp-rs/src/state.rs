use serde::Serialize;

use crate::error::{PompError, Result};

/// Names of the compartments and accumulators of a model, in storage order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateLayout {
    pub compartments: Vec<String>,
    pub accumulators: Vec<String>,
}

impl StateLayout {
    pub fn new<C, A>(compartments: C, accumulators: A) -> Self
    where
        C: IntoIterator,
        C::Item: Into<String>,
        A: IntoIterator,
        A::Item: Into<String>,
    {
        Self {
            compartments: compartments.into_iter().map(Into::into).collect(),
            accumulators: accumulators.into_iter().map(Into::into).collect(),
        }
    }

    pub fn compartment(&self, name: &str) -> Result<usize> {
        self.compartments
            .iter()
            .position(|c| c == name)
            .ok_or_else(|| PompError::UnknownVariable(name.to_string()))
    }

    pub fn accumulator(&self, name: &str) -> Result<usize> {
        self.accumulators
            .iter()
            .position(|c| c == name)
            .ok_or_else(|| PompError::UnknownVariable(name.to_string()))
    }
}

/// Compartment counts plus accumulators counting flow since the last reset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct State {
    pub counts: Vec<u64>,
    pub accumulators: Vec<u64>,
}

impl State {
    pub fn new(counts: Vec<u64>, n_accumulators: usize) -> Self {
        Self {
            counts,
            accumulators: vec![0; n_accumulators],
        }
    }

    /// Sum over compartments; accumulators are not part of the population.
    pub fn population(&self) -> u64 {
        self.counts.iter().sum()
    }

    pub fn reset_accumulators(&mut self) {
        self.accumulators.iter_mut().for_each(|a| *a = 0);
    }

    pub fn check_population(&self, expected: u64) -> Result<()> {
        let found = self.population();
        if found != expected {
            return Err(PompError::PopulationInvariant { expected, found });
        }
        Ok(())
    }
}
