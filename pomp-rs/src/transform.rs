use serde::{Deserialize, Serialize};

use crate::error::{PompError, Result};
use crate::params::ParamVector;

/// Bijections between the natural and the unconstrained estimation scale.
///
/// Parameters not listed are left untouched. Applied only at an optimizer's
/// boundary; the simulator always sees natural-scale values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParTrans {
    #[serde(default)]
    pub log: Vec<String>,
    #[serde(default)]
    pub logit: Vec<String>,
}

impl ParTrans {
    pub fn new(log: &[&str], logit: &[&str]) -> Self {
        Self {
            log: log.iter().map(|s| s.to_string()).collect(),
            logit: logit.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn to_estimation_scale(&self, params: &ParamVector) -> Result<ParamVector> {
        let mut out = params.clone();
        for name in &self.log {
            let value = params.get(name)?;
            if !(value > 0.0) {
                return Err(PompError::invalid_parameter(
                    name,
                    value,
                    "log transform requires a positive value",
                ));
            }
            out.set(name, value.ln());
        }
        for name in &self.logit {
            let value = params.get(name)?;
            if !(0.0..=1.0).contains(&value) {
                return Err(PompError::invalid_parameter(
                    name,
                    value,
                    "logit transform requires a value in [0, 1]",
                ));
            }
            out.set(name, logit(value));
        }
        Ok(out)
    }

    pub fn from_estimation_scale(&self, params: &ParamVector) -> Result<ParamVector> {
        let mut out = params.clone();
        for name in &self.log {
            out.set(name, params.get(name)?.exp());
        }
        for name in &self.logit {
            out.set(name, expit(params.get(name)?));
        }
        Ok(out)
    }
}

pub fn logit(p: f64) -> f64 {
    (p / (1.0 - p)).ln()
}

pub fn expit(x: f64) -> f64 {
    if x >= 0.0 {
        1.0 / (1.0 + (-x).exp())
    } else {
        let e = x.exp();
        e / (1.0 + e)
    }
}
