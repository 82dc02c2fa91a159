use crate::error::{PompError, Result};
use crate::measurement::{MeasurementConfig, MeasurementModel};
use crate::models::ProcessConfig;
use crate::params::ParamVector;
use crate::process::Process;

/// A partially observed Markov process: latent dynamics plus a measurement
/// model, with one parameter vector bound into both.
#[derive(Debug)]
pub struct Pomp {
    process: Box<dyn Process>,
    measurement: MeasurementModel,
}

impl Pomp {
    pub fn new(process: Box<dyn Process>, measurement: MeasurementModel) -> Self {
        Self {
            process,
            measurement,
        }
    }

    /// Validate `params` and bind them into the configured process and
    /// measurement model.
    pub fn build(
        process: &ProcessConfig,
        measurement: &MeasurementConfig,
        params: &ParamVector,
    ) -> Result<Self> {
        if !(measurement.offset.is_finite() && measurement.offset >= 0.0) {
            return Err(PompError::config(format!(
                "measurement offset must be finite and non-negative, got {}",
                measurement.offset
            )));
        }
        let built = process.build(params)?;
        let observable = measurement
            .observable
            .clone()
            .unwrap_or_else(|| process.default_observable())
            .resolve(built.layout())?;
        let density = crate::measurement::Density::from_params(measurement.distribution, params)?;
        Ok(Self::new(
            built,
            MeasurementModel::new(density, observable, measurement.offset),
        ))
    }

    pub fn process(&self) -> &dyn Process {
        self.process.as_ref()
    }

    pub fn measurement(&self) -> &MeasurementModel {
        &self.measurement
    }
}
