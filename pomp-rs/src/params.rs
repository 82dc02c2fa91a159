use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{PompError, Result};

/// Largest population whose every count below it is an exact `f64`.
const MAX_POPULATION: f64 = 9_007_199_254_740_992.0;

/// Named model parameters, e.g. `Beta`, `mu_IR`, `rho`, `N`.
///
/// Values are on the natural scale. See [`crate::transform::ParTrans`] for the
/// estimation scale used by optimizers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParamVector(BTreeMap<String, f64>);

impl ParamVector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, value: f64) -> Self {
        self.set(name, value);
        self
    }

    pub fn set(&mut self, name: &str, value: f64) {
        self.0.insert(name.to_string(), value);
    }

    pub fn get(&self, name: &str) -> Result<f64> {
        self.0
            .get(name)
            .copied()
            .ok_or_else(|| PompError::MissingParameter(name.to_string()))
    }

    pub fn get_or(&self, name: &str, default: f64) -> f64 {
        self.0.get(name).copied().unwrap_or(default)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// A non-negative, finite rate.
    pub fn rate(&self, name: &str) -> Result<f64> {
        let value = self.get(name)?;
        if !value.is_finite() || value < 0.0 {
            return Err(PompError::invalid_parameter(
                name,
                value,
                "rates must be finite and non-negative",
            ));
        }
        Ok(value)
    }

    /// A strictly positive, finite value (overdispersion, population size).
    pub fn positive(&self, name: &str) -> Result<f64> {
        let value = self.get(name)?;
        if !value.is_finite() || value <= 0.0 {
            return Err(PompError::invalid_parameter(
                name,
                value,
                "must be finite and strictly positive",
            ));
        }
        Ok(value)
    }

    pub fn probability(&self, name: &str) -> Result<f64> {
        let value = self.get(name)?;
        if !(0.0..=1.0).contains(&value) {
            return Err(PompError::invalid_parameter(
                name,
                value,
                "probabilities must lie in [0, 1]",
            ));
        }
        Ok(value)
    }

    /// A population size: positive and integral, no larger than 2^53 so it
    /// converts to a count exactly.
    pub fn population(&self, name: &str) -> Result<u64> {
        let value = self.positive(name)?;
        if value.fract() != 0.0 {
            return Err(PompError::invalid_parameter(
                name,
                value,
                "population sizes must be whole numbers",
            ));
        }
        if value > MAX_POPULATION {
            return Err(PompError::invalid_parameter(
                name,
                value,
                "population sizes must not exceed 2^53",
            ));
        }
        Ok(value as u64)
    }
}

impl FromIterator<(String, f64)> for ParamVector {
    fn from_iter<T: IntoIterator<Item = (String, f64)>>(iter: T) -> Self {
        ParamVector(iter.into_iter().collect())
    }
}

impl<const K: usize> From<[(&str, f64); K]> for ParamVector {
    fn from(pairs: [(&str, f64); K]) -> Self {
        pairs
            .into_iter()
            .map(|(name, value)| (name.to_string(), value))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation() {
        let params = ParamVector::from([
            ("Beta", 2.0),
            ("mu_IR", -1.0),
            ("rho", 1.2),
            ("N", 763.0),
            ("psi", 0.0),
        ]);
        assert_eq!(params.rate("Beta").unwrap(), 2.0);
        assert!(matches!(
            params.rate("mu_IR"),
            Err(PompError::InvalidParameter { .. })
        ));
        assert!(params.probability("rho").is_err());
        assert!(params.positive("psi").is_err());
        assert_eq!(params.population("N").unwrap(), 763);
        assert!(matches!(
            params.get("eta"),
            Err(PompError::MissingParameter(name)) if name == "eta"
        ));
    }

    #[test]
    fn test_fractional_population_rejected() {
        let params = ParamVector::new().with("N", 762.5);
        assert!(params.population("N").is_err());
    }

    #[test]
    fn test_huge_population_rejected() {
        let params = ParamVector::new().with("N", 1e20).with("M", 9_007_199_254_740_992.0);
        assert!(matches!(
            params.population("N"),
            Err(PompError::InvalidParameter { .. })
        ));
        assert_eq!(params.population("M").unwrap(), 1 << 53);
    }

    #[test]
    fn test_deserialize_table() {
        let params: ParamVector =
            serde_json::from_value(serde_json::json!({"Beta": 2.0, "rho": 0.9})).unwrap();
        assert_eq!(params.len(), 2);
        assert_eq!(params.get("rho").unwrap(), 0.9);
        assert_eq!(params.get_or("k", 0.5), 0.5);
    }
}
