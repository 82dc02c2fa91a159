use thiserror::Error;

pub type Result<T> = std::result::Result<T, PompError>;

/// Errors raised while building, simulating or filtering a model.
///
/// Filtering failures (every particle weight zero at some observation) are
/// not errors; they are counted in the filter output.
#[derive(Error, Debug)]
pub enum PompError {
    #[error("invalid parameter {name} = {value}: {reason}")]
    InvalidParameter {
        name: String,
        value: f64,
        reason: String,
    },

    #[error("missing parameter: {0}")]
    MissingParameter(String),

    #[error("invalid observations: {0}")]
    InvalidObservations(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A step created or destroyed individuals. Indicates a model bug.
    #[error("population invariant violated: expected {expected}, found {found}")]
    PopulationInvariant { expected: u64, found: u64 },

    #[error("unknown state variable: {0}")]
    UnknownVariable(String),

    #[error("empty input: {0}")]
    EmptyInput(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl PompError {
    pub fn invalid_parameter(name: &str, value: f64, reason: impl Into<String>) -> Self {
        PompError::InvalidParameter {
            name: name.to_string(),
            value,
            reason: reason.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        PompError::InvalidConfig(message.into())
    }
}
