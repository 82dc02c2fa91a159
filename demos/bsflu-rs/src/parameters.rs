use pomp::RunConfig;
use serde::Deserialize;

fn default_time_column() -> String {
    "day".to_string()
}

fn default_count_column() -> String {
    "B".to_string()
}

fn default_days() -> usize {
    14
}

/// The `input` section of a run request.
#[derive(Debug, Clone, Deserialize)]
pub struct Input {
    #[serde(flatten)]
    pub run: RunConfig,
    #[serde(default = "default_time_column")]
    pub time_column: String,
    #[serde(default = "default_count_column")]
    pub count_column: String,
    /// Length of the simulated series when no data file is given.
    #[serde(default = "default_days")]
    pub days: usize,
}
