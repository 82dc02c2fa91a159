use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{PompError, Result};

/// One reported count at an observation time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub time: f64,
    pub count: u64,
}

/// A validated observation series: finite, strictly increasing times.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Observations(Vec<Observation>);

impl Observations {
    pub fn new(records: Vec<Observation>) -> Result<Self> {
        if records.is_empty() {
            return Err(PompError::EmptyInput("observation series".to_string()));
        }
        if let Some(bad) = records.iter().find(|o| !o.time.is_finite()) {
            return Err(PompError::InvalidObservations(format!(
                "non-finite observation time {}",
                bad.time
            )));
        }
        if let Some(pair) = records.windows(2).find(|w| w[1].time <= w[0].time) {
            return Err(PompError::InvalidObservations(format!(
                "times must be strictly increasing, found {} after {}",
                pair[1].time, pair[0].time
            )));
        }
        Ok(Self(records))
    }

    /// Counts observed at consecutive integer times `first, first + 1, ...`.
    pub fn daily(first: f64, counts: &[u64]) -> Result<Self> {
        Self::new(
            counts
                .iter()
                .enumerate()
                .map(|(i, &count)| Observation {
                    time: first + i as f64,
                    count,
                })
                .collect(),
        )
    }

    /// Read a CSV table, taking times and counts from the named columns.
    /// Other columns are ignored.
    pub fn from_reader<R: Read>(reader: R, time_column: &str, count_column: &str) -> Result<Self> {
        let mut rdr = csv::Reader::from_reader(reader);
        let headers = rdr.headers()?.clone();
        let column = |name: &str| {
            headers
                .iter()
                .position(|h| h == name)
                .ok_or_else(|| PompError::InvalidObservations(format!("missing column '{name}'")))
        };
        let (time_idx, count_idx) = (column(time_column)?, column(count_column)?);

        let mut records = Vec::new();
        for (line, row) in rdr.records().enumerate() {
            let row = row?;
            let parse_err = |what: &str, value: &str| {
                PompError::InvalidObservations(format!(
                    "row {}: cannot parse {what} '{value}'",
                    line + 1
                ))
            };
            let time_raw = row.get(time_idx).unwrap_or_default().trim();
            let count_raw = row.get(count_idx).unwrap_or_default().trim();
            records.push(Observation {
                time: time_raw.parse().map_err(|_| parse_err("time", time_raw))?,
                count: count_raw.parse().map_err(|_| parse_err("count", count_raw))?,
            });
        }
        Self::new(records)
    }

    pub fn from_csv_path(path: &Path, time_column: &str, count_column: &str) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(file, time_column, count_column)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Observation> {
        self.0.iter()
    }

    pub fn times(&self) -> Vec<f64> {
        self.0.iter().map(|o| o.time).collect()
    }

    pub fn first_time(&self) -> f64 {
        self.0[0].time
    }
}

impl<'a> IntoIterator for &'a Observations {
    type Item = &'a Observation;
    type IntoIter = std::slice::Iter<'a, Observation>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn test_rejects_unordered_times() {
        let records = vec![
            Observation { time: 1.0, count: 3 },
            Observation { time: 1.0, count: 8 },
        ];
        assert!(matches!(
            Observations::new(records),
            Err(PompError::InvalidObservations(_))
        ));
        assert!(matches!(
            Observations::new(vec![]),
            Err(PompError::EmptyInput(_))
        ));
    }

    #[test]
    fn test_daily() {
        let obs = Observations::daily(1.0, &[3, 8, 28]).unwrap();
        assert_eq!(obs.times(), vec![1.0, 2.0, 3.0]);
        assert_eq!(obs.first_time(), 1.0);
    }

    #[test]
    fn test_from_csv_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "day,B,C").unwrap();
        writeln!(file, "1,3,0").unwrap();
        writeln!(file, "2,8,0").unwrap();
        writeln!(file, "3, 28 ,2").unwrap();
        file.flush().unwrap();

        let obs = Observations::from_csv_path(file.path(), "day", "B").unwrap();
        assert_eq!(obs.len(), 3);
        let counts: Vec<u64> = obs.iter().map(|o| o.count).collect();
        assert_eq!(counts, vec![3, 8, 28]);

        assert!(Observations::from_csv_path(file.path(), "day", "reports").is_err());
    }

    #[test]
    fn test_unparseable_count() {
        let data = "time,reports\n1,4\n2,NA\n";
        let err = Observations::from_reader(data.as_bytes(), "time", "reports").unwrap_err();
        assert!(err.to_string().contains("row 2"));
    }
}
