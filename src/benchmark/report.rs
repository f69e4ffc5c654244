//! Summary emission

use std::fmt::Write as _;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::{Algorithm, Trial};
use crate::utils::time::{format_seconds, now_utc};

/// One aggregated (instance, algorithm) line
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryRow {
    pub instance: String,
    pub size: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub density: Option<f64>,
    pub algorithm: Algorithm,
    /// Mean seconds; `None` when unavailable
    pub time: Option<f64>,
    pub time_min: Option<f64>,
    pub time_max: Option<f64>,
}

fn finite(value: f64) -> Option<f64> {
    value.is_finite().then_some(value)
}

impl From<&Trial> for SummaryRow {
    fn from(trial: &Trial) -> Self {
        Self {
            instance: trial.instance.encode(),
            size: trial.instance.size,
            density: trial.instance.density.map(|d| d.value()),
            algorithm: trial.algorithm,
            time: finite(trial.time),
            time_min: finite(trial.time_min),
            time_max: finite(trial.time_max),
        }
    }
}

/// Summaries of one evaluated sweep
#[derive(Debug, Clone, Serialize)]
pub struct SweepReport {
    pub sweep: String,
    pub samples: u32,
    pub generated_at: DateTime<Utc>,
    pub summaries: Vec<SummaryRow>,
}

impl SweepReport {
    pub fn new(sweep: impl Into<String>, samples: u32, summaries: &[Trial]) -> Self {
        Self {
            sweep: sweep.into(),
            samples,
            generated_at: now_utc(),
            summaries: summaries.iter().map(SummaryRow::from).collect(),
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Plain-text table, one line per summary in evaluation order
    pub fn render_table(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "# {} ({} samples, {})",
            self.sweep,
            self.samples,
            self.generated_at.to_rfc3339()
        );
        let _ = writeln!(
            out,
            "{:<20} {:<11} {:>12} {:>12} {:>12}",
            "instance", "algorithm", "mean", "min", "max"
        );
        for row in &self.summaries {
            let _ = writeln!(
                out,
                "{:<20} {:<11} {:>12} {:>12} {:>12}",
                row.instance,
                row.algorithm.name(),
                seconds(row.time),
                seconds(row.time_min),
                seconds(row.time_max)
            );
        }
        out
    }
}

fn seconds(value: Option<f64>) -> String {
    format_seconds(value.unwrap_or(f64::INFINITY))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Density, InstanceKey, TrialOutcome};

    fn summary(time: f64, time_min: f64, time_max: f64) -> Trial {
        Trial {
            instance: InstanceKey::with_density(50, Density::try_from(0.9).unwrap()),
            algorithm: Algorithm::CmrDec,
            sample: None,
            time,
            time_min,
            time_max,
            outcome: TrialOutcome::Aggregated,
        }
    }

    #[test]
    fn test_unavailable_times_serialize_as_null() {
        let report = SweepReport::new("rndcamion", 3, &[summary(f64::INFINITY, 1.0, f64::INFINITY)]);
        let json: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();

        let row = &json["summaries"][0];
        assert_eq!(row["instance"], "00050x00050-p0.90");
        assert_eq!(row["algorithm"], "cmrdec");
        assert!(row["time"].is_null());
        assert_eq!(row["time_min"], 1.0);
        assert!(row["time_max"].is_null());
        assert_eq!(json["samples"], 3);
    }

    #[test]
    fn test_table() {
        let report = SweepReport::new("rndcamion", 2, &[summary(1.5, 1.0, 2.0)]);
        let table = report.render_table();
        let lines: Vec<&str> = table.lines().collect();

        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("# rndcamion (2 samples"));
        assert!(lines[2].starts_with("00050x00050-p0.90    cmrdec"));
        assert!(lines[2].contains("1.500s"));
    }
}
