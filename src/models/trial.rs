//! Trial models

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::models::{Algorithm, InstanceKey};

/// One (instance, algorithm, sample) triple to execute or parse
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TrialSpec {
    pub instance: InstanceKey,
    pub algorithm: Algorithm,
    pub sample: u32,
}

impl TrialSpec {
    pub fn new(instance: InstanceKey, algorithm: Algorithm, sample: u32) -> Self {
        Self {
            instance,
            algorithm,
            sample,
        }
    }
}

impl fmt::Display for TrialSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} via {} (run #{})", self.instance, self.algorithm, self.sample)
    }
}

/// Why a trial carries the time it carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrialOutcome {
    /// Not parsed yet
    Pending,
    /// A timing line was found
    Measured,
    /// The expected log file does not exist or cannot be read
    MissingLog,
    /// The log exists but contains no usable timing line
    NoTiming,
    /// The solver reported that its time limit expired
    TimeLimitExceeded,
    /// A finite time at or above the censoring ceiling
    Censored,
    /// Not run because of a size threshold
    Skipped,
    /// Summary over several samples
    Aggregated,
}

impl TrialOutcome {
    /// Short code for progress output
    pub fn code(&self) -> &'static str {
        match self {
            TrialOutcome::Pending => "PD",
            TrialOutcome::Measured => "OK",
            TrialOutcome::MissingLog => "MISSING",
            TrialOutcome::NoTiming => "NT",
            TrialOutcome::TimeLimitExceeded => "TLE",
            TrialOutcome::Censored => "CENS",
            TrialOutcome::Skipped => "SKIP",
            TrialOutcome::Aggregated => "AGG",
        }
    }

    /// The trial ran but never reported a usable time
    pub fn is_unfinished(&self) -> bool {
        matches!(
            self,
            TrialOutcome::NoTiming | TrialOutcome::TimeLimitExceeded | TrialOutcome::Censored
        )
    }
}

/// A timing measurement, raw or aggregated.
///
/// Raw trials keep `time_min == time_max == 0`. Summaries reuse the same
/// shape with `time` holding the mean and `sample` cleared.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trial {
    pub instance: InstanceKey,
    pub algorithm: Algorithm,
    pub sample: Option<u32>,
    /// Elapsed seconds, `+inf` when unavailable
    pub time: f64,
    pub time_min: f64,
    pub time_max: f64,
    pub outcome: TrialOutcome,
}

impl Trial {
    /// Unparsed trial carrying the unavailable sentinel
    pub fn new(spec: TrialSpec) -> Self {
        Self {
            instance: spec.instance,
            algorithm: spec.algorithm,
            sample: Some(spec.sample),
            time: f64::INFINITY,
            time_min: 0.0,
            time_max: 0.0,
            outcome: TrialOutcome::Pending,
        }
    }

    /// Trial that was never run because of a size threshold
    pub fn skipped(spec: TrialSpec) -> Self {
        Self {
            outcome: TrialOutcome::Skipped,
            ..Self::new(spec)
        }
    }

    pub fn key(&self) -> (InstanceKey, Algorithm) {
        (self.instance, self.algorithm)
    }

    pub fn is_available(&self) -> bool {
        self.time.is_finite()
    }
}

impl fmt::Display for Trial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} via {}", self.instance, self.algorithm)?;
        if let Some(sample) = self.sample {
            write!(f, " (run #{})", sample)?;
        }
        write!(
            f,
            ": {} in [{},{}] {}",
            self.time,
            self.time_min,
            self.time_max,
            self.outcome.code()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec() -> TrialSpec {
        TrialSpec::new(InstanceKey::new(19), Algorithm::CmrDec, 2)
    }

    #[test]
    fn test_fresh_trial_is_unavailable() {
        let trial = Trial::new(spec());
        assert_eq!(trial.time, f64::INFINITY);
        assert_eq!(trial.time_min, 0.0);
        assert_eq!(trial.time_max, 0.0);
        assert_eq!(trial.outcome, TrialOutcome::Pending);
        assert!(!trial.is_available());
    }

    #[test]
    fn test_skipped_keeps_identity() {
        let trial = Trial::skipped(spec());
        assert_eq!(trial.sample, Some(2));
        assert_eq!(trial.key(), (InstanceKey::new(19), Algorithm::CmrDec));
        assert_eq!(trial.outcome, TrialOutcome::Skipped);
    }

    #[test]
    fn test_display() {
        let mut trial = Trial::new(spec());
        trial.time = 1.5;
        trial.outcome = TrialOutcome::Measured;
        assert_eq!(trial.to_string(), "19 via cmrdec (run #2): 1.5 in [0,0] OK");
        assert_eq!(spec().to_string(), "19 via cmrdec (run #2)");
    }
}
