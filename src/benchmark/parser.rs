//! Timing extraction from captured solver logs
//!
//! Log problems never become errors: a missing file, an unreadable file or a
//! file without a timing line all leave the trial at the unavailable
//! sentinel, tagged with an outcome saying which of these happened.

use std::path::Path;

use tokio::fs;

use super::layout::ArtifactLayout;
use crate::constants::markers;
use crate::models::{LogStream, ParseRule, Trial, TrialOutcome, TrialSpec};

/// What a scan of one log stream found
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScanResult {
    Measured(f64),
    TimeLimitExceeded,
    NoTiming,
}

/// Scan log content with a rule.
///
/// For cancellable rules a time-limit marker anywhere in the stream wins over
/// any timing line, before or after it. Otherwise the first timing line with
/// a parsable value is taken.
pub fn scan(rule: &ParseRule, content: &str) -> ScanResult {
    let mut first: Option<f64> = None;

    for line in content.lines() {
        if rule.cancellable && line.starts_with(markers::TIME_LIMIT_EXCEEDED) {
            return ScanResult::TimeLimitExceeded;
        }
        if first.is_some() {
            if rule.cancellable {
                continue;
            }
            break;
        }
        first = rule
            .timing
            .captures(line)
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().parse::<f64>().ok())
            .filter(|t| t.is_finite() && *t >= 0.0);
    }

    match first {
        Some(time) => ScanResult::Measured(time),
        None => ScanResult::NoTiming,
    }
}

/// Parses the logs of finished trials
pub struct LogParser {
    layout: ArtifactLayout,
}

impl LogParser {
    pub fn new(layout: ArtifactLayout) -> Self {
        Self { layout }
    }

    /// Parse one trial's logs into a raw trial
    pub async fn parse(&self, spec: TrialSpec) -> Trial {
        let rule = spec.algorithm.parse_rule();
        let path = match rule.stream {
            LogStream::Primary => self.layout.stdout_path(&spec),
            LogStream::Secondary => self.layout.stderr_path(&spec),
        };

        tracing::debug!(trial = %spec, path = %path.display(), "Reading trial log");

        let mut trial = Trial::new(spec);
        match read_log(&path).await {
            None => trial.outcome = TrialOutcome::MissingLog,
            Some(content) => match scan(&rule, &content) {
                ScanResult::Measured(time) => {
                    trial.time = time;
                    trial.outcome = TrialOutcome::Measured;
                }
                ScanResult::TimeLimitExceeded => trial.outcome = TrialOutcome::TimeLimitExceeded,
                ScanResult::NoTiming => trial.outcome = TrialOutcome::NoTiming,
            },
        }
        trial
    }
}

async fn read_log(path: &Path) -> Option<String> {
    match fs::read(path).await {
        Ok(bytes) => Some(String::from_utf8_lossy(&bytes).into_owned()),
        Err(e) => {
            tracing::debug!(path = %path.display(), error = %e, "Log not readable");
            None
        }
    }
}
