//! Censoring and aggregation of trial timings

use crate::benchmark::store::ResultStore;
use crate::error::{BenchError, BenchResult};
use crate::models::{Trial, TrialOutcome};

/// Replace a measured time at or above `ceiling` with `+inf`.
///
/// Unavailable trials are left alone, so censoring twice is the same as
/// censoring once.
pub fn censor(trial: &mut Trial, ceiling: f64) {
    if trial.is_available() && trial.time >= ceiling {
        tracing::debug!(trial = %trial, ceiling, "Censoring near-timeout measurement");
        trial.time = f64::INFINITY;
        trial.outcome = TrialOutcome::Censored;
    }
}

/// Summarize all samples of one (instance, algorithm) key.
///
/// The summary carries the mean in `time` and the extremes in `time_min` and
/// `time_max`. A single unavailable sample makes the mean unavailable.
pub fn aggregate(trials: &[Trial]) -> BenchResult<Trial> {
    let first = trials.first().ok_or(BenchError::EmptyAggregation)?;
    let key = first.key();

    if let Some(other) = trials.iter().find(|t| t.key() != key) {
        return Err(BenchError::MixedAggregation(format!(
            "{} via {} and {} via {}",
            key.0, key.1, other.instance, other.algorithm
        )));
    }

    let count = trials.len() as f64;
    let time = trials.iter().map(|t| t.time).sum::<f64>() / count;
    let time_min = trials.iter().map(|t| t.time).fold(f64::INFINITY, f64::min);
    let time_max = trials.iter().map(|t| t.time).fold(f64::NEG_INFINITY, f64::max);

    Ok(Trial {
        instance: first.instance,
        algorithm: first.algorithm,
        sample: None,
        time,
        time_min,
        time_max,
        outcome: TrialOutcome::Aggregated,
    })
}

/// Aggregate every key of a store, in the store's key order
pub fn aggregate_store(store: &ResultStore) -> BenchResult<Vec<Trial>> {
    store.iter().map(|(_, trials)| aggregate(trials)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Algorithm, InstanceKey, TrialSpec};

    fn measured(size: u32, algorithm: Algorithm, sample: u32, time: f64) -> Trial {
        let mut trial = Trial::new(TrialSpec::new(InstanceKey::new(size), algorithm, sample));
        trial.time = time;
        trial.outcome = if time.is_finite() {
            TrialOutcome::Measured
        } else {
            TrialOutcome::TimeLimitExceeded
        };
        trial
    }

    fn series(times: &[f64]) -> Vec<Trial> {
        times
            .iter()
            .enumerate()
            .map(|(i, &t)| measured(19, Algorithm::CmrDec, i as u32 + 1, t))
            .collect()
    }

    fn censored_twice(trials: &[Trial], ceiling: f64) -> (Vec<Trial>, Vec<Trial>) {
        let mut once = trials.to_vec();
        once.iter_mut().for_each(|t| censor(t, ceiling));
        let mut twice = once.clone();
        twice.iter_mut().for_each(|t| censor(t, ceiling));
        (once, twice)
    }

    #[test]
    fn test_censor_is_idempotent() {
        let trials: Vec<Trial> = [1.0, 3699.9, 3700.0, 5000.0, f64::INFINITY]
            .iter()
            .enumerate()
            .map(|(i, &t)| measured(10, Algorithm::Unimod, i as u32 + 1, t))
            .collect();

        let (once, twice) = censored_twice(&trials, 3700.0);
        assert_eq!(once, twice);

        let times: Vec<f64> = once.iter().map(|t| t.time).collect();
        assert_eq!(times, vec![1.0, 3699.9, f64::INFINITY, f64::INFINITY, f64::INFINITY]);
        let outcomes: Vec<TrialOutcome> = once.iter().map(|t| t.outcome).collect();
        assert_eq!(
            outcomes,
            vec![
                TrialOutcome::Measured,
                TrialOutcome::Measured,
                TrialOutcome::Censored,
                TrialOutcome::Censored,
                TrialOutcome::TimeLimitExceeded,
            ]
        );
    }

    #[test]
    fn test_aggregate_finite() {
        let summary = aggregate(&series(&[2.0, 1.0, 4.5])).unwrap();
        assert!((summary.time - 2.5).abs() < 1e-12);
        assert_eq!(summary.time_min, 1.0);
        assert_eq!(summary.time_max, 4.5);
        assert_eq!(summary.sample, None);
        assert_eq!(summary.outcome, TrialOutcome::Aggregated);
        assert!(summary.time_min <= summary.time && summary.time <= summary.time_max);
    }

    #[test]
    fn test_aggregate_propagates_infinity() {
        let summary = aggregate(&series(&[1.0, 2.0, f64::INFINITY])).unwrap();
        assert_eq!(summary.time, f64::INFINITY);
        assert_eq!(summary.time_min, 1.0);
        assert_eq!(summary.time_max, f64::INFINITY);
    }

    #[test]
    fn test_aggregate_single_sample() {
        let summary = aggregate(&series(&[0.003])).unwrap();
        assert_eq!(summary.time, 0.003);
        assert_eq!(summary.time_min, 0.003);
        assert_eq!(summary.time_max, 0.003);
    }

    #[test]
    fn test_aggregate_empty_fails() {
        assert!(matches!(aggregate(&[]), Err(BenchError::EmptyAggregation)));
    }

    #[test]
    fn test_aggregate_mixed_keys_fails() {
        let trials = vec![
            measured(19, Algorithm::CmrDec, 1, 1.0),
            measured(19, Algorithm::CmrPart, 1, 1.0),
        ];
        assert!(matches!(aggregate(&trials), Err(BenchError::MixedAggregation(_))));
    }

    #[test]
    fn test_aggregate_store_keeps_order() {
        let mut store = ResultStore::new();
        store.append(measured(29, Algorithm::CmrDec, 1, 3.0));
        store.append(measured(9, Algorithm::CmrDec, 1, 1.0));
        store.append(measured(29, Algorithm::CmrDec, 2, 5.0));

        let summaries = aggregate_store(&store).unwrap();
        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].instance, InstanceKey::new(29));
        assert_eq!(summaries[0].time, 4.0);
        assert_eq!(summaries[1].instance, InstanceKey::new(9));
    }
}
