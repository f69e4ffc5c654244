//! In-memory collection of raw trials

use std::collections::HashMap;

use crate::models::{Algorithm, InstanceKey, Trial};

type Key = (InstanceKey, Algorithm);

/// Append-only map from (instance, algorithm) to its trials.
///
/// Keys iterate in the order they were first appended.
#[derive(Debug, Default)]
pub struct ResultStore {
    trials: HashMap<Key, Vec<Trial>>,
    order: Vec<Key>,
}

impl ResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, trial: Trial) {
        let key = trial.key();
        if !self.trials.contains_key(&key) {
            self.order.push(key);
        }
        self.trials.entry(key).or_default().push(trial);
    }

    pub fn get(&self, instance: &InstanceKey, algorithm: Algorithm) -> &[Trial] {
        self.trials
            .get(&(*instance, algorithm))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Keys with their trials, in first-insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&Key, &[Trial])> {
        self.order
            .iter()
            .filter_map(|key| self.trials.get(key).map(|t| (key, t.as_slice())))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}
