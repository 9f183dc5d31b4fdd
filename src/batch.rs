//! Per item results of the download and convert batches

use crate::requests::{Error, Result};

use std::path::{Path, PathBuf};

/// What a batch does once one of its items fails
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Stop at the first failure and return it. Items already written stay on disk
    #[default]
    AbortOnFirst,
    /// Keep going and report every failure in the [BatchReport]
    CollectAll,
}

#[derive(Debug)]
pub struct Outcome {
    /// Position of the item in the batch
    pub index: usize,
    /// The file that was written
    pub result: Result<PathBuf>,
}

#[derive(Debug, Default)]
pub struct BatchReport {
    pub outcomes: Vec<Outcome>,
}

impl BatchReport {
    /// Records the outcome of item `index`. Under [FailurePolicy::AbortOnFirst] a failure is
    /// returned instead of being recorded
    pub(crate) fn record(
        &mut self,
        policy: FailurePolicy,
        index: usize,
        result: Result<PathBuf>,
    ) -> Result<()> {
        match (policy, result) {
            (FailurePolicy::AbortOnFirst, Err(e)) => Err(e),
            (_, result) => {
                if let Err(e) = &result {
                    tracing::warn!("item {index} failed: {e}");
                }

                self.outcomes.push(Outcome { index, result });

                Ok(())
            }
        }
    }

    /// Files written by the batch, in item order
    pub fn written(&self) -> impl Iterator<Item = &Path> {
        self.outcomes
            .iter()
            .filter_map(|outcome| outcome.result.as_deref().ok())
    }

    pub fn errors(&self) -> impl Iterator<Item = (usize, &Error)> {
        self.outcomes
            .iter()
            .filter_map(|outcome| outcome.result.as_ref().err().map(|e| (outcome.index, e)))
    }

    /// True when no item failed
    pub fn is_complete(&self) -> bool {
        self.errors().next().is_none()
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }
}
