//! Per-epoch training metrics

use super::model::Evaluation;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Snapshot of model quality at one epoch boundary
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EpochMetrics {
    /// 1-based epoch index
    pub epoch: usize,
    /// Mean per-sample loss on the training split
    pub train_loss: f32,
    /// Mean per-sample loss on the test split
    pub test_loss: f32,
    /// Percent in `[0, 100]`
    pub train_accuracy: f32,
    /// Percent in `[0, 100]`
    pub test_accuracy: f32,
    /// Wall-clock seconds since the previous epoch boundary
    pub elapsed_secs: f64,
}

impl EpochMetrics {
    pub fn from_evaluations(
        epoch: usize,
        train: &Evaluation,
        test: &Evaluation,
        elapsed_secs: f64,
    ) -> Self {
        Self {
            epoch,
            train_loss: train.loss,
            test_loss: test.loss,
            train_accuracy: train.accuracy_percent(),
            test_accuracy: test.accuracy_percent(),
            elapsed_secs,
        }
    }
}

impl fmt::Display for EpochMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "train loss: {} test loss: {}",
            self.train_loss, self.test_loss
        )?;
        write!(
            f,
            "train accuracy: {}% test accuracy: {}%",
            self.train_accuracy, self.test_accuracy
        )
    }
}

/// Every epoch's metrics in order
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct MetricsHistory {
    epochs: Vec<EpochMetrics>,
}

impl MetricsHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, metrics: EpochMetrics) {
        self.epochs.push(metrics);
    }

    pub fn len(&self) -> usize {
        self.epochs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.epochs.is_empty()
    }

    pub fn last(&self) -> Option<&EpochMetrics> {
        self.epochs.last()
    }

    pub fn as_slice(&self) -> &[EpochMetrics] {
        &self.epochs
    }

    /// Epoch with the highest test accuracy (earliest on ties)
    pub fn best_test_accuracy(&self) -> Option<&EpochMetrics> {
        self.epochs.iter().fold(None, |best, m| match best {
            Some(b) if b.test_accuracy >= m.test_accuracy => Some(b),
            _ => Some(m),
        })
    }

    /// Serialize as a JSON array
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&self.epochs)
    }
}
