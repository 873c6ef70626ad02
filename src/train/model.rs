//! Capability interface between the training loop and a network

use crate::data::{Batch, Dataset};
use crate::{Error, Result};
use ndarray::Array1;
use std::path::Path;

/// Loss and hit count of a model over one dataset
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Evaluation {
    /// Mean per-sample loss
    pub loss: f32,
    pub correct: usize,
    pub total: usize,
}

impl Evaluation {
    /// Build from a summed loss; an empty set is an error rather than NaN
    pub fn from_totals(loss_sum: f32, correct: usize, total: usize) -> Result<Self> {
        if total == 0 {
            return Err(Error::EmptyDataset);
        }
        Ok(Self {
            loss: loss_sum / total as f32,
            correct,
            total,
        })
    }

    /// Share of correct predictions in percent, in `[0, 100]`
    pub fn accuracy_percent(&self) -> f32 {
        if self.total == 0 {
            return 0.0;
        }
        self.correct as f32 * 100.0 / self.total as f32
    }
}

/// Everything the scheduler and the evaluation stage need from a network
///
/// `evaluate`, `predict` and `compute_loss` take `&self` and must not change
/// parameters, gradients or optimizer state.
pub trait Model {
    /// One optimizer update from the samples of `batch`
    fn train_batch(&mut self, batch: &Batch<'_>) -> Result<()>;

    /// Predicted class of one input
    fn predict(&self, features: &Array1<f32>) -> Result<usize>;

    fn evaluate(&self, dataset: &Dataset) -> Result<Evaluation>;

    /// Loss summed over every sample of `dataset`
    fn compute_loss(&self, dataset: &Dataset) -> Result<f32> {
        let eval = self.evaluate(dataset)?;
        Ok(eval.loss * eval.total as f32)
    }

    fn save(&self, path: &Path) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_evaluation_from_totals() {
        let eval = Evaluation::from_totals(5.0, 3, 4).unwrap();
        assert_relative_eq!(eval.loss, 1.25);
        assert_relative_eq!(eval.accuracy_percent(), 75.0);
    }

    #[test]
    fn test_empty_evaluation_is_an_error() {
        assert!(matches!(
            Evaluation::from_totals(0.0, 0, 0),
            Err(Error::EmptyDataset)
        ));
    }
}
