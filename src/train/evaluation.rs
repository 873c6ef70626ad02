//! Per-epoch evaluation and the final classification report

use super::metrics::EpochMetrics;
use super::model::Model;
use crate::data::Dataset;
use crate::{Error, Result};
use std::fmt;
use std::time::Duration;

/// Loss and accuracy of `model` on both splits, stamped with `epoch`
///
/// Only reads the model, so two calls on the same snapshot agree.
pub fn evaluate_epoch<M: Model + ?Sized>(
    model: &M,
    train: &Dataset,
    test: &Dataset,
    epoch: usize,
    elapsed: Duration,
) -> Result<EpochMetrics> {
    let train_eval = model.evaluate(train)?;
    let test_eval = model.evaluate(test)?;
    Ok(EpochMetrics::from_evaluations(
        epoch,
        &train_eval,
        &test_eval,
        elapsed.as_secs_f64(),
    ))
}

/// Accuracy and confusion matrix over one dataset
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClassificationReport {
    pub correct: usize,
    pub total: usize,
    /// `confusion[actual][predicted]`
    pub confusion: Vec<Vec<usize>>,
}

impl ClassificationReport {
    pub fn accuracy_percent(&self) -> f32 {
        if self.total == 0 {
            return 0.0;
        }
        self.correct as f32 * 100.0 / self.total as f32
    }

    pub fn num_classes(&self) -> usize {
        self.confusion.len()
    }
}

pub fn classification_report<M: Model + ?Sized>(
    model: &M,
    dataset: &Dataset,
) -> Result<ClassificationReport> {
    if dataset.is_empty() {
        return Err(Error::EmptyDataset);
    }

    let classes = dataset.num_classes();
    let mut confusion = vec![vec![0; classes]; classes];
    let mut correct = 0;

    for sample in dataset {
        let predicted = model.predict(&sample.features)?;
        if predicted >= classes {
            return Err(Error::Model(format!(
                "predicted class {predicted} outside {classes} classes"
            )));
        }
        confusion[sample.label][predicted] += 1;
        if predicted == sample.label {
            correct += 1;
        }
    }

    Ok(ClassificationReport {
        correct,
        total: dataset.len(),
        confusion,
    })
}

impl fmt::Display for ClassificationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "accuracy: {}% ({}/{})",
            self.accuracy_percent(),
            self.correct,
            self.total
        )?;

        write!(f, "{:>6}", "*")?;
        for predicted in 0..self.num_classes() {
            write!(f, "{predicted:>6}")?;
        }
        writeln!(f)?;

        for (actual, row) in self.confusion.iter().enumerate() {
            write!(f, "{actual:>6}")?;
            for count in row {
                write!(f, "{count:>6}")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
