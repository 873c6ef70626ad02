//! Training loop configuration

use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Hyper-parameters of one run, fixed once training starts
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    pub learning_rate: f32,
    pub epochs: usize,
    pub minibatch_size: usize,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            learning_rate: 0.1,
            epochs: 1,
            minibatch_size: 32,
        }
    }
}

impl TrainingConfig {
    pub fn new(learning_rate: f32, epochs: usize, minibatch_size: usize) -> Self {
        Self {
            learning_rate,
            epochs,
            minibatch_size,
        }
    }

    pub fn with_epochs(mut self, epochs: usize) -> Self {
        self.epochs = epochs;
        self
    }

    pub fn with_minibatch_size(mut self, minibatch_size: usize) -> Self {
        self.minibatch_size = minibatch_size;
        self
    }

    /// Check the run can start on a training set of `train_len` samples
    pub fn validate(&self, train_len: usize) -> Result<()> {
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(Error::Config(format!(
                "learning rate must be greater than 0, got {}",
                self.learning_rate
            )));
        }
        if self.epochs == 0 {
            return Err(Error::Config(
                "number of epochs must be greater than 0".to_string(),
            ));
        }
        if self.minibatch_size == 0 || self.minibatch_size > train_len {
            return Err(Error::Config(format!(
                "minibatch size must be in 1..={train_len}, got {}",
                self.minibatch_size
            )));
        }
        Ok(())
    }

    pub fn batches_per_epoch(&self, train_len: usize) -> usize {
        if self.minibatch_size == 0 {
            return 0;
        }
        train_len.div_ceil(self.minibatch_size)
    }
}
