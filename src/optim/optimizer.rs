//! Optimizer trait

use crate::Tensor;
use serde::{Deserialize, Serialize};

/// Trait for optimization algorithms
pub trait Optimizer {
    /// Perform a single optimization step
    fn step(&mut self, params: &mut [Tensor]);

    /// Zero out all gradients
    fn zero_grad(&mut self, params: &mut [Tensor]) {
        for param in params {
            param.zero_grad();
        }
    }

    fn lr(&self) -> f32;

    fn set_lr(&mut self, lr: f32);

    fn name(&self) -> &str;
}

/// Optimizer selectable from a run file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptimizerKind {
    #[default]
    Adagrad,
    Adam,
    Sgd,
}

impl OptimizerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OptimizerKind::Adagrad => "adagrad",
            OptimizerKind::Adam => "adam",
            OptimizerKind::Sgd => "sgd",
        }
    }

    /// Build the optimizer for a run
    ///
    /// Adagrad follows the LeNet recipe: the base step size of 0.01 is scaled
    /// by `min(4, sqrt(minibatch_size) * learning_rate)`.
    pub fn build(&self, learning_rate: f32, minibatch_size: usize) -> Box<dyn Optimizer> {
        match self {
            OptimizerKind::Adagrad => {
                let scale = ((minibatch_size as f32).sqrt() * learning_rate).min(4.0);
                Box::new(super::Adagrad::default_params().with_scaled_lr(scale))
            }
            OptimizerKind::Adam => Box::new(super::Adam::default_params(learning_rate)),
            OptimizerKind::Sgd => Box::new(super::SGD::new(learning_rate, 0.0)),
        }
    }
}

impl std::fmt::Display for OptimizerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_adagrad_scaling_follows_minibatch() {
        // sqrt(16) * 0.1 = 0.4 → 0.01 * 0.4
        let opt = OptimizerKind::Adagrad.build(0.1, 16);
        assert_relative_eq!(opt.lr(), 0.004, epsilon = 1e-7);
        assert_eq!(opt.name(), "adagrad");
    }

    #[test]
    fn test_adagrad_scaling_is_capped() {
        let opt = OptimizerKind::Adagrad.build(10.0, 64);
        assert_relative_eq!(opt.lr(), 0.04, epsilon = 1e-7);
    }

    #[test]
    fn test_other_kinds_use_raw_learning_rate() {
        assert_relative_eq!(OptimizerKind::Adam.build(0.003, 32).lr(), 0.003);
        assert_relative_eq!(OptimizerKind::Sgd.build(0.5, 32).lr(), 0.5);
    }

    #[test]
    fn test_kind_yaml_names() {
        let kind: OptimizerKind = serde_yaml::from_str("adam").unwrap();
        assert_eq!(kind, OptimizerKind::Adam);
        assert_eq!(OptimizerKind::default().to_string(), "adagrad");
    }
}
