//! Loss functions
//!
//! Each loss returns a one-element tensor whose backward pass seeds the
//! prediction gradient and then continues down the prediction's tape.

use crate::autograd::{softmax, BackwardOp, GradCell};
use crate::Tensor;
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::rc::Rc;

/// Scalar loss over one prediction/target pair
pub trait LossFn {
    fn forward(&self, predictions: &Tensor, targets: &Array1<f32>) -> Tensor;

    fn name(&self) -> &str;
}

/// Mean squared error: `mean((predictions - targets)²)`
///
/// # Example
///
/// ```
/// use lenet_train::nn::{LossFn, MSELoss};
/// use lenet_train::Tensor;
///
/// let pred = Tensor::from_vec(vec![1.0, 2.0, 3.0], true);
/// let target = ndarray::arr1(&[1.5, 2.5, 3.5]);
///
/// let loss = MSELoss.forward(&pred, &target);
/// assert!((loss.data()[0] - 0.25).abs() < 1e-6);
/// ```
#[derive(Clone, Copy, Debug, Default)]
pub struct MSELoss;

impl LossFn for MSELoss {
    fn forward(&self, predictions: &Tensor, targets: &Array1<f32>) -> Tensor {
        assert_eq!(
            predictions.len(),
            targets.len(),
            "Predictions and targets must have same length"
        );

        let diff = predictions.data() - targets;
        let mse = diff.mapv(|d| d * d).mean().unwrap_or(0.0);

        let requires_grad = predictions.requires_grad();
        let mut loss = Tensor::from_vec(vec![mse], requires_grad);

        if requires_grad {
            // d(MSE)/d(pred) = 2 * (pred - target) / n
            let n = predictions.len() as f32;
            loss.set_backward_op(Rc::new(LossBackward {
                predictions: predictions.clone(),
                local_grad: diff * (2.0 / n),
                result_grad: loss.grad_cell(),
            }));
        }

        loss
    }

    fn name(&self) -> &str {
        "mse"
    }
}

/// Softmax cross entropy: `-Σ targets · log(softmax(logits))`
#[derive(Clone, Copy, Debug, Default)]
pub struct CrossEntropyLoss;

impl LossFn for CrossEntropyLoss {
    fn forward(&self, predictions: &Tensor, targets: &Array1<f32>) -> Tensor {
        assert_eq!(
            predictions.len(),
            targets.len(),
            "Predictions and targets must have same length"
        );

        let probs = softmax(&predictions.detach()).data().clone();
        let ce: f32 = targets
            .iter()
            .zip(probs.iter())
            .map(|(&t, &p)| -t * (p + 1e-10).ln())
            .sum();

        let requires_grad = predictions.requires_grad();
        let mut loss = Tensor::from_vec(vec![ce], requires_grad);

        if requires_grad {
            // d(CE)/d(logits) = softmax(logits) - targets
            loss.set_backward_op(Rc::new(LossBackward {
                predictions: predictions.clone(),
                local_grad: probs - targets,
                result_grad: loss.grad_cell(),
            }));
        }

        loss
    }

    fn name(&self) -> &str {
        "cross_entropy"
    }
}

struct LossBackward {
    predictions: Tensor,
    local_grad: Array1<f32>,
    result_grad: GradCell,
}

impl BackwardOp for LossBackward {
    fn backward(&self) {
        if let Some(grad) = self.result_grad.borrow().as_ref() {
            self.predictions.accumulate_grad(&self.local_grad * grad[0]);

            if let Some(op) = self.predictions.backward_op() {
                op.backward();
            }
        }
    }
}

/// Loss selection for configuration files and saved metadata
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LossKind {
    #[default]
    Mse,
    CrossEntropy,
}

impl LossKind {
    pub fn build(self) -> Box<dyn LossFn> {
        match self {
            LossKind::Mse => Box::new(MSELoss),
            LossKind::CrossEntropy => Box::new(CrossEntropyLoss),
        }
    }
}

/// Per-class target vector: `high` at the label, `low` elsewhere
///
/// A tanh output layer never reaches ±1, so LeNet trains against ±0.8.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TargetEncoding {
    pub low: f32,
    pub high: f32,
}

impl TargetEncoding {
    pub const TANH: TargetEncoding = TargetEncoding {
        low: -0.8,
        high: 0.8,
    };

    pub const ONE_HOT: TargetEncoding = TargetEncoding {
        low: 0.0,
        high: 1.0,
    };

    pub fn encode(&self, label: usize, classes: usize) -> Array1<f32> {
        let mut target = Array1::from_elem(classes, self.low);
        if let Some(slot) = target.get_mut(label) {
            *slot = self.high;
        }
        target
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::autograd::backward;
    use approx::assert_relative_eq;

    #[test]
    fn test_mse_value_and_gradient() {
        let pred = Tensor::from_vec(vec![1.0, 2.0, 3.0], true);
        let target = ndarray::arr1(&[1.5, 2.0, 2.0]);

        let loss = MSELoss.forward(&pred, &target);
        assert_relative_eq!(loss.data()[0], (0.25 + 0.0 + 1.0) / 3.0, epsilon = 1e-6);

        backward(&loss, None);
        let grad = pred.grad().unwrap();
        assert_relative_eq!(grad[0], 2.0 * -0.5 / 3.0, epsilon = 1e-6);
        assert_relative_eq!(grad[1], 0.0, epsilon = 1e-6);
        assert_relative_eq!(grad[2], 2.0 / 3.0, epsilon = 1e-6);
    }

    #[test]
    fn test_mse_backward_reaches_upstream_tensors() {
        let x = Tensor::from_vec(vec![0.5, -0.5], true);
        let y = crate::autograd::tanh(&x);
        let target = ndarray::arr1(&[0.8, -0.8]);

        let loss = MSELoss.forward(&y, &target);
        backward(&loss, None);

        let gx = x.grad().expect("gradient reaches the input");
        // Outputs sit below their targets in magnitude, so both move outward
        assert!(gx[0] < 0.0);
        assert!(gx[1] > 0.0);
    }

    #[test]
    fn test_cross_entropy_gradient_is_probs_minus_target() {
        let logits = Tensor::from_vec(vec![2.0, 1.0, 0.5], true);
        let target = TargetEncoding::ONE_HOT.encode(0, 3);

        let loss = CrossEntropyLoss.forward(&logits, &target);
        assert!(loss.data()[0] > 0.0);

        backward(&loss, None);
        let grad = logits.grad().unwrap();
        assert_relative_eq!(grad.sum(), 0.0, epsilon = 1e-6);
        assert!(grad[0] < 0.0);
        assert!(grad[1] > 0.0 && grad[2] > 0.0);
    }

    #[test]
    fn test_cross_entropy_value() {
        // softmax([0, ln 3]) = [0.25, 0.75]
        let logits = Tensor::from_vec(vec![0.0, 3.0f32.ln()], false);
        let loss = CrossEntropyLoss.forward(&logits, &TargetEncoding::ONE_HOT.encode(1, 2));
        assert_relative_eq!(loss.data()[0], -(0.75f32.ln()), epsilon = 1e-6);
        assert!(logits.grad().is_none());
    }

    #[test]
    fn test_loss_without_grad_has_no_tape() {
        let pred = Tensor::from_vec(vec![0.0, 1.0], false);
        let loss = MSELoss.forward(&pred, &ndarray::arr1(&[0.0, 0.0]));
        assert!(!loss.requires_grad());
        assert!(loss.backward_op().is_none());
    }

    #[test]
    fn test_target_encoding() {
        let t = TargetEncoding::TANH.encode(2, 4);
        assert_eq!(t.to_vec(), vec![-0.8, -0.8, 0.8, -0.8]);

        let one_hot = TargetEncoding::ONE_HOT.encode(0, 2);
        assert_eq!(one_hot.to_vec(), vec![1.0, 0.0]);
    }

    #[test]
    fn test_loss_kind_from_yaml() {
        let kind: LossKind = serde_yaml::from_str("cross_entropy").unwrap();
        assert_eq!(kind, LossKind::CrossEntropy);
        assert_eq!(LossKind::default().build().name(), "mse");
    }
}
