//! Adagrad optimizer

use super::Optimizer;
use crate::Tensor;
use ndarray::Array1;

/// Adagrad: per-coordinate step sizes shrinking with the squared-gradient sum
///
/// θ_t = θ_{t-1} - α * g / (√(Σ g²) + ε)
pub struct Adagrad {
    lr: f32,
    epsilon: f32,
    sum_sq: Vec<Option<Array1<f32>>>,
}

impl Adagrad {
    pub fn new(lr: f32, epsilon: f32) -> Self {
        Self {
            lr,
            epsilon,
            sum_sq: Vec::new(),
        }
    }

    /// α = 0.01, ε = 1e-8
    pub fn default_params() -> Self {
        Self::new(0.01, 1e-8)
    }

    /// Multiply the current step size by `factor`
    pub fn with_scaled_lr(mut self, factor: f32) -> Self {
        self.lr *= factor;
        self
    }
}

impl Optimizer for Adagrad {
    fn step(&mut self, params: &mut [Tensor]) {
        if self.sum_sq.len() != params.len() {
            self.sum_sq = vec![None; params.len()];
        }

        for (param, slot) in params.iter_mut().zip(self.sum_sq.iter_mut()) {
            let Some(grad) = param.grad() else {
                continue;
            };

            let g2 = slot.get_or_insert_with(|| Array1::zeros(grad.len()));
            *g2 += &grad.mapv(|g| g * g);

            let update = &grad / &(g2.mapv(f32::sqrt) + self.epsilon) * self.lr;
            *param.data_mut() -= &update;
        }
    }

    fn lr(&self) -> f32 {
        self.lr
    }

    fn set_lr(&mut self, lr: f32) {
        self.lr = lr;
    }

    fn name(&self) -> &str {
        "adagrad"
    }
}
