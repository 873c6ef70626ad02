//! Optimizers for training neural networks
//!
//! All optimizers update parameters in place from the gradients stored on
//! them. Per-parameter state (moments, squared-gradient sums) is allocated
//! lazily on the first step and indexed by parameter position, so the same
//! parameter slice must be passed on every call.

mod adagrad;
mod adam;
mod optimizer;
mod sgd;


pub use adagrad::Adagrad;
pub use adam::Adam;
pub use optimizer::{Optimizer, OptimizerKind};
pub use sgd::SGD;
