//! Small sequential network library
//!
//! Networks are built from [`layers`] over the tape-based
//! [`autograd`](crate::autograd) engine and implement
//! [`Model`](crate::train::Model), which is all the training loop sees.

pub mod layers;
pub mod lenet;
pub mod loss;
pub mod network;
pub mod params;

pub use layers::{AvgPool2d, ConnectionTable, Conv2d, Dense, Layer, Tanh};
pub use lenet::{lenet5, mlp, LENET_CLASSES, LENET_INPUT_SIDE};
pub use loss::{CrossEntropyLoss, LossFn, LossKind, MSELoss, TargetEncoding};
pub use network::{Network, NetworkBuilder};
pub use params::{ParamId, ParamStore};
