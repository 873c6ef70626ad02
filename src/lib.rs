//! # lenet-train: LeNet-5 on MNIST with live epoch reporting
//!
//! Trains a LeNet-5 digit classifier over mini-batches, evaluates it after
//! every epoch and streams the metrics to a local TCP listener when one is
//! present.
//!
//! ## Architecture
//!
//! - **train**: epoch scheduler, evaluation stage, callbacks, the `Model` trait
//! - **monitor**: best-effort metrics reporter, wire format, listener
//! - **data**: MNIST IDX loading, slicing, mini-batches, synthetic data
//! - **nn**: layers, LeNet-5 and MLP construction, losses
//! - **autograd**: tape-based automatic differentiation
//! - **optim**: optimizers (Adagrad, Adam, SGD)
//! - **io**: model saving and loading (JSON, YAML, SafeTensors)
//! - **config**: command line, YAML run file, validation

pub mod autograd;
pub mod config;
pub mod data;
pub mod io;
pub mod logging;
pub mod monitor;
pub mod nn;
pub mod optim;
pub mod train;

pub mod error;

// Re-export commonly used types
pub use autograd::{backward, Tensor};
pub use error::{Error, Result};
