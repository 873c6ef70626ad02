//! Run configuration: command line, YAML run file, validation
//!
//! A run is described by a [`RunSpec`]. Values come from the defaults, then
//! an optional YAML file, then command-line flags.
//!
//! # Example
//!
//! ```yaml
//! data:
//!   path: ./data
//!   sample_count: 1000
//!
//! optimizer:
//!   name: adagrad
//!   lr: 0.1
//!
//! training:
//!   epochs: 30
//!   minibatch_size: 16
//!   model_output: models/LeNet-model.safetensors
//!
//! report:
//!   addr: 127.0.0.1:8080
//! ```

mod cli;
mod schema;
mod train;
mod validate;

pub use cli::{apply_overrides, parse_args, Cli};
pub use schema::{Backend, DataSpec, OptimSpec, ReportSpec, RunSpec, TrainingParams};
pub use train::{load_config, resolve_spec, train_from_spec, train_from_yaml, RunSummary};
pub use validate::{validate_config, ValidationError};
