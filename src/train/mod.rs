//! Epoch-driven training with per-epoch evaluation and reporting
//!
//! The loop only talks to a network through the [`Model`] trait:
//!
//! - [`EpochScheduler`] walks epochs and mini-batches, evaluates, reports
//! - [`evaluate_epoch`] turns a model snapshot into [`EpochMetrics`]
//! - [`TrainerCallback`]s observe progress; a [`CancellationToken`] stops it
//!
//! # Example
//!
//! ```no_run
//! use lenet_train::data::SumFeaturesConfig;
//! use lenet_train::monitor::MetricsReporter;
//! use lenet_train::nn::mlp;
//! use lenet_train::optim::OptimizerKind;
//! use lenet_train::train::{EpochScheduler, TrainingConfig};
//!
//! let data = SumFeaturesConfig::default();
//! let (train, test) = data.generate_split().unwrap();
//! let mut net = mlp(10, 50, data.num_classes(), 0, OptimizerKind::Adam.build(0.01, 64)).unwrap();
//!
//! let mut scheduler = EpochScheduler::new(
//!     TrainingConfig::new(0.01, 1, 64),
//!     Box::new(MetricsReporter::disabled()),
//! );
//! let result = scheduler.run(&mut net, &train, &test).unwrap();
//! println!("{}", result.last);
//! ```

pub mod callback;
mod cancel;
mod config;
mod evaluation;
mod metrics;
mod model;
mod scheduler;

pub use callback::{CallbackContext, CallbackManager, ProgressCallback, TrainerCallback};
pub use cancel::CancellationToken;
pub use config::TrainingConfig;
pub use evaluation::{classification_report, evaluate_epoch, ClassificationReport};
pub use metrics::{EpochMetrics, MetricsHistory};
pub use model::{Evaluation, Model};
pub use scheduler::{EpochScheduler, FinalResult};
