//! Live export of epoch metrics to an external observer
//!
//! # Architecture
//!
//! - **MetricsReporter**: optional TCP connection owned by the scheduler,
//!   one message and one bounded reply per epoch
//! - **wire**: the comma-joined text record
//! - **MetricsSink**: a small listener that decodes records and acknowledges them
//!
//! # Example
//!
//! ```no_run
//! use lenet_train::monitor::{MetricsReporter, Reporter, ReporterConfig};
//! use lenet_train::train::EpochMetrics;
//!
//! let mut reporter = MetricsReporter::new(ReporterConfig::new("127.0.0.1:8080"));
//! let metrics = EpochMetrics {
//!     epoch: 1,
//!     train_loss: 0.2,
//!     test_loss: 0.3,
//!     train_accuracy: 91.0,
//!     test_accuracy: 89.5,
//!     elapsed_secs: 4.2,
//! };
//! // Skipped when nothing listens; never an error
//! let outcome = reporter.report(&metrics);
//! println!("{outcome:?}");
//! reporter.close();
//! ```

pub mod reporter;
pub mod sink;
pub mod wire;

pub use reporter::{
    MetricsReporter, ReportError, ReportOutcome, Reporter, ReporterConfig, ReporterState,
    DEFAULT_METRICS_ADDR,
};
pub use sink::{MetricsSink, SinkHandle, DEFAULT_ACK};
pub use wire::{WireError, WireRecord};
