//! YAML schema of a training run

use crate::data::MnistOptions;
use crate::monitor::{ReporterConfig, DEFAULT_METRICS_ADDR};
use crate::optim::OptimizerKind;
use crate::train::TrainingConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Complete run description: defaults, then the run file, then CLI flags
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunSpec {
    pub data: DataSpec,
    pub optimizer: OptimSpec,
    pub training: TrainingParams,
    pub report: ReportSpec,
}

/// Where the digit corpus lives and which part of it to use
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataSpec {
    /// Directory holding the four MNIST IDX files
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,

    /// First sample of the train and test slices
    pub sample_offset: usize,

    /// Samples taken from each corpus
    pub sample_count: usize,

    /// Pixel value mapped to black
    pub scale_min: f32,

    /// Pixel value mapped to white
    pub scale_max: f32,

    /// Border added on each side of every image
    pub padding: usize,
}

impl Default for DataSpec {
    fn default() -> Self {
        let mnist = MnistOptions::default();
        Self {
            path: None,
            sample_offset: 0,
            sample_count: 1000,
            scale_min: mnist.scale_min,
            scale_max: mnist.scale_max,
            padding: mnist.padding,
        }
    }
}

/// Optimizer choice and base learning rate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimSpec {
    pub name: OptimizerKind,
    pub lr: f32,
}

impl Default for OptimSpec {
    fn default() -> Self {
        Self {
            name: OptimizerKind::Adagrad,
            lr: 0.1,
        }
    }
}

/// Compute engine requested for the convolutions
///
/// Only the built-in engine exists; the others are accepted and fall back to it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    #[default]
    Internal,
    Nnpack,
    Libdnn,
    Avx,
    Opencl,
}

impl Backend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Backend::Internal => "internal",
            Backend::Nnpack => "nnpack",
            Backend::Libdnn => "libdnn",
            Backend::Avx => "avx",
            Backend::Opencl => "opencl",
        }
    }
}

impl std::fmt::Display for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Loop hyper-parameters and run outputs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingParams {
    pub epochs: usize,
    pub minibatch_size: usize,
    /// Seed for weight initialisation
    pub seed: u64,
    pub backend: Backend,
    /// Where the trained network is written; the extension picks the format
    pub model_output: PathBuf,
    /// Weights to start from instead of a fresh initialisation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resume: Option<PathBuf>,
}

impl Default for TrainingParams {
    fn default() -> Self {
        Self {
            epochs: 1,
            minibatch_size: 32,
            seed: 0,
            backend: Backend::Internal,
            model_output: PathBuf::from("models/LeNet-model.json"),
            resume: None,
        }
    }
}

/// Metrics listener settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportSpec {
    pub enabled: bool,
    pub addr: String,
    pub connect_timeout_ms: u64,
    pub reply_timeout_ms: u64,
    pub reply_capacity: usize,
}

impl Default for ReportSpec {
    fn default() -> Self {
        let reporter = ReporterConfig::default();
        Self {
            enabled: true,
            addr: DEFAULT_METRICS_ADDR.to_string(),
            connect_timeout_ms: reporter.connect_timeout.as_millis() as u64,
            reply_timeout_ms: reporter.reply_timeout.as_millis() as u64,
            reply_capacity: reporter.reply_capacity,
        }
    }
}

impl RunSpec {
    pub fn training_config(&self) -> TrainingConfig {
        TrainingConfig::new(
            self.optimizer.lr,
            self.training.epochs,
            self.training.minibatch_size,
        )
    }

    pub fn mnist_options(&self) -> MnistOptions {
        MnistOptions {
            scale_min: self.data.scale_min,
            scale_max: self.data.scale_max,
            padding: self.data.padding,
        }
    }

    pub fn reporter_config(&self) -> ReporterConfig {
        ReporterConfig::new(self.report.addr.clone())
            .with_connect_timeout(Duration::from_millis(self.report.connect_timeout_ms))
            .with_reply_timeout(Duration::from_millis(self.report.reply_timeout_ms))
            .with_reply_capacity(self.report.reply_capacity)
    }
}
