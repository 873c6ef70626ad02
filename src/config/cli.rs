//! Command-line interface of `lenet-train`
//!
//! # Usage
//!
//! ```bash
//! lenet-train --data_path ./data
//! lenet-train --data_path ./data --learning_rate 0.05 --epochs 30 --minibatch_size 16
//! lenet-train --config run.yaml --epochs 5 --no_report
//! ```
//!
//! Every flag is optional on the parser level so that a run file can supply
//! it; flags given on the command line win over the file.

use super::schema::{Backend, RunSpec};
use clap::Parser;
use std::path::PathBuf;

/// Train LeNet-5 on MNIST and stream per-epoch metrics to a local listener
#[derive(Parser, Debug, Clone, Default, PartialEq)]
#[command(name = "lenet-train")]
#[command(version)]
pub struct Cli {
    /// YAML run file; command-line flags override its values
    #[arg(long = "config", value_name = "RUN_FILE")]
    pub config: Option<PathBuf>,

    /// Directory containing the MNIST IDX files
    #[arg(long = "data_path", value_name = "DIR")]
    pub data_path: Option<PathBuf>,

    /// Learning rate, greater than 0 [default: 0.1]
    #[arg(long = "learning_rate", value_name = "RATE")]
    pub learning_rate: Option<f32>,

    /// Number of epochs, greater than 0 [default: 1]
    #[arg(long = "epochs", value_name = "N")]
    pub epochs: Option<usize>,

    /// Samples per gradient update [default: 32]
    #[arg(long = "minibatch_size", value_name = "N")]
    pub minibatch_size: Option<usize>,

    /// Compute engine; only `internal` is built in [default: internal]
    #[arg(long = "backend_type", value_enum, value_name = "BACKEND")]
    pub backend_type: Option<Backend>,

    /// First sample of the train and test slices [default: 0]
    #[arg(long = "sample_offset", value_name = "N")]
    pub sample_offset: Option<usize>,

    /// Samples taken from each corpus [default: 1000]
    #[arg(long = "sample_count", value_name = "N")]
    pub sample_count: Option<usize>,

    /// Output file for the trained network [default: models/LeNet-model.json]
    #[arg(long = "model_output", value_name = "FILE")]
    pub model_output: Option<PathBuf>,

    /// Start from previously saved weights
    #[arg(long = "resume", value_name = "FILE")]
    pub resume: Option<PathBuf>,

    /// Metrics listener address [default: 127.0.0.1:8080]
    #[arg(long = "metrics_addr", value_name = "HOST:PORT")]
    pub metrics_addr: Option<String>,

    /// Do not send per-epoch metrics
    #[arg(long = "no_report")]
    pub no_report: bool,

    /// Seed for weight initialisation [default: 0]
    #[arg(long = "seed")]
    pub seed: Option<u64>,

    /// Enable debug logging
    #[arg(short, long, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Only log errors
    #[arg(short, long)]
    pub quiet: bool,
}

/// Parse command-line arguments, returning clap's error instead of exiting
pub fn parse_args<I, T>(args: I) -> Result<Cli, clap::Error>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    Cli::try_parse_from(args)
}

/// Apply command-line overrides to a run description
pub fn apply_overrides(spec: &mut RunSpec, cli: &Cli) {
    if let Some(path) = &cli.data_path {
        spec.data.path = Some(path.clone());
    }
    if let Some(lr) = cli.learning_rate {
        spec.optimizer.lr = lr;
    }
    if let Some(epochs) = cli.epochs {
        spec.training.epochs = epochs;
    }
    if let Some(minibatch_size) = cli.minibatch_size {
        spec.training.minibatch_size = minibatch_size;
    }
    if let Some(backend) = cli.backend_type {
        spec.training.backend = backend;
    }
    if let Some(offset) = cli.sample_offset {
        spec.data.sample_offset = offset;
    }
    if let Some(count) = cli.sample_count {
        spec.data.sample_count = count;
    }
    if let Some(output) = &cli.model_output {
        spec.training.model_output = output.clone();
    }
    if let Some(resume) = &cli.resume {
        spec.training.resume = Some(resume.clone());
    }
    if let Some(addr) = &cli.metrics_addr {
        spec.report.addr = addr.clone();
    }
    if cli.no_report {
        spec.report.enabled = false;
    }
    if let Some(seed) = cli.seed {
        spec.training.seed = seed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_training_flags() {
        let cli = parse_args([
            "lenet-train",
            "--learning_rate",
            "0.05",
            "--epochs",
            "30",
            "--minibatch_size",
            "16",
            "--backend_type",
            "avx",
            "--data_path",
            "./data",
        ])
        .unwrap();

        assert_eq!(cli.learning_rate, Some(0.05));
        assert_eq!(cli.epochs, Some(30));
        assert_eq!(cli.minibatch_size, Some(16));
        assert_eq!(cli.backend_type, Some(Backend::Avx));
        assert_eq!(cli.data_path, Some(PathBuf::from("./data")));
        assert!(!cli.no_report);
    }

    #[test]
    fn test_no_flags_parse() {
        let cli = parse_args(["lenet-train"]).unwrap();
        assert_eq!(cli, Cli::default());
    }

    #[test]
    fn test_unknown_flag_rejected() {
        let err = parse_args(["lenet-train", "--batch", "3"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::UnknownArgument);
    }

    #[test]
    fn test_unknown_backend_rejected() {
        let err = parse_args(["lenet-train", "--backend_type", "cuda"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::InvalidValue);
    }

    #[test]
    fn test_non_numeric_value_rejected() {
        assert!(parse_args(["lenet-train", "--epochs", "many"]).is_err());
        assert!(parse_args(["lenet-train", "--learning_rate", "fast"]).is_err());
    }

    #[test]
    fn test_help_is_reported_as_display_help() {
        let err = parse_args(["lenet-train", "-h"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayHelp);
    }

    #[test]
    fn test_verbose_conflicts_with_quiet() {
        assert!(parse_args(["lenet-train", "-v", "-q"]).is_err());
    }

    #[test]
    fn test_overrides_win_over_spec() {
        let mut spec = RunSpec::default();
        spec.training.epochs = 9;
        spec.optimizer.lr = 0.2;

        let cli = parse_args([
            "lenet-train",
            "--epochs",
            "3",
            "--metrics_addr",
            "127.0.0.1:9000",
            "--no_report",
            "--seed",
            "42",
        ])
        .unwrap();
        apply_overrides(&mut spec, &cli);

        assert_eq!(spec.training.epochs, 3);
        assert_eq!(spec.optimizer.lr, 0.2);
        assert_eq!(spec.report.addr, "127.0.0.1:9000");
        assert!(!spec.report.enabled);
        assert_eq!(spec.training.seed, 42);
    }

    #[test]
    fn test_cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
