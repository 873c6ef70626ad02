//! Single-command training from a run description

use super::cli::{apply_overrides, Cli};
use super::schema::{Backend, RunSpec};
use super::validate::validate_config;
use crate::data::load_mnist;
use crate::error::{Error, Result};
use crate::io::load_model;
use crate::monitor::{MetricsReporter, Reporter};
use crate::nn::{lenet5, Network, LENET_INPUT_SIDE};
use crate::train::{
    classification_report, CancellationToken, ClassificationReport, EpochMetrics, EpochScheduler,
    MetricsHistory, Model, ProgressCallback,
};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// What a finished run produced
#[derive(Debug)]
pub struct RunSummary {
    pub last: EpochMetrics,
    pub history: MetricsHistory,
    /// Accuracy and confusion matrix on the test slice
    pub report: ClassificationReport,
    pub model_path: PathBuf,
    pub num_parameters: usize,
}

/// Read a YAML run file without validating it
///
/// Validation waits until command-line overrides have been applied.
pub fn load_config<P: AsRef<Path>>(config_path: P) -> Result<RunSpec> {
    let path = config_path.as_ref();
    let yaml_content = fs::read_to_string(path).map_err(|e| {
        Error::Config(format!(
            "Failed to read config file {}: {e}",
            path.display()
        ))
    })?;

    serde_yaml::from_str(&yaml_content)
        .map_err(|e| Error::Config(format!("Failed to parse YAML config: {e}")))
}

/// Defaults, then the run file named by `--config`, then the other flags
pub fn resolve_spec(cli: &Cli) -> Result<RunSpec> {
    let mut spec = match &cli.config {
        Some(path) => load_config(path)?,
        None => RunSpec::default(),
    };
    apply_overrides(&mut spec, cli);
    Ok(spec)
}

/// Train LeNet-5 from a YAML run file
pub fn train_from_yaml<P: AsRef<Path>>(config_path: P) -> Result<RunSummary> {
    let spec = load_config(config_path)?;
    train_from_spec(&spec, &CancellationToken::new())
}

/// Load the data, train, print the test report and save the network
///
/// Steps:
/// 1. Validate the run description
/// 2. Load and slice the MNIST corpora
/// 3. Build (or resume) the network
/// 4. Run the epochs with best-effort metrics reporting
/// 5. Print the classification report and save the model
pub fn train_from_spec(spec: &RunSpec, cancel: &CancellationToken) -> Result<RunSummary> {
    validate_config(spec)?;
    let data_path = spec
        .data
        .path
        .as_deref()
        .ok_or(super::ValidationError::MissingDataPath)?;

    if spec.training.backend != Backend::Internal {
        warn!(
            backend = %spec.training.backend,
            "backend not available, using the internal engine"
        );
    }

    let mnist = load_mnist(data_path, &spec.mnist_options())?;
    if (mnist.width, mnist.height) != (LENET_INPUT_SIDE, LENET_INPUT_SIDE) {
        return Err(Error::ShapeMismatch {
            expected: vec![LENET_INPUT_SIDE, LENET_INPUT_SIDE],
            got: vec![mnist.width, mnist.height],
        });
    }
    let (offset, count) = (spec.data.sample_offset, spec.data.sample_count);
    let train = mnist.train.slice(offset, count)?;
    let test = mnist.test.slice(offset, count)?;
    info!(train = train.len(), test = test.len(), offset, "loaded MNIST slices");

    let training = spec.training_config();
    let optimizer = spec
        .optimizer
        .name
        .build(training.learning_rate, training.minibatch_size);
    let mut net = lenet5(spec.training.seed, optimizer)?;
    if let Some(resume) = &spec.training.resume {
        net.load_weights(&load_model(resume)?)?;
        info!(path = %resume.display(), "resumed weights");
    }

    print_summary(spec, data_path, &net);

    let reporter: Box<dyn Reporter> = if spec.report.enabled {
        Box::new(MetricsReporter::new(spec.reporter_config()))
    } else {
        Box::new(MetricsReporter::disabled())
    };
    let mut scheduler = EpochScheduler::new(training, reporter).with_cancellation(cancel.clone());
    scheduler.add_callback(ProgressCallback::default());

    let result = scheduler.run(&mut net, &train, &test)?;

    let report = classification_report(result.model, &test)?;
    println!("{report}");

    let model_path = spec.training.model_output.clone();
    result.model.save(&model_path)?;
    info!(path = %model_path.display(), "saved model");

    Ok(RunSummary {
        num_parameters: result.model.num_parameters(),
        last: result.last,
        history: result.history,
        report,
        model_path,
    })
}

fn print_summary(spec: &RunSpec, data_path: &Path, net: &Network) {
    println!("Running with the following parameters:");
    println!("Data path: {}", data_path.display());
    println!("Learning rate: {}", spec.optimizer.lr);
    println!("Minibatch size: {}", spec.training.minibatch_size);
    println!("Number of epochs: {}", spec.training.epochs);
    println!("Backend type: {}", spec.training.backend);
    println!("Optimizer: {}", net.optimizer().name());
    println!(
        "Network: {} ({} parameters)",
        net.name(),
        net.num_parameters()
    );
    println!("  {}", net.architecture());
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::{NamedTempFile, TempDir};

    fn yaml_file(text: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(text.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_config() {
        let file = yaml_file(
            r#"
data:
  path: /data/mnist
optimizer:
  name: sgd
  lr: 0.01
training:
  epochs: 4
"#,
        );

        let spec = load_config(file.path()).unwrap();
        assert_eq!(spec.optimizer.lr, 0.01);
        assert_eq!(spec.training.epochs, 4);
        assert_eq!(spec.training.minibatch_size, 32);
    }

    #[test]
    fn test_load_malformed_yaml() {
        let file = yaml_file("this is not valid yaml: [}");
        assert!(matches!(load_config(file.path()), Err(Error::Config(_))));
    }

    #[test]
    fn test_load_missing_file() {
        let dir = TempDir::new().unwrap();
        let result = load_config(dir.path().join("run.yaml"));
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_resolve_cli_over_file() {
        let file = yaml_file("training:\n  epochs: 8\n  minibatch_size: 4\n");
        let cli = Cli {
            config: Some(file.path().to_path_buf()),
            epochs: Some(2),
            ..Cli::default()
        };

        let spec = resolve_spec(&cli).unwrap();
        assert_eq!(spec.training.epochs, 2);
        assert_eq!(spec.training.minibatch_size, 4);
    }

    #[test]
    fn test_invalid_spec_fails_before_loading_data() {
        let dir = TempDir::new().unwrap();
        let mut spec = RunSpec::default();
        spec.data.path = Some(dir.path().to_path_buf());
        spec.training.minibatch_size = 0;

        let err = train_from_spec(&spec, &CancellationToken::new()).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn test_missing_corpus_is_a_load_error() {
        let dir = TempDir::new().unwrap();
        let mut spec = RunSpec::default();
        spec.data.path = Some(dir.path().to_path_buf());
        spec.report.enabled = false;

        let err = train_from_spec(&spec, &CancellationToken::new()).unwrap_err();
        assert!(matches!(err, Error::DataLoad { .. }));
    }
}
