//! Run configuration validation

use super::schema::RunSpec;

/// A run description that cannot start
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("Data path not specified")]
    MissingDataPath,

    #[error("Data path does not exist: {0}")]
    DataPathNotFound(String),

    #[error("Invalid learning rate: {0} (must be greater than 0)")]
    InvalidLearningRate(f32),

    #[error("Invalid number of epochs: {0} (must be greater than 0)")]
    InvalidEpochs(usize),

    #[error("Invalid minibatch size: {size} (must be greater than 0 and at most the {samples} training samples)")]
    InvalidMinibatchSize { size: usize, samples: usize },

    #[error("Invalid sample count: {0} (must be greater than 0)")]
    InvalidSampleCount(usize),

    #[error("Invalid pixel range: [{min}, {max}] (min must be below max)")]
    InvalidScale { min: f32, max: f32 },

    #[error("Invalid metrics address: {0:?}")]
    InvalidMetricsAddr(String),

    #[error("Invalid reply capacity: {0} (must be greater than 0)")]
    InvalidReplyCapacity(usize),
}

/// Validate a run description before any data is read
///
/// Checks:
/// - the data directory is given and exists
/// - numeric values are in range
/// - reporting settings are usable when reporting is on
pub fn validate_config(spec: &RunSpec) -> Result<(), ValidationError> {
    let path = spec
        .data
        .path
        .as_ref()
        .ok_or(ValidationError::MissingDataPath)?;
    if !path.is_dir() {
        return Err(ValidationError::DataPathNotFound(
            path.display().to_string(),
        ));
    }

    let lr = spec.optimizer.lr;
    if !(lr.is_finite() && lr > 0.0) {
        return Err(ValidationError::InvalidLearningRate(lr));
    }

    if spec.training.epochs == 0 {
        return Err(ValidationError::InvalidEpochs(spec.training.epochs));
    }

    if spec.data.sample_count == 0 {
        return Err(ValidationError::InvalidSampleCount(spec.data.sample_count));
    }

    let size = spec.training.minibatch_size;
    if size == 0 || size > spec.data.sample_count {
        return Err(ValidationError::InvalidMinibatchSize {
            size,
            samples: spec.data.sample_count,
        });
    }

    let (min, max) = (spec.data.scale_min, spec.data.scale_max);
    if !(min.is_finite() && max.is_finite() && min < max) {
        return Err(ValidationError::InvalidScale { min, max });
    }

    if spec.report.enabled {
        let addr = &spec.report.addr;
        let valid = addr
            .rsplit_once(':')
            .is_some_and(|(host, port)| !host.is_empty() && port.parse::<u16>().is_ok());
        if !valid {
            return Err(ValidationError::InvalidMetricsAddr(addr.clone()));
        }
        if spec.report.reply_capacity == 0 {
            return Err(ValidationError::InvalidReplyCapacity(
                spec.report.reply_capacity,
            ));
        }
    }

    Ok(())
}
