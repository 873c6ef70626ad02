//! Error types for lenet-train

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Shape mismatch: expected {expected:?}, got {got:?}")]
    ShapeMismatch {
        expected: Vec<usize>,
        got: Vec<usize>,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration: {0}")]
    Validation(#[from] crate::config::ValidationError),

    #[error("Failed to load {path}: {reason}")]
    DataLoad { path: PathBuf, reason: String },

    #[error("Slice [{offset}, {offset}+{count}) exceeds corpus of {available} samples")]
    SliceOutOfRange {
        offset: usize,
        count: usize,
        available: usize,
    },

    #[error("Dataset is empty")]
    EmptyDataset,

    #[error("Model error: {0}")]
    Model(String),

    #[error("Training cancelled after {completed_epochs} completed epoch(s)")]
    Cancelled { completed_epochs: usize },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

pub type Result<T> = std::result::Result<T, Error>;
