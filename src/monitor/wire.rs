//! Text encoding of one epoch record
//!
//! `<train_loss>,<test_loss>,<train_accuracy>,<test_accuracy>` with each
//! value in Rust's shortest round-trip decimal form and no trailing
//! delimiter. Accuracies are percentages.

use crate::train::EpochMetrics;
use thiserror::Error;

pub const FIELD_COUNT: usize = 4;

/// The four values carried by one message
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WireRecord {
    pub train_loss: f32,
    pub test_loss: f32,
    pub train_accuracy: f32,
    pub test_accuracy: f32,
}

impl From<&EpochMetrics> for WireRecord {
    fn from(m: &EpochMetrics) -> Self {
        Self {
            train_loss: m.train_loss,
            test_loss: m.test_loss,
            train_accuracy: m.train_accuracy,
            test_accuracy: m.test_accuracy,
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum WireError {
    #[error("expected 4 comma-separated fields, found {0}")]
    FieldCount(usize),

    #[error("field {index} is not a number: {value:?}")]
    BadNumber { index: usize, value: String },
}

pub fn encode(metrics: &EpochMetrics) -> String {
    encode_record(&WireRecord::from(metrics))
}

pub fn encode_record(r: &WireRecord) -> String {
    format!(
        "{},{},{},{}",
        r.train_loss, r.test_loss, r.train_accuracy, r.test_accuracy
    )
}

/// Parse one message; surrounding whitespace is ignored
pub fn decode(message: &str) -> Result<WireRecord, WireError> {
    let fields: Vec<&str> = message.trim().split(',').collect();
    if fields.len() != FIELD_COUNT {
        return Err(WireError::FieldCount(fields.len()));
    }

    let mut values = [0.0f32; FIELD_COUNT];
    for (index, (slot, field)) in values.iter_mut().zip(&fields).enumerate() {
        *slot = field.trim().parse().map_err(|_| WireError::BadNumber {
            index,
            value: field.to_string(),
        })?;
    }

    Ok(WireRecord {
        train_loss: values[0],
        test_loss: values[1],
        train_accuracy: values[2],
        test_accuracy: values[3],
    })
}
