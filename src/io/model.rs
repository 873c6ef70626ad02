//! On-disk model representation

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Architecture and training information stored next to the weights
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelMetadata {
    /// Model name (e.g. "LeNet-5")
    pub name: String,

    /// Layer stack in compact text form
    pub architecture: String,

    /// Crate version that wrote the file
    pub version: String,

    /// Free-form fields (loss, optimizer, input length, ...)
    #[serde(default)]
    pub custom: HashMap<String, serde_json::Value>,
}

impl ModelMetadata {
    pub fn new(name: impl Into<String>, architecture: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            architecture: architecture.into(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            custom: HashMap::new(),
        }
    }

    pub fn with_custom(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.custom.insert(key.into(), value);
        self
    }
}

/// Name and shape of one stored parameter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterInfo {
    /// Parameter name (e.g. "c1.weight")
    pub name: String,

    /// Logical shape; values are stored flattened row-major
    pub shape: Vec<usize>,

    /// Element type, always "f32"
    pub dtype: String,
}

impl ParameterInfo {
    pub fn numel(&self) -> usize {
        self.shape.iter().product()
    }
}

/// Serializable model state: parameter table plus one flat value buffer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelState {
    pub metadata: ModelMetadata,
    pub parameters: Vec<ParameterInfo>,
    pub data: Vec<f32>,
}

/// One named parameter with its values
#[derive(Debug, Clone, PartialEq)]
pub struct SavedParameter {
    pub name: String,
    pub shape: Vec<usize>,
    pub values: Vec<f32>,
}

/// A trained network's weights as written to or read from disk
#[derive(Debug, Clone)]
pub struct SavedModel {
    pub metadata: ModelMetadata,
    pub parameters: Vec<SavedParameter>,
}

impl SavedModel {
    pub fn new(metadata: ModelMetadata, parameters: Vec<SavedParameter>) -> Self {
        Self {
            metadata,
            parameters,
        }
    }

    pub fn get_parameter(&self, name: &str) -> Option<&SavedParameter> {
        self.parameters.iter().find(|p| p.name == name)
    }

    /// Total number of stored values
    pub fn num_values(&self) -> usize {
        self.parameters.iter().map(|p| p.values.len()).sum()
    }

    pub fn to_state(&self) -> ModelState {
        let mut data = Vec::with_capacity(self.num_values());
        let parameters = self
            .parameters
            .iter()
            .map(|p| {
                data.extend_from_slice(&p.values);
                ParameterInfo {
                    name: p.name.clone(),
                    shape: p.shape.clone(),
                    dtype: "f32".to_string(),
                }
            })
            .collect();

        ModelState {
            metadata: self.metadata.clone(),
            parameters,
            data,
        }
    }

    /// Rebuild from a state, checking that the buffer matches the table
    pub fn from_state(state: ModelState) -> Result<Self> {
        let expected: usize = state.parameters.iter().map(ParameterInfo::numel).sum();
        if expected != state.data.len() {
            return Err(Error::Serialization(format!(
                "parameter table describes {expected} values but the file holds {}",
                state.data.len()
            )));
        }

        let mut offset = 0;
        let parameters = state
            .parameters
            .into_iter()
            .map(|info| {
                let size = info.numel();
                let values = state.data[offset..offset + size].to_vec();
                offset += size;
                SavedParameter {
                    name: info.name,
                    shape: info.shape,
                    values,
                }
            })
            .collect();

        Ok(Self {
            metadata: state.metadata,
            parameters,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_model() -> SavedModel {
        SavedModel::new(
            ModelMetadata::new("test", "dense(3->1)"),
            vec![
                SavedParameter {
                    name: "fc.weight".to_string(),
                    shape: vec![1, 3],
                    values: vec![1.0, 2.0, 3.0],
                },
                SavedParameter {
                    name: "fc.bias".to_string(),
                    shape: vec![1],
                    values: vec![0.1],
                },
            ],
        )
    }

    #[test]
    fn test_metadata_records_crate_version() {
        let meta = ModelMetadata::new("lenet", "conv");
        assert_eq!(meta.version, env!("CARGO_PKG_VERSION"));
        assert!(meta.custom.is_empty());
    }

    #[test]
    fn test_metadata_custom_fields() {
        let meta = ModelMetadata::new("test", "custom")
            .with_custom("loss", serde_json::json!("mse"))
            .with_custom("input_len", serde_json::json!(1024));

        assert_eq!(meta.custom.len(), 2);
        assert_eq!(meta.custom["input_len"], serde_json::json!(1024));
    }

    #[test]
    fn test_parameter_lookup() {
        let model = sample_model();
        assert_eq!(model.get_parameter("fc.bias").unwrap().values, vec![0.1]);
        assert!(model.get_parameter("fc.missing").is_none());
        assert_eq!(model.num_values(), 4);
    }

    #[test]
    fn test_state_round_trip_preserves_order_and_shape() {
        let original = sample_model();
        let restored = SavedModel::from_state(original.to_state()).unwrap();

        assert_eq!(original.parameters, restored.parameters);
        assert_eq!(restored.parameters[0].shape, vec![1, 3]);
    }

    #[test]
    fn test_from_state_rejects_short_buffer() {
        let mut state = sample_model().to_state();
        state.data.pop();

        let err = SavedModel::from_state(state).unwrap_err();
        assert!(matches!(err, Error::Serialization(_)));
    }
}
