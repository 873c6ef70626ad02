//! Model loading

use super::format::ModelFormat;
use super::model::{ModelMetadata, ModelState, SavedModel, SavedParameter};
use crate::{Error, Result};
use std::path::Path;

/// Read a model file, detecting the format from its extension
pub fn load_model(path: impl AsRef<Path>) -> Result<SavedModel> {
    let path = path.as_ref();
    let format = ModelFormat::from_path(path)?;

    let state: ModelState = match format {
        ModelFormat::SafeTensors => return load_safetensors(path),
        ModelFormat::Json => serde_json::from_str(&std::fs::read_to_string(path)?)
            .map_err(|e| Error::Serialization(format!("JSON deserialization failed: {e}")))?,
        ModelFormat::Yaml => serde_yaml::from_str(&std::fs::read_to_string(path)?)
            .map_err(|e| Error::Serialization(format!("YAML deserialization failed: {e}")))?,
    };

    SavedModel::from_state(state)
}

/// SafeTensors stores tensors sorted by its own rules; callers match by name
fn load_safetensors(path: &Path) -> Result<SavedModel> {
    let data = std::fs::read(path)?;

    let (_, st_metadata) = safetensors::SafeTensors::read_metadata(&data)
        .map_err(|e| Error::Serialization(format!("SafeTensors parsing failed: {e}")))?;

    let stored = st_metadata.metadata().clone().unwrap_or_default();
    let field = |key: &str| stored.get(key).cloned().unwrap_or_else(|| "unknown".to_string());

    let mut metadata = ModelMetadata::new(field("name"), field("architecture"));
    if let Some(version) = stored.get("version") {
        metadata.version = version.clone();
    }
    for (key, value) in &stored {
        if let Some(name) = key.strip_prefix("custom.") {
            let value = serde_json::from_str(value)
                .unwrap_or_else(|_| serde_json::Value::String(value.clone()));
            metadata.custom.insert(name.to_string(), value);
        }
    }

    let tensors = safetensors::SafeTensors::deserialize(&data)
        .map_err(|e| Error::Serialization(format!("SafeTensors parsing failed: {e}")))?;

    let parameters = tensors
        .tensors()
        .into_iter()
        .map(|(name, view)| {
            let values: Vec<f32> = bytemuck::pod_collect_to_vec(view.data());
            SavedParameter {
                name,
                shape: view.shape().to_vec(),
                values,
            }
        })
        .collect();

    Ok(SavedModel::new(metadata, parameters))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::{save_model, SaveConfig};
    use tempfile::TempDir;

    fn model_with(values: Vec<f32>) -> SavedModel {
        let len = values.len();
        SavedModel::new(
            ModelMetadata::new("round-trip", "dense")
                .with_custom("input_len", serde_json::json!(len)),
            vec![
                SavedParameter {
                    name: "fc.weight".to_string(),
                    shape: vec![len],
                    values,
                },
                SavedParameter {
                    name: "fc.bias".to_string(),
                    shape: vec![1],
                    values: vec![-0.25],
                },
            ],
        )
    }

    fn round_trip(file_name: &str, format: ModelFormat) -> (SavedModel, SavedModel) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(file_name);
        let original = model_with(vec![1.0, -2.0, 3.5, 0.0]);

        save_model(&original, &path, &SaveConfig::new(format)).unwrap();
        let loaded = load_model(&path).unwrap();
        (original, loaded)
    }

    #[test]
    fn test_json_round_trip() {
        let (original, loaded) = round_trip("model.json", ModelFormat::Json);
        assert_eq!(original.parameters, loaded.parameters);
        assert_eq!(loaded.metadata.custom["input_len"], serde_json::json!(4));
    }

    #[test]
    fn test_yml_extension_round_trip() {
        let (original, loaded) = round_trip("model.yml", ModelFormat::Yaml);
        assert_eq!(original.parameters, loaded.parameters);
        assert_eq!(loaded.metadata.name, "round-trip");
    }

    #[test]
    fn test_safetensors_round_trip_by_name() {
        let (original, loaded) = round_trip("model.safetensors", ModelFormat::SafeTensors);

        assert_eq!(loaded.parameters.len(), 2);
        for param in &original.parameters {
            assert_eq!(loaded.get_parameter(&param.name), Some(param));
        }
        assert_eq!(loaded.metadata.architecture, "dense");
        assert_eq!(loaded.metadata.custom["input_len"], serde_json::json!(4));
    }

    #[test]
    fn test_load_missing_file() {
        let dir = TempDir::new().unwrap();
        let result = load_model(dir.path().join("absent.json"));
        assert!(matches!(result, Err(Error::Io(_))));
    }

    #[test]
    fn test_load_unsupported_extension() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("model.bin");
        std::fs::write(&path, b"weights").unwrap();

        assert!(matches!(load_model(&path), Err(Error::Serialization(_))));
    }

    #[test]
    fn test_load_invalid_json() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("model.json");
        std::fs::write(&path, "{ not json").unwrap();

        let err = load_model(&path).unwrap_err();
        assert!(err.to_string().contains("JSON deserialization failed"));
    }

    #[test]
    fn test_load_invalid_safetensors() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("model.safetensors");
        std::fs::write(&path, [0u8, 1, 2]).unwrap();

        assert!(matches!(load_model(&path), Err(Error::Serialization(_))));
    }
}
