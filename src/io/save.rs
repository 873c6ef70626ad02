//! Model saving

use super::format::{ModelFormat, SaveConfig};
use super::model::SavedModel;
use crate::{Error, Result};
use safetensors::tensor::{Dtype, TensorView};
use std::collections::HashMap;
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Write a model to `path` in the configured format
///
/// Missing parent directories are created.
///
/// # Example
///
/// ```no_run
/// use lenet_train::io::{save_model, ModelFormat, ModelMetadata, SaveConfig, SavedModel, SavedParameter};
///
/// let model = SavedModel::new(
///     ModelMetadata::new("tiny", "dense(2->1)"),
///     vec![SavedParameter { name: "w".into(), shape: vec![2], values: vec![0.5, -0.5] }],
/// );
/// save_model(&model, "models/tiny.json", &SaveConfig::new(ModelFormat::Json)).unwrap();
/// ```
pub fn save_model(model: &SavedModel, path: impl AsRef<Path>, config: &SaveConfig) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let text = match config.format {
        ModelFormat::SafeTensors => return save_safetensors(model, path),
        ModelFormat::Json => {
            let state = model.to_state();
            if config.pretty {
                serde_json::to_string_pretty(&state)
            } else {
                serde_json::to_string(&state)
            }
            .map_err(|e| Error::Serialization(format!("JSON serialization failed: {e}")))?
        }
        ModelFormat::Yaml => serde_yaml::to_string(&model.to_state())
            .map_err(|e| Error::Serialization(format!("YAML serialization failed: {e}")))?,
    };

    let mut file = File::create(path)?;
    file.write_all(text.as_bytes())?;
    Ok(())
}

fn save_safetensors(model: &SavedModel, path: &Path) -> Result<()> {
    let tensor_data: Vec<(&str, &[u8], Vec<usize>)> = model
        .parameters
        .iter()
        .map(|p| {
            (
                p.name.as_str(),
                bytemuck::cast_slice::<f32, u8>(&p.values),
                p.shape.clone(),
            )
        })
        .collect();

    let views = tensor_data
        .iter()
        .map(|(name, bytes, shape)| {
            TensorView::new(Dtype::F32, shape.clone(), bytes)
                .map(|view| (*name, view))
                .map_err(|e| Error::Serialization(format!("invalid tensor {name}: {e}")))
        })
        .collect::<Result<Vec<_>>>()?;

    let mut metadata = HashMap::new();
    metadata.insert("name".to_string(), model.metadata.name.clone());
    metadata.insert(
        "architecture".to_string(),
        model.metadata.architecture.clone(),
    );
    metadata.insert("version".to_string(), model.metadata.version.clone());
    for (key, value) in &model.metadata.custom {
        metadata.insert(format!("custom.{key}"), value.to_string());
    }

    let bytes = safetensors::serialize(views, &Some(metadata))
        .map_err(|e| Error::Serialization(format!("SafeTensors serialization failed: {e}")))?;
    std::fs::write(path, bytes)?;

    Ok(())
}
