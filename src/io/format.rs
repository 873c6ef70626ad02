//! Serialization format selection

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Supported model file formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModelFormat {
    /// JSON (human-readable, larger file size)
    Json,

    /// YAML (human-readable)
    Yaml,

    /// SafeTensors (compact binary)
    SafeTensors,
}

impl ModelFormat {
    pub fn extension(&self) -> &str {
        match self {
            ModelFormat::Json => "json",
            ModelFormat::Yaml => "yaml",
            ModelFormat::SafeTensors => "safetensors",
        }
    }

    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "json" => Some(ModelFormat::Json),
            "yaml" | "yml" => Some(ModelFormat::Yaml),
            "safetensors" => Some(ModelFormat::SafeTensors),
            _ => None,
        }
    }

    /// Pick the format from a file name's extension
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .ok_or_else(|| Error::Serialization(format!("{} has no extension", path.display())))?;

        Self::from_extension(ext)
            .ok_or_else(|| Error::Serialization(format!("unsupported model file extension: {ext}")))
    }
}

/// Options for writing a model file
#[derive(Debug, Clone)]
pub struct SaveConfig {
    pub format: ModelFormat,

    /// Pretty-print text formats
    pub pretty: bool,
}

impl SaveConfig {
    pub fn new(format: ModelFormat) -> Self {
        Self {
            format,
            pretty: true,
        }
    }

    /// Config whose format follows the path's extension
    pub fn for_path(path: &Path) -> Result<Self> {
        Ok(Self::new(ModelFormat::from_path(path)?))
    }

    pub fn with_pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }
}

impl Default for SaveConfig {
    fn default() -> Self {
        Self::new(ModelFormat::Json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_extension() {
        assert_eq!(ModelFormat::Json.extension(), "json");
        assert_eq!(ModelFormat::Yaml.extension(), "yaml");
        assert_eq!(ModelFormat::SafeTensors.extension(), "safetensors");
    }

    #[test]
    fn test_format_from_extension() {
        assert_eq!(ModelFormat::from_extension("JSON"), Some(ModelFormat::Json));
        assert_eq!(ModelFormat::from_extension("yml"), Some(ModelFormat::Yaml));
        assert_eq!(
            ModelFormat::from_extension("SafeTensors"),
            Some(ModelFormat::SafeTensors)
        );
        assert_eq!(ModelFormat::from_extension("bin"), None);
    }

    #[test]
    fn test_format_from_path() {
        let format = ModelFormat::from_path(Path::new("models/LeNet-model.json")).unwrap();
        assert_eq!(format, ModelFormat::Json);

        assert!(ModelFormat::from_path(Path::new("models/LeNet-model")).is_err());
        assert!(ModelFormat::from_path(Path::new("weights.bin")).is_err());
    }

    #[test]
    fn test_save_config_builder() {
        let config = SaveConfig::for_path(Path::new("out.yaml"))
            .unwrap()
            .with_pretty(false);

        assert_eq!(config.format, ModelFormat::Yaml);
        assert!(!config.pretty);
    }

    #[test]
    fn test_save_config_default() {
        let config = SaveConfig::default();
        assert_eq!(config.format, ModelFormat::Json);
        assert!(config.pretty);
    }
}
