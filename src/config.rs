use crate::error::{Result, SegmentError};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// SAM image encoder variant
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum ModelType {
    #[serde(rename = "vit_b")]
    #[default]
    VitB,
    #[serde(rename = "vit_l")]
    VitL,
    #[serde(rename = "vit_h")]
    VitH,
}

impl ModelType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelType::VitB => "vit_b",
            ModelType::VitL => "vit_l",
            ModelType::VitH => "vit_h",
        }
    }
}

/// Construction-time settings for the ONNX backbone
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SamConfig {
    #[serde(default)]
    pub model_type: ModelType,

    /// Exported image encoder (`image -> image_embeddings`)
    pub encoder_path: PathBuf,

    /// Exported prompt encoder + mask decoder
    pub decoder_path: PathBuf,

    #[serde(default = "default_intra_threads")]
    pub intra_threads: usize,

    /// Logits above this value become foreground pixels
    #[serde(default)]
    pub mask_threshold: f32,

    /// Side length of the square encoder input
    #[serde(default = "default_image_size")]
    pub image_size: u32,
}

fn default_intra_threads() -> usize {
    4
}

fn default_image_size() -> u32 {
    1024
}

impl SamConfig {
    pub fn new<P: AsRef<Path>, Q: AsRef<Path>>(encoder_path: P, decoder_path: Q) -> Self {
        Self {
            model_type: ModelType::default(),
            encoder_path: encoder_path.as_ref().to_path_buf(),
            decoder_path: decoder_path.as_ref().to_path_buf(),
            intra_threads: default_intra_threads(),
            mask_threshold: 0.0,
            image_size: default_image_size(),
        }
    }

    /// Load a config from a JSON file and validate it
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        tracing::debug!("Reading SAM config from {}", path.display());

        let raw = fs::read_to_string(path)?;
        let config: SamConfig = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.intra_threads == 0 {
            return Err(SegmentError::Config(
                "intra_threads must be at least 1".to_string(),
            ));
        }
        if self.image_size == 0 {
            return Err(SegmentError::Config(
                "image_size must be greater than zero".to_string(),
            ));
        }
        if !self.mask_threshold.is_finite() {
            return Err(SegmentError::Config(format!(
                "mask_threshold must be finite, got {}",
                self.mask_threshold
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_fill_missing_fields() {
        let config: SamConfig = serde_json::from_str(
            r#"{"encoder_path": "enc.onnx", "decoder_path": "dec.onnx"}"#,
        )
        .unwrap();

        assert_eq!(config.model_type, ModelType::VitB);
        assert_eq!(config.intra_threads, 4);
        assert_eq!(config.mask_threshold, 0.0);
        assert_eq!(config.image_size, 1024);
        assert_eq!(config, SamConfig::new("enc.onnx", "dec.onnx"));
    }

    #[test]
    fn model_type_uses_checkpoint_names() {
        let config: SamConfig = serde_json::from_str(
            r#"{"model_type": "vit_h", "encoder_path": "a", "decoder_path": "b"}"#,
        )
        .unwrap();
        assert_eq!(config.model_type, ModelType::VitH);
        assert_eq!(config.model_type.as_str(), "vit_h");
    }

    #[test]
    fn from_json_file_rejects_zero_threads() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"encoder_path": "a", "decoder_path": "b", "intra_threads": 0}}"#
        )
        .unwrap();

        let err = SamConfig::from_json_file(file.path()).unwrap_err();
        assert!(matches!(err, SegmentError::Config(_)));
    }

    #[test]
    fn from_json_file_reports_parse_errors() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();

        let err = SamConfig::from_json_file(file.path()).unwrap_err();
        assert!(matches!(err, SegmentError::ConfigParse(_)));
    }
}
