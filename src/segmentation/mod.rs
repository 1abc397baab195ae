mod embedding;
mod preprocess;
mod sam_onnx;
mod segmentor;
pub mod select;
pub mod types;

pub use embedding::EmbeddingCache;
pub use preprocess::Preprocessor;
pub use sam_onnx::{SamEmbedding, SamOnnx};
pub use segmentor::Segmentor;
pub use types::{
    Backbone, BoundingBox, PointLabel, PointPrompt, PredictRequest, PredictionBatch, Prompt,
    ResultMask,
};

use crate::config::SamConfig;
use anyhow::{Context, Result};

/// Create a session over the default backbone (SAM exported to ONNX)
pub fn create_default_segmentor(config: &SamConfig) -> Result<Segmentor<SamOnnx>> {
    let model = SamOnnx::new(config).context("Failed to load SAM backbone")?;
    Ok(Segmentor::new(model))
}
