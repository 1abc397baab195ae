//! Interactive object segmentation on top of a promptable backbone.
//!
//! A [`Segmentor`] turns clicks or a bounding box into a binary mask by
//! running two predict passes, feeding the soft logits of the first back
//! as a hint to the second. Frame embeddings are computed once and reused
//! until the caller moves on to a new frame.

pub mod config;
pub mod error;
pub mod segmentation;

pub use config::{ModelType, SamConfig};
pub use error::{Result, SegmentError};
pub use segmentation::{
    create_default_segmentor, Backbone, BoundingBox, PointLabel, PointPrompt, PredictRequest,
    PredictionBatch, Prompt, ResultMask, SamOnnx, Segmentor,
};
