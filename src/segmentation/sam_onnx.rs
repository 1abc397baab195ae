use super::preprocess::Preprocessor;
use super::types::{Backbone, PredictRequest, PredictionBatch};
use crate::config::SamConfig;
use anyhow::{ensure, Context, Result};
use image::RgbImage;
use ndarray::{s, Array1, Array2, Array3, Array4, ArrayView2, ArrayView4, Ix2, Ix4};
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::TensorRef;
use std::ops::Range;
use std::path::Path;

/// Label the exported decoder uses for padding points
const PAD_LABEL: f32 = -1.0;
/// Labels for the top-left and bottom-right box corners
const BOX_TOP_LEFT_LABEL: f32 = 2.0;
const BOX_BOTTOM_RIGHT_LABEL: f32 = 3.0;

/// Encoded frame produced by [`SamOnnx::encode`]
pub struct SamEmbedding {
    features: Array4<f32>,
    /// (width, height) of the encoded frame
    original_size: (u32, u32),
}

impl SamEmbedding {
    pub fn original_size(&self) -> (u32, u32) {
        self.original_size
    }

    pub fn features(&self) -> &Array4<f32> {
        &self.features
    }
}

/// Segment Anything exported to ONNX as an image encoder and a prompt
/// decoder
///
/// The decoder follows the reference export: inputs `image_embeddings`,
/// `point_coords`, `point_labels`, `mask_input`, `has_mask_input`,
/// `orig_im_size`; outputs `masks`, `iou_predictions`, `low_res_masks`.
pub struct SamOnnx {
    encoder: Session,
    decoder: Session,
    preprocessor: Preprocessor,
    mask_threshold: f32,
}

impl SamOnnx {
    /// Load encoder and decoder sessions described by `config`
    pub fn new(config: &SamConfig) -> Result<Self> {
        config.validate()?;

        tracing::info!(
            "Loading SAM {} encoder from {}",
            config.model_type.as_str(),
            config.encoder_path.display()
        );
        let encoder = load_session(&config.encoder_path, config.intra_threads)?;

        tracing::info!("Loading SAM decoder from {}", config.decoder_path.display());
        let decoder = load_session(&config.decoder_path, config.intra_threads)?;

        tracing::info!("SAM model loaded successfully");

        Ok(Self {
            encoder,
            decoder,
            preprocessor: Preprocessor::new(config.image_size),
            mask_threshold: config.mask_threshold,
        })
    }

    /// Side length of the low resolution mask logits
    fn low_res_size(&self) -> usize {
        self.preprocessor.target_length() as usize / 4
    }
}

/// Build `(point_coords [1, N, 2], point_labels [1, N])` in model space
fn prompt_tensors(
    preprocessor: &Preprocessor,
    request: &PredictRequest,
    original: (u32, u32),
) -> (Array3<f32>, Array2<f32>) {
    let mut coords: Vec<(f32, f32)> = Vec::new();
    let mut labels: Vec<f32> = Vec::new();

    if let Some(points) = &request.points {
        coords.extend_from_slice(points.coords());
        labels.extend(points.labels().iter().map(|label| label.as_f32()));
    }

    match &request.bbox {
        Some(bbox) => {
            coords.push(bbox.top_left);
            coords.push(bbox.bottom_right);
            labels.push(BOX_TOP_LEFT_LABEL);
            labels.push(BOX_BOTTOM_RIGHT_LABEL);
        }
        None => {
            coords.push((0.0, 0.0));
            labels.push(PAD_LABEL);
        }
    }

    let n = coords.len();
    let mut coord_tensor = Array3::<f32>::zeros((1, n, 2));
    for (i, &point) in coords.iter().enumerate() {
        // Padding point stays at the origin
        let (x, y) = if labels[i] == PAD_LABEL {
            point
        } else {
            preprocessor.apply_coords(point, original)
        };
        coord_tensor[[0, i, 0]] = x;
        coord_tensor[[0, i, 1]] = y;
    }

    let label_tensor = Array2::from_shape_fn((1, n), |(_, i)| labels[i]);
    (coord_tensor, label_tensor)
}

/// Build `(mask_input [1, 1, S, S], has_mask_input [1])`; the decoder
/// declares both as float32
fn mask_tensors(request: &PredictRequest, low_res: usize) -> Result<(Array4<f32>, Array1<f32>)> {
    match &request.mask_input {
        Some(mask) => {
            ensure!(
                mask.dim() == (low_res, low_res),
                "Mask hint must be {}x{}, got {:?}",
                low_res,
                low_res,
                mask.dim()
            );
            let mask_input = mask.clone().into_shape_with_order((1, 1, low_res, low_res))?;
            Ok((mask_input, Array1::from_elem(1, 1.0f32)))
        }
        None => Ok((
            Array4::<f32>::zeros((1, 1, low_res, low_res)),
            Array1::from_elem(1, 0.0f32),
        )),
    }
}

/// Decoder candidates to keep out of `count`.
/// Exports that return every token put the single-mask output first.
fn candidate_range(count: usize, multimask_output: bool) -> Range<usize> {
    if count > 1 && multimask_output {
        1..count
    } else {
        0..1
    }
}

/// Slice raw decoder outputs into a batch
///
/// * `masks` - `[1, C, H, W]` logits at frame size
/// * `scores` - `[1, C]` IoU predictions
/// * `low_res_masks` - `[1, C, S, S]` logits reusable as a mask hint
fn collect_candidates(
    masks: ArrayView4<f32>,
    scores: ArrayView2<f32>,
    low_res_masks: ArrayView4<f32>,
    multimask_output: bool,
    threshold: f32,
) -> Result<PredictionBatch> {
    let count = scores.shape()[1];
    ensure!(
        masks.shape()[1] == count && low_res_masks.shape()[1] == count,
        "Decoder returned {} masks, {} scores, {} low res masks",
        masks.shape()[1],
        count,
        low_res_masks.shape()[1]
    );
    ensure!(count > 0, "Decoder returned no candidates");

    let candidates = candidate_range(count, multimask_output);
    let mut batch_masks = Vec::with_capacity(candidates.len());
    let mut batch_scores = Vec::with_capacity(candidates.len());
    let mut batch_logits = Vec::with_capacity(candidates.len());
    for i in candidates {
        batch_masks.push(masks.slice(s![0, i, .., ..]).mapv(|v| v > threshold));
        batch_scores.push(scores[[0, i]]);
        batch_logits.push(low_res_masks.slice(s![0, i, .., ..]).to_owned());
    }

    Ok(PredictionBatch::new(batch_masks, batch_scores, batch_logits)?)
}

fn load_session(path: &Path, intra_threads: usize) -> Result<Session> {
    build_session(path, intra_threads)
        .with_context(|| format!("Failed to load model from {}", path.display()))
}

fn build_session(path: &Path, intra_threads: usize) -> ort::Result<Session> {
    let session = Session::builder()?
        .with_optimization_level(GraphOptimizationLevel::Level3)?
        .with_intra_threads(intra_threads)?
        .commit_from_file(path)?;
    Ok(session)
}

impl Backbone for SamOnnx {
    type Embedding = SamEmbedding;

    fn encode(&mut self, frame: &RgbImage) -> Result<SamEmbedding> {
        let _span = tracing::debug_span!("sam_encode").entered();

        let input_tensor = self.preprocessor.preprocess(frame)?;

        let outputs = self
            .encoder
            .run(ort::inputs!["image" => TensorRef::from_array_view(input_tensor.view())?])
            .context("Failed to run image encoder")?;

        let features = outputs["image_embeddings"]
            .try_extract_array::<f32>()?
            .to_owned()
            .into_dimensionality::<Ix4>()?;
        tracing::debug!("Image embedding shape: {:?}", features.shape());

        Ok(SamEmbedding {
            features,
            original_size: frame.dimensions(),
        })
    }

    fn predict(
        &mut self,
        embedding: &SamEmbedding,
        request: &PredictRequest,
    ) -> Result<PredictionBatch> {
        let _span = tracing::debug_span!("sam_decode").entered();

        let (width, height) = embedding.original_size;
        let (point_coords, point_labels) =
            prompt_tensors(&self.preprocessor, request, embedding.original_size);
        let (mask_input, has_mask_input) = mask_tensors(request, self.low_res_size())?;
        let orig_im_size = Array1::from(vec![height as f32, width as f32]);

        let outputs = self
            .decoder
            .run(ort::inputs![
                "image_embeddings" => TensorRef::from_array_view(embedding.features.view())?,
                "point_coords" => TensorRef::from_array_view(point_coords.view())?,
                "point_labels" => TensorRef::from_array_view(point_labels.view())?,
                "mask_input" => TensorRef::from_array_view(mask_input.view())?,
                "has_mask_input" => TensorRef::from_array_view(has_mask_input.view())?,
                "orig_im_size" => TensorRef::from_array_view(orig_im_size.view())?
            ])
            .context("Failed to run mask decoder")?;

        let masks = outputs["masks"]
            .try_extract_array::<f32>()?
            .into_dimensionality::<Ix4>()?;
        let scores = outputs["iou_predictions"]
            .try_extract_array::<f32>()?
            .into_dimensionality::<Ix2>()?;
        let low_res_masks = outputs["low_res_masks"]
            .try_extract_array::<f32>()?
            .into_dimensionality::<Ix4>()?;

        collect_candidates(
            masks,
            scores,
            low_res_masks,
            request.multimask_output,
            self.mask_threshold,
        )
    }
}
