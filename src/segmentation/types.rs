use crate::error::{Result, SegmentError};
use image::RgbImage;
use ndarray::Array2;

/// Final segmentation decision: 1 = object, 0 = background.
/// Dimensions match the input frame dimensions (rows = height).
pub type ResultMask = Array2<u8>;

/// Point label understood by the backbone
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointLabel {
    Background,
    Foreground,
}

impl PointLabel {
    pub fn as_f32(self) -> f32 {
        match self {
            PointLabel::Background => 0.0,
            PointLabel::Foreground => 1.0,
        }
    }
}

/// Click prompt: one label per coordinate, coordinates in frame pixels (x, y)
#[derive(Debug, Clone, PartialEq)]
pub struct PointPrompt {
    coords: Vec<(f32, f32)>,
    labels: Vec<PointLabel>,
}

impl PointPrompt {
    pub fn new(coords: Vec<(f32, f32)>, labels: Vec<PointLabel>) -> Result<Self> {
        if coords.is_empty() {
            return Err(SegmentError::InvalidPrompt(
                "at least one point is required".to_string(),
            ));
        }
        if coords.len() != labels.len() {
            return Err(SegmentError::InvalidPrompt(format!(
                "{} coordinates but {} labels",
                coords.len(),
                labels.len()
            )));
        }
        Ok(Self { coords, labels })
    }

    /// Single foreground click
    pub fn foreground(x: f32, y: f32) -> Self {
        Self {
            coords: vec![(x, y)],
            labels: vec![PointLabel::Foreground],
        }
    }

    pub fn coords(&self) -> &[(f32, f32)] {
        &self.coords
    }

    pub fn labels(&self) -> &[PointLabel] {
        &self.labels
    }

    pub fn len(&self) -> usize {
        self.coords.len()
    }

    pub fn is_empty(&self) -> bool {
        self.coords.is_empty()
    }
}

/// Axis-aligned box given by two corner points
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub top_left: (f32, f32),
    pub bottom_right: (f32, f32),
}

impl BoundingBox {
    pub fn new(top_left: (f32, f32), bottom_right: (f32, f32)) -> Self {
        Self {
            top_left,
            bottom_right,
        }
    }

    /// `[x0, y0, x1, y1]`
    pub fn to_xyxy(&self) -> [f32; 4] {
        [
            self.top_left.0,
            self.top_left.1,
            self.bottom_right.0,
            self.bottom_right.1,
        ]
    }
}

/// User prompt for a single predict pass
#[derive(Debug, Clone, PartialEq)]
pub enum Prompt {
    Point(PointPrompt),
    /// Soft mask (logits) from an earlier pass
    Mask(Array2<f32>),
    PointAndMask {
        points: PointPrompt,
        mask: Array2<f32>,
    },
}

/// Everything a backbone predict call may receive
#[derive(Debug, Clone, PartialEq)]
pub struct PredictRequest {
    pub points: Option<PointPrompt>,
    pub mask_input: Option<Array2<f32>>,
    pub bbox: Option<BoundingBox>,
    pub multimask_output: bool,
}

impl PredictRequest {
    pub fn from_prompt(prompt: &Prompt, multimask_output: bool) -> Self {
        let (points, mask_input) = match prompt {
            Prompt::Point(points) => (Some(points.clone()), None),
            Prompt::Mask(mask) => (None, Some(mask.clone())),
            Prompt::PointAndMask { points, mask } => (Some(points.clone()), Some(mask.clone())),
        };
        Self {
            points,
            mask_input,
            bbox: None,
            multimask_output,
        }
    }

    pub fn from_box(bbox: BoundingBox, multimask_output: bool) -> Self {
        Self {
            points: None,
            mask_input: None,
            bbox: Some(bbox),
            multimask_output,
        }
    }

    pub fn with_mask_input(mut self, mask: Array2<f32>) -> Self {
        self.mask_input = Some(mask);
        self
    }
}

/// Raw output of one predict call: parallel candidate sequences
#[derive(Debug, Clone, PartialEq)]
pub struct PredictionBatch {
    masks: Vec<Array2<bool>>,
    scores: Vec<f32>,
    logits: Vec<Array2<f32>>,
}

impl PredictionBatch {
    pub fn new(
        masks: Vec<Array2<bool>>,
        scores: Vec<f32>,
        logits: Vec<Array2<f32>>,
    ) -> Result<Self> {
        if masks.is_empty() {
            return Err(SegmentError::MalformedBatch(
                "backbone returned no candidates".to_string(),
            ));
        }
        if masks.len() != scores.len() || masks.len() != logits.len() {
            return Err(SegmentError::MalformedBatch(format!(
                "{} masks, {} scores, {} logits",
                masks.len(),
                scores.len(),
                logits.len()
            )));
        }
        Ok(Self {
            masks,
            scores,
            logits,
        })
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    pub fn masks(&self) -> &[Array2<bool>] {
        &self.masks
    }

    pub fn scores(&self) -> &[f32] {
        &self.scores
    }

    pub fn logits(&self) -> &[Array2<f32>] {
        &self.logits
    }

    pub fn into_parts(self) -> (Vec<Array2<bool>>, Vec<f32>, Vec<Array2<f32>>) {
        (self.masks, self.scores, self.logits)
    }
}

/// Trait for promptable segmentation backbones
/// Allows swapping the ONNX export for other runtimes or a scripted mock
pub trait Backbone {
    /// Dense image representation, reused across prompts on one frame
    type Embedding;

    /// Run the expensive image encoder on a frame
    fn encode(&mut self, frame: &RgbImage) -> anyhow::Result<Self::Embedding>;

    /// Decode candidate masks for a prompt against an existing embedding
    ///
    /// # Returns
    /// * Masks at frame resolution, one confidence score per mask, and the
    ///   matching soft logits usable as a `mask_input` hint
    fn predict(
        &mut self,
        embedding: &Self::Embedding,
        request: &PredictRequest,
    ) -> anyhow::Result<PredictionBatch>;
}

impl<B: Backbone + ?Sized> Backbone for Box<B> {
    type Embedding = B::Embedding;

    fn encode(&mut self, frame: &RgbImage) -> anyhow::Result<Self::Embedding> {
        (**self).encode(frame)
    }

    fn predict(
        &mut self,
        embedding: &Self::Embedding,
        request: &PredictRequest,
    ) -> anyhow::Result<PredictionBatch> {
        (**self).predict(embedding, request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn point_prompt_rejects_mismatched_lengths() {
        let err = PointPrompt::new(
            vec![(1.0, 2.0), (3.0, 4.0)],
            vec![PointLabel::Foreground],
        )
        .unwrap_err();
        assert!(matches!(err, SegmentError::InvalidPrompt(_)));
    }

    #[test]
    fn point_prompt_rejects_empty() {
        let err = PointPrompt::new(vec![], vec![]).unwrap_err();
        assert!(matches!(err, SegmentError::InvalidPrompt(_)));
    }

    #[test]
    fn batch_requires_parallel_sequences() {
        let err = PredictionBatch::new(
            vec![Array2::from_elem((2, 2), false)],
            vec![0.5, 0.6],
            vec![Array2::zeros((2, 2))],
        )
        .unwrap_err();
        assert!(matches!(err, SegmentError::MalformedBatch(_)));

        let err = PredictionBatch::new(vec![], vec![], vec![]).unwrap_err();
        assert!(matches!(err, SegmentError::MalformedBatch(_)));
    }

    #[test]
    fn request_from_prompt_keeps_each_form() {
        let points = PointPrompt::foreground(4.0, 5.0);
        let mask = Array2::<f32>::ones((3, 3));

        let req = PredictRequest::from_prompt(&Prompt::Point(points.clone()), true);
        assert_eq!(req.points.as_ref(), Some(&points));
        assert!(req.mask_input.is_none());

        let req = PredictRequest::from_prompt(&Prompt::Mask(mask.clone()), false);
        assert!(req.points.is_none());
        assert_eq!(req.mask_input.as_ref(), Some(&mask));
        assert!(!req.multimask_output);

        let req = PredictRequest::from_prompt(
            &Prompt::PointAndMask {
                points: points.clone(),
                mask: mask.clone(),
            },
            true,
        );
        assert_eq!(req.points, Some(points));
        assert_eq!(req.mask_input, Some(mask));
        assert!(req.bbox.is_none());
    }

    #[test]
    fn box_exports_xyxy() {
        let bbox = BoundingBox::new((10.0, 20.0), (30.0, 40.0));
        assert_eq!(bbox.to_xyxy(), [10.0, 20.0, 30.0, 40.0]);
    }
}
