use super::embedding::EmbeddingCache;
use super::select::{argmax, select_first_pass, select_second_pass};
use super::types::{
    Backbone, BoundingBox, PointPrompt, PredictRequest, PredictionBatch, Prompt, ResultMask,
};
use crate::error::{Result, SegmentError};
use image::RgbImage;
use ndarray::Array2;

/// Interactive segmentation session over one backbone.
///
/// Turns clicks or a box into a single binary mask with two predict passes:
/// the soft logits of the first pass are fed back as a mask hint for the
/// second. The session caches one frame embedding at a time; call
/// [`Segmentor::new_frame`] before prompting on a different frame.
///
/// Not thread-safe: one session per backbone instance.
pub struct Segmentor<B: Backbone> {
    backbone: B,
    cache: EmbeddingCache<B::Embedding>,
}

impl<B: Backbone> Segmentor<B> {
    pub fn new(backbone: B) -> Self {
        Self {
            backbone,
            cache: EmbeddingCache::new(),
        }
    }

    /// Compute the embedding only once per frame
    pub fn set_image(&mut self, frame: &RgbImage) -> Result<()> {
        self.cache.set_image(&mut self.backbone, frame)?;
        Ok(())
    }

    /// Re-encode `frame` even if an embedding is cached
    pub fn force_reset(&mut self, frame: &RgbImage) -> Result<()> {
        self.cache.force_reset(&mut self.backbone, frame)?;
        Ok(())
    }

    /// Forget the cached embedding; the next prompt encodes its frame
    pub fn new_frame(&mut self) {
        self.cache.reset();
    }

    pub fn is_embedded(&self) -> bool {
        self.cache.is_embedded()
    }

    pub fn backbone(&self) -> &B {
        &self.backbone
    }

    pub fn into_backbone(self) -> B {
        self.backbone
    }

    /// Single predict pass against the cached embedding
    ///
    /// Fails with [`SegmentError::NotEmbedded`] if no frame has been set.
    pub fn interactive_predict(
        &mut self,
        prompt: &Prompt,
        multimask: bool,
    ) -> Result<PredictionBatch> {
        let request = PredictRequest::from_prompt(prompt, multimask);
        self.predict(&request)
    }

    /// Segment the object under the clicked points
    ///
    /// # Arguments
    /// * `frame` - Frame the clicks refer to (encoded lazily)
    /// * `points` - Click coordinates with foreground/background labels
    /// * `min_area` - Candidates need strictly more pixels than this
    /// * `multimask` - Ask the backbone for several candidates per pass
    ///
    /// Returns: binary mask at frame resolution. Never fails on a degenerate
    /// prompt; an empty first pass simply yields an empty mask hint.
    pub fn segment_with_click(
        &mut self,
        frame: &RgbImage,
        points: &PointPrompt,
        min_area: usize,
        multimask: bool,
    ) -> Result<ResultMask> {
        let _span = tracing::debug_span!("segment_with_click", points = points.len()).entered();

        if min_area == 0 {
            return Err(SegmentError::InvalidMinArea(min_area));
        }
        self.set_image(frame)?;

        let first = self.interactive_predict(&Prompt::Point(points.clone()), multimask)?;
        let hint = match select_first_pass(&first, min_area) {
            Some(i) => first.logits()[i].clone(),
            None => Array2::zeros(first.logits()[0].raw_dim()),
        };

        let second = self.interactive_predict(
            &Prompt::PointAndMask {
                points: points.clone(),
                mask: hint,
            },
            multimask,
        )?;
        let selected = select_second_pass(&second, min_area);

        Ok(to_result_mask(&second.masks()[selected]))
    }

    /// Segment the object inside a box
    ///
    /// Both passes keep the top-scoring candidate; there is no area filter.
    /// Returns a one-element list, matching the multi-object convention.
    pub fn segment_with_box(
        &mut self,
        frame: &RgbImage,
        bbox: &BoundingBox,
        reset_embedding: bool,
    ) -> Result<Vec<ResultMask>> {
        let _span = tracing::debug_span!("segment_with_box").entered();

        if reset_embedding {
            self.force_reset(frame)?;
        } else {
            self.set_image(frame)?;
        }

        let first = self.predict(&PredictRequest::from_box(*bbox, true))?;
        let best = best_by_score(&first);
        tracing::debug!("Box first pass picked candidate {}", best);

        let request =
            PredictRequest::from_box(*bbox, true).with_mask_input(first.logits()[best].clone());
        let second = self.predict(&request)?;
        let best = best_by_score(&second);
        tracing::debug!("Box second pass picked candidate {}", best);

        Ok(vec![to_result_mask(&second.masks()[best])])
    }

    fn predict(&mut self, request: &PredictRequest) -> Result<PredictionBatch> {
        let embedding = self.cache.get()?;

        let _span = tracing::debug_span!("predict").entered();
        let batch = self.backbone.predict(embedding, request)?;
        tracing::debug!("Backbone returned {} candidates", batch.len());
        Ok(batch)
    }
}

fn best_by_score(batch: &PredictionBatch) -> usize {
    // PredictionBatch is never empty
    argmax(batch.scores()).unwrap_or(0)
}

fn to_result_mask(mask: &Array2<bool>) -> ResultMask {
    mask.mapv(u8::from)
}
