use super::types::Backbone;
use crate::error::{Result, SegmentError};
use image::RgbImage;

/// Holds at most one encoded frame for a session.
///
/// The encoder runs at most once between two resets; `set_image` on an
/// already embedded cache does nothing, even if a different frame is passed.
/// Callers signal a new frame with [`EmbeddingCache::reset`].
pub struct EmbeddingCache<E> {
    embedding: Option<E>,
}

impl<E> Default for EmbeddingCache<E> {
    fn default() -> Self {
        Self { embedding: None }
    }
}

impl<E> EmbeddingCache<E> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_embedded(&self) -> bool {
        self.embedding.is_some()
    }

    /// Encode `frame` unless an embedding is already cached
    pub fn set_image<B>(&mut self, backbone: &mut B, frame: &RgbImage) -> Result<&E>
    where
        B: Backbone<Embedding = E> + ?Sized,
    {
        if self.embedding.is_some() {
            tracing::debug!("Embedding cache hit, skipping encode");
            return self.get();
        }

        tracing::debug!("Embedding cache miss");
        self.encode(backbone, frame)
    }

    /// Encode `frame` regardless of what is cached
    pub fn force_reset<B>(&mut self, backbone: &mut B, frame: &RgbImage) -> Result<&E>
    where
        B: Backbone<Embedding = E> + ?Sized,
    {
        tracing::info!("Forcing re-encode of frame");
        self.encode(backbone, frame)
    }

    /// Drop the cached embedding so the next frame is encoded
    pub fn reset(&mut self) {
        if self.embedding.take().is_some() {
            tracing::debug!("Embedding cache cleared");
        }
    }

    pub fn get(&self) -> Result<&E> {
        self.embedding.as_ref().ok_or(SegmentError::NotEmbedded)
    }

    fn encode<B>(&mut self, backbone: &mut B, frame: &RgbImage) -> Result<&E>
    where
        B: Backbone<Embedding = E> + ?Sized,
    {
        let _span = tracing::debug_span!("encode").entered();
        let (width, height) = frame.dimensions();
        tracing::debug!("Encoding {}x{} frame", width, height);

        // A failed encode leaves the cache empty
        self.embedding = None;
        let embedding = backbone.encode(frame)?;
        Ok(self.embedding.insert(embedding))
    }
}
