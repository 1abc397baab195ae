use super::types::ResultMask;
use anyhow::{ensure, Result};
use image::{imageops, GrayImage, RgbImage};
use ndarray::Array4;

/// ImageNet statistics the SAM encoder was trained with (0-255 scale)
const PIXEL_MEAN: [f32; 3] = [123.675, 116.28, 103.53];
const PIXEL_STD: [f32; 3] = [58.395, 57.12, 57.375];

/// Preprocessor for converting RGB frames to SAM encoder input tensors
pub struct Preprocessor {
    target_length: u32,
}

impl Preprocessor {
    pub fn new(target_length: u32) -> Self {
        Self { target_length }
    }

    pub fn target_length(&self) -> u32 {
        self.target_length
    }

    /// Size of `(width, height)` after scaling the longest side to the
    /// target length
    pub fn resized_dimensions(&self, width: u32, height: u32) -> (u32, u32) {
        let scale = self.target_length as f64 / width.max(height) as f64;
        let new_w = (width as f64 * scale + 0.5) as u32;
        let new_h = (height as f64 * scale + 0.5) as u32;
        (new_w, new_h)
    }

    /// Map a point from frame pixels to model input pixels
    pub fn apply_coords(&self, (x, y): (f32, f32), original: (u32, u32)) -> (f32, f32) {
        let (orig_w, orig_h) = original;
        let (new_w, new_h) = self.resized_dimensions(orig_w, orig_h);
        (
            x * (new_w as f32 / orig_w as f32),
            y * (new_h as f32 / orig_h as f32),
        )
    }

    /// Preprocess an RGB frame into a normalized, zero-padded NCHW tensor
    ///
    /// Steps:
    /// 1. Resize so the longest side equals the target length
    /// 2. Normalize each channel with the SAM pixel mean/std
    /// 3. Pad bottom/right to a square and transpose HWC to NCHW
    ///
    /// Returns: Array4<f32> with shape [1, 3, target, target]
    pub fn preprocess(&self, image: &RgbImage) -> Result<Array4<f32>> {
        let _span = tracing::debug_span!("preprocess").entered();

        let (width, height) = image.dimensions();
        ensure!(width > 0 && height > 0, "Cannot encode an empty {}x{} frame", width, height);

        let (new_w, new_h) = self.resized_dimensions(width, height);
        let resized = if (new_w, new_h) != (width, height) {
            imageops::resize(image, new_w, new_h, imageops::FilterType::Triangle)
        } else {
            image.clone()
        };

        let side = self.target_length as usize;
        let mut tensor = Array4::<f32>::zeros((1, 3, side, side));

        for (x, y, pixel) in resized.enumerate_pixels() {
            for c in 0..3 {
                tensor[[0, c, y as usize, x as usize]] =
                    (pixel[c] as f32 - PIXEL_MEAN[c]) / PIXEL_STD[c];
            }
        }

        Ok(tensor)
    }

    /// Convert a binary mask to a grayscale image (1 -> 255) for visualization
    pub fn mask_to_luma(mask: &ResultMask) -> GrayImage {
        let (rows, cols) = mask.dim();
        GrayImage::from_fn(cols as u32, rows as u32, |x, y| {
            let value = if mask[[y as usize, x as usize]] > 0 { 255 } else { 0 };
            image::Luma([value])
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    #[test]
    fn longest_side_scales_to_target() {
        let pre = Preprocessor::new(1024);
        assert_eq!(pre.resized_dimensions(1920, 1080), (1024, 576));
        assert_eq!(pre.resized_dimensions(480, 640), (768, 1024));
    }

    #[test]
    fn coords_follow_resize() {
        let pre = Preprocessor::new(1024);
        let (x, y) = pre.apply_coords((960.0, 540.0), (1920, 1080));
        assert!((x - 512.0).abs() < 1e-3);
        assert!((y - 288.0).abs() < 1e-3);
    }

    #[test]
    fn preprocess_pads_with_zeros() {
        let pre = Preprocessor::new(8);
        let frame = RgbImage::from_pixel(8, 4, image::Rgb([255, 255, 255]));
        let tensor = pre.preprocess(&frame).unwrap();

        assert_eq!(tensor.shape(), &[1, 3, 8, 8]);
        let expected = (255.0 - PIXEL_MEAN[0]) / PIXEL_STD[0];
        assert!((tensor[[0, 0, 0, 0]] - expected).abs() < 1e-4);
        assert_eq!(tensor[[0, 0, 7, 7]], 0.0);
    }

    #[test]
    fn preprocess_rejects_empty_frame() {
        let pre = Preprocessor::new(8);
        assert!(pre.preprocess(&RgbImage::new(0, 0)).is_err());
    }

    #[test]
    fn mask_to_luma_keeps_layout() {
        let mask = Array2::from_shape_vec((2, 3), vec![0u8, 1, 0, 1, 1, 0]).unwrap();
        let img = Preprocessor::mask_to_luma(&mask);
        assert_eq!(img.dimensions(), (3, 2));
        assert_eq!(img.get_pixel(1, 0)[0], 255);
        assert_eq!(img.get_pixel(2, 1)[0], 0);
    }
}
