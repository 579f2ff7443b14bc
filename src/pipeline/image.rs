//! Image preprocessing before extraction.

use crate::core::error::PipelineError;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageOptions {
    pub max_width: u32,
    pub jpeg_quality: u8,
}

impl Default for ImageOptions {
    fn default() -> Self {
        ImageOptions {
            max_width: 1024,
            jpeg_quality: 80,
        }
    }
}

/// Downscales `bytes` to at most `max_width` pixels wide, keeping the aspect
/// ratio, and re-encodes the result as RGB JPEG.
pub fn optimize_image(bytes: &[u8], options: ImageOptions) -> Result<Vec<u8>, PipelineError> {
    let img = image::load_from_memory(bytes)
        .map_err(|e| PipelineError::InvalidDocument(format!("cannot decode image: {e}")))?;
    let (width, height) = img.dimensions();

    let img = if width > options.max_width {
        let ratio = f64::from(options.max_width) / f64::from(width);
        let new_height = ((f64::from(height) * ratio) as u32).max(1);
        debug!(
            "Resizing image from {}x{} to {}x{}",
            width, height, options.max_width, new_height
        );
        img.resize_exact(options.max_width, new_height, FilterType::CatmullRom)
    } else {
        img
    };

    let mut out = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut out, options.jpeg_quality);
    DynamicImage::ImageRgb8(img.to_rgb8())
        .write_with_encoder(encoder)
        .map_err(|e| PipelineError::InvalidDocument(format!("cannot encode image: {e}")))?;
    Ok(out)
}
