//! Screenshot normalization for model input.
//!
//! Phone screenshots are large PNGs. Before they go over the network they are
//! downscaled to fit a bounding box and re-encoded as JPEG.

use base64::{engine::general_purpose::STANDARD, Engine};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::DynamicImage;
use thiserror::Error;

use crate::device::Resolution;

/// Default bounding box for the longest side, in pixels.
pub const DEFAULT_MAX_DIMENSION: u32 = 1024;

/// Default JPEG quality.
pub const DEFAULT_QUALITY: u8 = 80;

/// Image normalization errors.
#[derive(Error, Debug)]
pub enum NormalizeError {
    #[error("No image data to normalize")]
    Empty,
    #[error("Failed to decode screenshot: {0}")]
    Decode(#[source] image::ImageError),
    #[error("Failed to encode JPEG: {0}")]
    Encode(#[source] image::ImageError),
}

/// A downscaled JPEG ready to be sent to a model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedImage {
    pub bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// Dimensions of the screenshot this was derived from.
    pub source: Resolution,
}

impl NormalizedImage {
    /// Always `image/jpeg`.
    pub fn mime_type(&self) -> &'static str {
        "image/jpeg"
    }

    /// Standard base64 of the JPEG bytes.
    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.bytes)
    }
}

/// Downscale `raw` so neither side exceeds `max_dimension`, then encode as
/// JPEG at `quality` (clamped to 1..=100).
///
/// Images already inside the box keep their size. Output is a pure function
/// of the inputs.
pub fn normalize(
    raw: &[u8],
    max_dimension: u32,
    quality: u8,
) -> Result<NormalizedImage, NormalizeError> {
    if raw.is_empty() {
        return Err(NormalizeError::Empty);
    }

    let img = image::load_from_memory(raw).map_err(NormalizeError::Decode)?;
    let source = Resolution::new(img.width(), img.height());
    let (width, height) = fit_within(source.width, source.height, max_dimension);

    let resized = if (width, height) == (source.width, source.height) {
        img
    } else {
        img.resize_exact(width, height, FilterType::Triangle)
    };

    // JPEG has no alpha channel
    let rgb = DynamicImage::ImageRgb8(resized.to_rgb8());

    let mut bytes = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut bytes, quality.clamp(1, 100));
    rgb.write_with_encoder(encoder)
        .map_err(NormalizeError::Encode)?;

    tracing::debug!(
        source = %source,
        width,
        height,
        raw_bytes = raw.len(),
        jpeg_bytes = bytes.len(),
        "normalized screenshot"
    );

    Ok(NormalizedImage {
        bytes,
        width,
        height,
        source,
    })
}

/// Largest size with the same aspect ratio that fits in a `max` square.
fn fit_within(width: u32, height: u32, max: u32) -> (u32, u32) {
    let longest = width.max(height);
    if max == 0 || longest <= max {
        return (width, height);
    }
    let ratio = max as f64 / longest as f64;
    let w = ((width as f64 * ratio).round() as u32).clamp(1, max);
    let h = ((height as f64 * ratio).round() as u32).clamp(1, max);
    (w, h)
}
