//! Preview image re-encoding.
//!
//! Workers hand over decoded images; before sending, the image is shrunk
//! to fit `max_size` (aspect ratio preserved, never enlarged) and encoded
//! as JPEG or PNG. The encoded payload is prefixed with a 4-byte
//! big-endian format tag.

use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType as PngFilter, PngEncoder};
use image::imageops::FilterType;
use image::DynamicImage;

use crate::error::EventError;

const JPEG_QUALITY: u8 = 95;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreviewFormat {
    Jpeg,
    Png,
}

impl PreviewFormat {
    /// Tag written in front of the encoded image.
    pub fn wire_tag(self) -> u32 {
        match self {
            PreviewFormat::Jpeg => 1,
            PreviewFormat::Png => 2,
        }
    }
}

impl FromStr for PreviewFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "JPEG" | "JPG" => Ok(PreviewFormat::Jpeg),
            "PNG" => Ok(PreviewFormat::Png),
            other => Err(format!("unsupported preview format: {other}")),
        }
    }
}

impl fmt::Display for PreviewFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PreviewFormat::Jpeg => f.write_str("JPEG"),
            PreviewFormat::Png => f.write_str("PNG"),
        }
    }
}

/// A decoded image waiting to be sent as a preview.
#[derive(Debug, Clone)]
pub struct PreviewImage {
    pub format: PreviewFormat,
    pub image: Arc<DynamicImage>,
    /// Longest allowed side in pixels; `None` keeps the original size.
    pub max_size: Option<u32>,
}

impl PreviewImage {
    pub fn new(format: PreviewFormat, image: DynamicImage, max_size: Option<u32>) -> Self {
        Self {
            format,
            image: Arc::new(image),
            max_size,
        }
    }
}

/// Shrink `image` so neither side exceeds `max_size`.
pub fn fit_within(image: &DynamicImage, max_size: u32) -> Cow<'_, DynamicImage> {
    let max_size = max_size.max(1);
    if image.width() <= max_size && image.height() <= max_size {
        return Cow::Borrowed(image);
    }
    Cow::Owned(image.resize(max_size, max_size, FilterType::Triangle))
}

/// Produce `[format tag u32 BE][encoded image]`.
pub fn encode_preview(preview: &PreviewImage) -> Result<Vec<u8>, EventError> {
    let image = match preview.max_size {
        Some(max_size) => fit_within(&preview.image, max_size),
        None => Cow::Borrowed(preview.image.as_ref()),
    };

    let mut out = Vec::new();
    out.extend_from_slice(&preview.format.wire_tag().to_be_bytes());

    match preview.format {
        PreviewFormat::Jpeg => {
            // JPEG has no alpha channel.
            let rgb = image.to_rgb8();
            let encoder = JpegEncoder::new_with_quality(&mut out, JPEG_QUALITY);
            rgb.write_with_encoder(encoder)?;
        }
        PreviewFormat::Png => {
            let encoder =
                PngEncoder::new_with_quality(&mut out, CompressionType::Fast, PngFilter::Adaptive);
            image.write_with_encoder(encoder)?;
        }
    }

    Ok(out)
}
