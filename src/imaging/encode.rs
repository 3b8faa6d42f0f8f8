//! Decoding uploads and encoding the final poster.
//!
//! Output is always PNG: lossless, so decoding the bytes reproduces the
//! composited pixel grid exactly. Input may be any format whose decoder is
//! compiled in (see `Cargo.toml` features on `image`).

use super::error::ImagingError;
use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder, ImageReader, RgbaImage};
use std::io::Cursor;

/// Content type of every encoded poster.
pub const PNG_CONTENT_TYPE: &str = "image/png";

/// Encoded image bytes plus their content type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage {
    pub bytes: Vec<u8>,
    pub content_type: &'static str,
}

/// Decode raw upload bytes into RGBA8.
pub fn decode(bytes: &[u8]) -> Result<RgbaImage, ImagingError> {
    if bytes.is_empty() {
        return Err(ImagingError::Decode("empty input".into()));
    }
    image::load_from_memory(bytes)
        .map(|img| img.to_rgba8())
        .map_err(|e| ImagingError::Decode(e.to_string()))
}

/// Width and height of an encoded image, read from its header only.
pub fn dimensions(bytes: &[u8]) -> Result<(u32, u32), ImagingError> {
    ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| ImagingError::Decode(e.to_string()))?
        .into_dimensions()
        .map_err(|e| ImagingError::Decode(e.to_string()))
}

/// Encode `image` as PNG.
pub fn encode_png(image: &RgbaImage) -> Result<EncodedImage, ImagingError> {
    let mut bytes = Vec::new();
    PngEncoder::new(&mut bytes)
        .write_image(
            image.as_raw(),
            image.width(),
            image.height(),
            ExtendedColorType::Rgba8,
        )
        .map_err(|e| ImagingError::Encode(e.to_string()))?;

    Ok(EncodedImage {
        bytes,
        content_type: PNG_CONTENT_TYPE,
    })
}
