//! Shared test utilities for the poster-frame test suite.
//!
//! Provides deterministic image builders and on-disk fixtures for the
//! compose and batch stages.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let tmp = setup_assets(1000, 1000);
//! let photo = gradient_image(400, 300);
//! assert_eq!(photo.get_pixel(150, 150), &gradient_pixel(150, 150));
//! ```

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder, Rgba, RgbaImage};
use tempfile::TempDir;

// =========================================================================
// Image builders
// =========================================================================

/// Pixel value of [`gradient_image`] at `(x, y)`.
pub fn gradient_pixel(x: u32, y: u32) -> Rgba<u8> {
    Rgba([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8, 255])
}

/// Opaque image whose every pixel encodes its own coordinates.
pub fn gradient_image(width: u32, height: u32) -> RgbaImage {
    RgbaImage::from_fn(width, height, gradient_pixel)
}

/// Image filled with one color.
pub fn solid_image(width: u32, height: u32, color: Rgba<u8>) -> RgbaImage {
    RgbaImage::from_pixel(width, height, color)
}

// =========================================================================
// Encoders
// =========================================================================

/// PNG bytes of `image`.
pub fn encode_png_bytes(image: &RgbaImage) -> Vec<u8> {
    let mut bytes = Vec::new();
    PngEncoder::new(&mut bytes)
        .write_image(
            image.as_raw(),
            image.width(),
            image.height(),
            ExtendedColorType::Rgba8,
        )
        .unwrap();
    bytes
}

/// JPEG bytes of `image` (alpha dropped), like a camera upload.
pub fn encode_jpeg(image: &RgbaImage) -> Vec<u8> {
    let rgb = image::DynamicImage::ImageRgba8(image.clone()).to_rgb8();
    let mut bytes = Vec::new();
    JpegEncoder::new_with_quality(&mut bytes, 90)
        .write_image(
            rgb.as_raw(),
            rgb.width(),
            rgb.height(),
            ExtendedColorType::Rgb8,
        )
        .unwrap();
    bytes
}

// =========================================================================
// Fixture setup
// =========================================================================

/// Background color of the template written by [`setup_assets`].
pub const TEMPLATE_COLOR: Rgba<u8> = Rgba([30, 60, 200, 255]);

/// Temp assets directory holding a solid `base-image.png` of the given size.
pub fn setup_assets(width: u32, height: u32) -> TempDir {
    let tmp = TempDir::new().unwrap();
    let template = solid_image(width, height, TEMPLATE_COLOR);
    std::fs::write(tmp.path().join("base-image.png"), encode_png_bytes(&template)).unwrap();
    tmp
}
