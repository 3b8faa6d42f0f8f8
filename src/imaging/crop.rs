//! Sub-rectangle extraction.
//!
//! Cropping is a pure pixel copy: no resampling, no color conversion. The
//! requested rect is clamped to the source bounds first; a partial overlap
//! is tolerated (and flagged), an empty one is an error.

use super::error::ImagingError;
use super::geometry::Rect;
use image::RgbaImage;
use image::imageops;

/// The region actually extracted from a source image.
#[derive(Debug, Clone)]
pub struct Crop {
    pub image: RgbaImage,
    /// Region of the source that was copied, after clamping.
    pub region: Rect,
    /// True when `region` is smaller than the requested rect.
    pub clamped: bool,
}

/// Copy `requested` out of `source`, clamped to the source bounds.
pub fn extract(source: &RgbaImage, requested: Rect) -> Result<Crop, ImagingError> {
    let bounds = Rect::from_size(source.width(), source.height());
    let region = requested.clamp(&bounds);
    if region.is_empty() {
        return Err(ImagingError::CropOutOfBounds { requested, bounds });
    }

    let clamped = region != requested;
    if clamped {
        tracing::warn!(%requested, %region, "crop clamped to source bounds");
    }

    let image = imageops::crop_imm(source, region.x, region.y, region.width, region.height)
        .to_image();

    Ok(Crop {
        image,
        region,
        clamped,
    })
}
