//! Errors raised by the pixel-level stages.

use super::geometry::Rect;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ImagingError {
    /// The requested crop does not overlap the source image at all.
    #[error("crop {requested} does not intersect source bounds {bounds}")]
    CropOutOfBounds { requested: Rect, bounds: Rect },
    #[error("failed to decode image: {0}")]
    Decode(String),
    #[error("failed to encode image: {0}")]
    Encode(String),
    #[error("invalid font data: {0}")]
    Font(String),
}
