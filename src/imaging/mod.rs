//! Pixel-level stages of the poster pipeline — pure Rust, no system libraries.
//!
//! | Stage | Module | Crate / function |
//! |---|---|---|
//! | **Decode** | [`encode`] | `image::load_from_memory` |
//! | **Crop** | [`crop`] | `image::imageops::crop_imm` |
//! | **Mask** | [`mask`] | integer circle test on alpha |
//! | **Fit text** | [`text`] | `ab_glyph` advances + kerning |
//! | **Composite** | [`composite`] | Lanczos3 resize + source-over blend |
//! | **Encode** | [`encode`] | `image::codecs::png::PngEncoder` |
//!
//! Every stage takes its input by reference or by value and returns a new
//! image; none keeps state between calls.

pub mod composite;
pub mod crop;
mod error;
pub mod encode;
pub mod geometry;
pub mod mask;
mod params;
pub mod text;

pub use composite::{TextLayer, composite};
pub use crop::{Crop, extract};
pub use encode::{EncodedImage, PNG_CONTENT_TYPE, decode, dimensions, encode_png};
pub use error::ImagingError;
pub use geometry::{PercentArea, Point, Rect};
pub use params::{Color, ParseColorError};
pub use text::{FittedText, FontFace, ScaledFace, TextMeasure, fit};
