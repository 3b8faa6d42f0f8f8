//! Layer compositing onto a template.
//!
//! The template is never drawn on directly: [`composite`] copies it first,
//! so one decoded template can back any number of concurrent compositions.
//!
//! Layer order is fixed: photo first, then the caption box on top. The box
//! background is painted fully opaque, so it covers any part of the photo
//! it overlaps.

use super::geometry::{Point, Rect};
use super::params::Color;
use super::text::{FittedText, ScaledFace};
use image::imageops::{self, FilterType};
use image::{Rgba, RgbaImage};

/// A fitted caption and how to paint it.
#[derive(Clone, Copy)]
pub struct TextLayer<'a> {
    pub fitted: &'a FittedText,
    pub text_box: Rect,
    pub fill: Color,
    pub background: Color,
    pub face: ScaledFace<'a>,
}

/// Composite `photo` and an optional caption onto a copy of `template`.
///
/// The photo is resized (Lanczos3) to the placement size when the two
/// differ, then blended source-over at the placement origin. Anything
/// falling outside the template is clipped.
pub fn composite(
    template: &RgbaImage,
    photo: &RgbaImage,
    placement: Rect,
    text: Option<&TextLayer<'_>>,
) -> RgbaImage {
    let mut canvas = template.clone();

    if !placement.is_empty() {
        let resized;
        let layer = if photo.dimensions() == placement.size() {
            photo
        } else {
            resized = imageops::resize(photo, placement.width, placement.height, FilterType::Lanczos3);
            &resized
        };
        blend_layer(&mut canvas, layer, placement.origin());
    }

    if let Some(text) = text
        && !text.fitted.text.is_empty()
    {
        fill_rect(&mut canvas, text.text_box, text.background.opaque());
        text.face
            .draw(&mut canvas, &text.fitted.text, text.fitted.anchor, text.fill);
    }

    canvas
}

/// Blend `layer` onto `canvas` with its top-left corner at `origin`.
fn blend_layer(canvas: &mut RgbaImage, layer: &RgbaImage, origin: Point) {
    let bounds = Rect::from_size(canvas.width(), canvas.height());
    let visible = Rect::new(origin.x, origin.y, layer.width(), layer.height()).clamp(&bounds);

    for ty in visible.y..visible.bottom() {
        for tx in visible.x..visible.right() {
            let src = *layer.get_pixel(tx - origin.x, ty - origin.y);
            let dst = canvas.get_pixel_mut(tx, ty);
            *dst = over(*dst, src);
        }
    }
}

/// Overwrite `rect` (clipped to the canvas) with `color`.
fn fill_rect(canvas: &mut RgbaImage, rect: Rect, color: Color) {
    let bounds = Rect::from_size(canvas.width(), canvas.height());
    let visible = rect.clamp(&bounds);
    let pixel = color.to_rgba();

    for y in visible.y..visible.bottom() {
        for x in visible.x..visible.right() {
            canvas.put_pixel(x, y, pixel);
        }
    }
}

/// Porter-Duff "over" on straight (non-premultiplied) RGBA8.
///
/// `out_a = sa + da·(1 − sa)` and each channel is the alpha-weighted mean
/// `(sc·sa + dc·da·(1 − sa)) / out_a`, rounded. Over an opaque destination
/// this is exactly `src·sa + dst·(1 − sa)`.
pub(crate) fn over(dst: Rgba<u8>, src: Rgba<u8>) -> Rgba<u8> {
    let sa = u32::from(src[3]);
    match sa {
        255 => return src,
        0 => return dst,
        _ => {}
    }

    // weights scaled by 255·255
    let ws = sa * 255;
    let wd = u32::from(dst[3]) * (255 - sa);
    let total = ws + wd;

    let channel = |i: usize| -> u8 {
        let mixed = u32::from(src[i]) * ws + u32::from(dst[i]) * wd;
        ((mixed + total / 2) / total) as u8
    };

    Rgba([
        channel(0),
        channel(1),
        channel(2),
        ((total + 127) / 255) as u8,
    ])
}
