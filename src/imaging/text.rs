//! Caption fitting and glyph rendering.
//!
//! [`fit`] trims a caption until it fits a box: first to a hard character
//! limit, then one trailing character at a time while the measured width
//! still exceeds the box. Measurement goes through the [`TextMeasure`] trait
//! so the trimming policy can be tested without a font.
//!
//! The production measurer is [`ScaledFace`]: an `ab_glyph` font at a pixel
//! size. Width is the sum of horizontal advances plus pair kerning, which is
//! deterministic for a given font file.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Font parsing | `ab_glyph::FontArc` |
//! | Advance + kerning | `ab_glyph::ScaleFont::{h_advance, kern}` |
//! | Rasterization | `ab_glyph::Font::outline_glyph` + `OutlinedGlyph::draw` |

use super::composite::over;
use super::error::ImagingError;
use super::geometry::{Point, Rect};
use super::params::Color;
use ab_glyph::{Font, FontArc, GlyphId, PxScale, ScaleFont, point};
use image::RgbaImage;
use sha2::{Digest, Sha256};

/// Fallback face used when a template does not name a font file.
const EMBEDDED_FONT: &[u8] = include_bytes!("../../assets/fonts/DejaVuSans.ttf");

/// Width of a string as it would be drawn.
pub trait TextMeasure {
    /// Rendered width of `text` in pixels.
    fn text_width(&self, text: &str) -> f32;
}

/// A caption after fitting, with the point to center it on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FittedText {
    pub text: String,
    /// Center of the text box; the caption is drawn centered on it
    /// horizontally and on its middle line vertically.
    pub anchor: Point,
    /// True when any character was dropped.
    pub trimmed: bool,
}

/// Trim `text` to at most `max_chars` characters, then drop trailing
/// characters until it measures no wider than `text_box`.
///
/// Terminates after at most `max_chars + 1` measurements. The result is
/// either empty or no wider than the box.
pub fn fit(text: &str, text_box: Rect, max_chars: usize, measure: &impl TextMeasure) -> FittedText {
    let mut fitted: String = text.chars().take(max_chars).collect();
    let limit = text_box.width as f32;

    while !fitted.is_empty() && measure.text_width(&fitted) > limit {
        fitted.pop();
    }

    FittedText {
        trimmed: fitted != text,
        text: fitted,
        anchor: text_box.center(),
    }
}

/// A parsed font, cheap to clone.
#[derive(Clone)]
pub struct FontFace {
    font: FontArc,
    /// SHA-256 of the font file.
    digest: [u8; 32],
}

impl std::fmt::Debug for FontFace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FontFace")
            .field("glyphs", &self.font.glyph_count())
            .finish()
    }
}

impl FontFace {
    /// The built-in DejaVu Sans face.
    pub fn embedded() -> Result<Self, ImagingError> {
        let font = FontArc::try_from_slice(EMBEDDED_FONT)
            .map_err(|e| ImagingError::Font(format!("embedded font: {e}")))?;
        Ok(Self {
            font,
            digest: Sha256::digest(EMBEDDED_FONT).into(),
        })
    }

    /// Parse a TrueType / OpenType font from raw bytes.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, ImagingError> {
        let digest = Sha256::digest(&bytes).into();
        let font = FontArc::try_from_vec(bytes).map_err(|e| ImagingError::Font(e.to_string()))?;
        Ok(Self { font, digest })
    }

    /// SHA-256 of the font file this face was parsed from.
    pub fn digest(&self) -> &[u8; 32] {
        &self.digest
    }

    /// This face at `px` pixels per em, the way CSS and canvas size fonts.
    ///
    /// `ab_glyph` scales by line height (ascent − descent), so the em size is
    /// converted through the font's units-per-em.
    pub fn at_size(&self, px: f32) -> ScaledFace<'_> {
        let scale = match self.font.units_per_em() {
            Some(upem) if upem > 0.0 => PxScale::from(px * self.font.height_unscaled() / upem),
            _ => PxScale::from(px),
        };
        ScaledFace {
            font: &self.font,
            scale,
        }
    }
}

/// A [`FontFace`] at a fixed pixel size.
#[derive(Clone, Copy)]
pub struct ScaledFace<'a> {
    font: &'a FontArc,
    scale: PxScale,
}

impl TextMeasure for ScaledFace<'_> {
    fn text_width(&self, text: &str) -> f32 {
        let scaled = self.font.as_scaled(self.scale);
        let mut width = 0.0f32;
        let mut prev: Option<GlyphId> = None;
        for c in text.chars() {
            let id = scaled.glyph_id(c);
            if let Some(prev) = prev {
                width += scaled.kern(prev, id);
            }
            width += scaled.h_advance(id);
            prev = Some(id);
        }
        width
    }
}

impl ScaledFace<'_> {
    /// Draw `text` centered on `anchor`, blending glyph coverage over the
    /// existing canvas pixels. Glyph pixels outside the canvas are dropped.
    pub fn draw(&self, canvas: &mut RgbaImage, text: &str, anchor: Point, color: Color) {
        if text.is_empty() {
            return;
        }

        let scaled = self.font.as_scaled(self.scale);
        let (canvas_w, canvas_h) = (i64::from(canvas.width()), i64::from(canvas.height()));

        let mut caret = anchor.x as f32 - self.text_width(text) / 2.0;
        // middle baseline: the em box is centered on the anchor
        let baseline = anchor.y as f32 + (scaled.ascent() + scaled.descent()) / 2.0;
        let mut prev: Option<GlyphId> = None;

        for c in text.chars() {
            let id = scaled.glyph_id(c);
            if let Some(prev) = prev {
                caret += scaled.kern(prev, id);
            }

            let glyph = id.with_scale_and_position(self.scale, point(caret, baseline));
            if let Some(outlined) = self.font.outline_glyph(glyph) {
                let bounds = outlined.px_bounds();
                let (left, top) = (bounds.min.x as i64, bounds.min.y as i64);
                outlined.draw(|gx, gy, coverage| {
                    let x = left + i64::from(gx);
                    let y = top + i64::from(gy);
                    if x < 0 || y < 0 || x >= canvas_w || y >= canvas_h {
                        return;
                    }
                    let alpha = (coverage.clamp(0.0, 1.0) * f32::from(color.a)).round() as u8;
                    if alpha == 0 {
                        return;
                    }
                    let src = Color { a: alpha, ..color }.to_rgba();
                    let dst = canvas.get_pixel_mut(x as u32, y as u32);
                    *dst = over(*dst, src);
                });
            }

            caret += scaled.h_advance(id);
            prev = Some(id);
        }
    }
}
