//! Integer rectangle and point arithmetic.
//!
//! All functions here are pure and testable without any I/O or images.
//! Coordinates are unsigned pixel offsets; edges saturate at `u32::MAX`
//! instead of wrapping, so no rect computed here can alias a region on the
//! other side of the image.

use serde::{Deserialize, Serialize};
use std::fmt;

/// An integer placement coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: u32,
    pub y: u32,
}

impl Point {
    pub const fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }
}

/// An axis-aligned rectangle in pixel space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl fmt::Display for Rect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}+{}+{}", self.width, self.height, self.x, self.y)
    }
}

/// A crop area expressed in percent of the source image (0–100 per axis),
/// the form interactive crop widgets usually report.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PercentArea {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Rect anchored at the origin covering a `width`×`height` image.
    pub const fn from_size(width: u32, height: u32) -> Self {
        Self::new(0, 0, width, height)
    }

    /// Exclusive right edge.
    pub fn right(&self) -> u32 {
        self.x.saturating_add(self.width)
    }

    /// Exclusive bottom edge.
    pub fn bottom(&self) -> u32 {
        self.y.saturating_add(self.height)
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn area(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn origin(&self) -> Point {
        Point::new(self.x, self.y)
    }

    /// Center point, rounded toward the origin.
    pub fn center(&self) -> Point {
        Point::new(
            self.x.saturating_add(self.width / 2),
            self.y.saturating_add(self.height / 2),
        )
    }

    pub fn contains(&self, point: Point) -> bool {
        point.x >= self.x && point.x < self.right() && point.y >= self.y && point.y < self.bottom()
    }

    /// Intersection of `self` with `bounds`.
    ///
    /// The result is anchored at `max(self.x, bounds.x), max(self.y, bounds.y)`.
    /// When the two rects do not overlap the result has zero width or height;
    /// callers decide whether that is an error.
    pub fn clamp(&self, bounds: &Rect) -> Rect {
        let x = self.x.max(bounds.x);
        let y = self.y.max(bounds.y);
        let right = self.right().min(bounds.right());
        let bottom = self.bottom().min(bounds.bottom());
        Rect::new(x, y, right.saturating_sub(x), bottom.saturating_sub(y))
    }

    /// Build a rect from fractional pixel edges.
    ///
    /// Edges are rounded independently (not sizes), so two crops sharing an
    /// edge still share it after rounding. Edges left of or above the origin
    /// are clipped to 0, shrinking the rect.
    pub fn from_fractional(x: f64, y: f64, width: f64, height: f64) -> Rect {
        let (left, right) = round_span(x, width);
        let (top, bottom) = round_span(y, height);
        Rect::new(left, top, right - left, bottom - top)
    }

    /// Convert a percentage area into pixels for a `width`×`height` source.
    pub fn from_percentages(area: &PercentArea, width: u32, height: u32) -> Rect {
        let w = f64::from(width);
        let h = f64::from(height);
        Rect::from_fractional(
            area.x / 100.0 * w,
            area.y / 100.0 * h,
            area.width / 100.0 * w,
            area.height / 100.0 * h,
        )
    }
}

/// Round a `[start, start + len)` span to integer edges, clipped at 0.
fn round_span(start: f64, len: f64) -> (u32, u32) {
    let to_edge = |v: f64| -> u32 {
        if v.is_nan() {
            0
        } else {
            v.round().clamp(0.0, f64::from(u32::MAX)) as u32
        }
    };
    let lo = to_edge(start);
    let hi = to_edge(start + len.max(0.0));
    (lo, hi.max(lo))
}
