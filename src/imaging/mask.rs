//! Circular alpha masking.
//!
//! The mask is the circle inscribed in the image: centered on the image
//! center with radius `min(width, height) / 2`. A pixel is kept when the
//! distance from its center to the circle center is at most the radius.
//!
//! The test runs on doubled coordinates so it stays in integers: for pixel
//! `(x, y)` the doubled offset from the center is `2x + 1 - width`, and the
//! doubled radius is `min(width, height)`.

use image::RgbaImage;

/// Apply the circular mask when `circular` is set; otherwise pass through.
///
/// Dimensions never change. RGB values are left untouched, even outside the
/// circle, so only alpha carries the mask.
pub fn apply(mut image: RgbaImage, circular: bool) -> RgbaImage {
    if !circular {
        return image;
    }

    let (width, height) = image.dimensions();
    let diameter = i64::from(width.min(height));
    let radius_sq = diameter * diameter;

    for (x, y, pixel) in image.enumerate_pixels_mut() {
        if !inside_circle(x, y, width, height, radius_sq) {
            pixel[3] = 0;
        }
    }
    image
}

fn inside_circle(x: u32, y: u32, width: u32, height: u32, radius_sq: i64) -> bool {
    let dx = 2 * i64::from(x) + 1 - i64::from(width);
    let dy = 2 * i64::from(y) + 1 - i64::from(height);
    dx * dx + dy * dy <= radius_sq
}
