//! # Poster Frame
//!
//! Turns a personal photo into a finished poster: crop the photo, optionally
//! cut it to a circle, place it on a fixed template image, stamp a caption
//! that is trimmed to fit its box, and encode the result as PNG.
//!
//! # Architecture: One-Way Pipeline
//!
//! ```text
//! upload ─ decode ─ crop ─ mask ─ composite ─ encode ─ poster.png
//!                                    ▲   ▲
//!                       template ────┘   └──── fitted caption
//! ```
//!
//! Every stage is a plain function from its inputs to a new image. Templates
//! are loaded once and only ever read, so any number of compositions can run
//! side by side; [`batch`] does exactly that on a rayon pool.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`imaging`] | Pixel stages: geometry, crop, mask, caption fitting, compositing, PNG encoding |
//! | [`compose`] | Template loading and the request → poster pipeline |
//! | [`batch`] | Parallel composition of a JSON job list with progress events |
//! | [`cache`] | Content-addressed output cache for batch re-runs |
//! | [`config`] | `poster.toml` loading, validation, and merging over stock defaults |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Clamp, Don't Guess
//!
//! A crop that overhangs the photo is clamped to the photo and flagged
//! ([`compose::CompositionResult::crop_clamped`]); a crop that misses it
//! entirely is an error. Nothing is ever padded or re-centered silently.
//!
//! ## Fail Fast on Assets
//!
//! Template images and fonts are loaded when the command starts. A missing
//! asset stops the run before the first photo is touched.
//!
//! ## Lossless Output
//!
//! Posters are always PNG, so the bytes written decode back to exactly the
//! composited pixels.

pub mod batch;
pub mod cache;
pub mod compose;
pub mod config;
pub mod imaging;
pub mod output;

#[cfg(test)]
pub(crate) mod test_helpers;
