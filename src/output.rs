//! CLI output formatting for every command.
//!
//! # Output Format
//!
//! ## Compose
//!
//! ```text
//! custom-image.png ← photos/ada.jpg
//!     Template: poster
//!     Crop: 200x200+50+50
//!     Text: Abdullah Ibn Mu (trimmed)
//!     Output: 3000x2800, 412 KB image/png
//! ```
//!
//! ## Batch
//!
//! ```text
//! 001 photos/ada.jpg → ada.png
//!     Crop: 600x600+40+0 (clamped)
//!     composed
//! 002 photos/missing.jpg
//!     Error: Source image not found: jobs/photos/missing.jpg
//!
//! Batch: 1 succeeded, 1 failed
//! Cache: 1 composed
//! ```
//!
//! ## Check
//!
//! ```text
//! Templates
//! 001 poster (default)
//!     Asset: 3000x2800
//!     Photo: 2415x1349+290+1075
//!     Text: 2415x160+290+2480, 96px, max 15 chars
//! 002 round
//!     Error: template asset round.png could not be loaded: No such file or directory
//! ```
//!
//! # Architecture
//!
//! Each command has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure: no I/O, no side effects.

use crate::batch::{BatchEvent, BatchOutcome, JobStatus};
use crate::compose::{ComposeError, CompositionResult, Template};
use crate::imaging::Rect;

fn format_index(pos: usize) -> String {
    format!("{:03}", pos)
}

fn crop_line(crop: Rect, clamped: bool) -> String {
    if clamped {
        format!("    Crop: {crop} (clamped)")
    } else {
        format!("    Crop: {crop}")
    }
}

fn format_size(bytes: usize) -> String {
    match bytes {
        0..1024 => format!("{bytes} B"),
        1024..1_048_576 => format!("{} KB", bytes / 1024),
        _ => format!("{:.1} MB", bytes as f64 / 1_048_576.0),
    }
}

// ============================================================================
// Compose
// ============================================================================

/// Format the result of a single `compose` run.
pub fn format_compose_result(
    result: &CompositionResult,
    template: &str,
    source: &str,
    output: &str,
) -> Vec<String> {
    let mut lines = vec![
        format!("{output} ← {source}"),
        format!("    Template: {template}"),
        crop_line(result.crop, result.crop_clamped),
    ];
    if let Some(text) = &result.text {
        if text.trimmed {
            lines.push(format!("    Text: {} (trimmed)", text.text));
        } else {
            lines.push(format!("    Text: {}", text.text));
        }
    }
    lines.push(format!(
        "    Output: {}x{}, {} {}",
        result.image.width(),
        result.image.height(),
        format_size(result.encoded.bytes.len()),
        result.encoded.content_type
    ));
    lines
}

pub fn print_compose_result(result: &CompositionResult, template: &str, source: &str, output: &str) {
    for line in format_compose_result(result, template, source, output) {
        println!("{}", line);
    }
}

// ============================================================================
// Batch
// ============================================================================

/// Format one batch progress event. Job indexes are shown 1-based.
pub fn format_batch_event(event: &BatchEvent) -> Vec<String> {
    match event {
        BatchEvent::Finished {
            index,
            source,
            output,
            status,
            crop,
            crop_clamped,
            text,
        } => {
            let mut lines = vec![
                format!("{} {} → {}", format_index(index + 1), source, output),
                crop_line(*crop, *crop_clamped),
            ];
            if let Some(text) = text {
                lines.push(format!("    Text: {text}"));
            }
            lines.push(
                match status {
                    JobStatus::Cached => "    cached",
                    JobStatus::Copied => "    copied",
                    JobStatus::Composed => "    composed",
                }
                .to_string(),
            );
            lines
        }
        BatchEvent::Failed {
            index,
            source,
            error,
        } => vec![
            format!("{} {}", format_index(index + 1), source),
            format!("    Error: {error}"),
        ],
    }
}

/// Format the totals printed after a batch finishes.
pub fn format_batch_summary(outcome: &BatchOutcome) -> Vec<String> {
    vec![
        String::new(),
        format!(
            "Batch: {} succeeded, {} failed",
            outcome.succeeded, outcome.failed
        ),
        format!("Cache: {}", outcome.cache_stats),
    ]
}

pub fn print_batch_summary(outcome: &BatchOutcome) {
    for line in format_batch_summary(outcome) {
        println!("{}", line);
    }
}

// ============================================================================
// Check
// ============================================================================

/// Format per-template load results for `check`.
pub fn format_check_output(
    default_template: &str,
    checks: &[(String, Result<Template, ComposeError>)],
) -> Vec<String> {
    let mut lines = vec!["Templates".to_string()];

    for (i, (name, result)) in checks.iter().enumerate() {
        let header = format!("{} {}", format_index(i + 1), name);
        if name == default_template {
            lines.push(format!("{header} (default)"));
        } else {
            lines.push(header);
        }

        match result {
            Ok(template) => {
                lines.push(format!(
                    "    Asset: {}x{}",
                    template.image.width(),
                    template.image.height()
                ));
                lines.push(format!("    Photo: {}", template.photo));
                if template.circular_mask {
                    lines.push("    Mask: circular".to_string());
                }
                if let Some(text) = &template.text {
                    lines.push(format!(
                        "    Text: {}, {}px, max {} chars",
                        text.text_box, text.font_size, text.max_chars
                    ));
                }
            }
            Err(e) => lines.push(format!("    Error: {e}")),
        }
    }

    lines
}

pub fn print_check_output(default_template: &str, checks: &[(String, Result<Template, ComposeError>)]) {
    for line in format_check_output(default_template, checks) {
        println!("{}", line);
    }
}

// ============================================================================
// Tests
// ============================================================================
