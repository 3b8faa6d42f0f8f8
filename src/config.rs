//! Poster template configuration.
//!
//! Handles loading, validating, and merging `poster.toml`. Stock defaults are
//! overridden key-by-key by the user file, so a config only needs the values
//! it changes.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! default_template = "poster"   # Template used when a request names none
//!
//! [templates.poster]
//! asset = "base-image.png"      # Background artwork, relative to --assets
//! circular_mask = false         # Cut the photo to its inscribed circle
//!
//! [templates.poster.photo]      # Where the cropped photo lands
//! x = 290
//! y = 1075
//! width = 2415
//! height = 1349
//!
//! [templates.poster.text]       # Optional caption box
//! x = 290
//! y = 2480
//! width = 2415
//! height = 160
//! font_size = 96.0              # Pixels per em
//! max_chars = 15                # Hard limit before width fitting
//! fill = "#ffffff"
//! background = "#1e3a8a"
//! font = "fonts/Caption.ttf"    # Omit for the built-in DejaVu Sans
//!
//! [processing]
//! max_processes = 4             # Max parallel batch workers (omit for auto)
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::imaging::{Color, Rect};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Poster configuration loaded from `poster.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PosterConfig {
    /// Template used when a request does not name one.
    pub default_template: String,
    /// Poster variants by name.
    pub templates: BTreeMap<String, TemplateConfig>,
    /// Parallel batch settings.
    pub processing: ProcessingConfig,
}

impl Default for PosterConfig {
    fn default() -> Self {
        Self {
            default_template: "poster".to_string(),
            templates: BTreeMap::from([("poster".to_string(), TemplateConfig::default())]),
            processing: ProcessingConfig::default(),
        }
    }
}

impl PosterConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.templates.is_empty() {
            return Err(ConfigError::Validation(
                "at least one template must be defined".into(),
            ));
        }
        if !self.templates.contains_key(&self.default_template) {
            return Err(ConfigError::Validation(format!(
                "default_template {:?} is not defined under [templates]",
                self.default_template
            )));
        }
        for (name, template) in &self.templates {
            template
                .validate()
                .map_err(|msg| ConfigError::Validation(format!("templates.{name}.{msg}")))?;
        }
        if self.processing.max_processes == Some(0) {
            return Err(ConfigError::Validation(
                "processing.max_processes must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// One poster variant: background asset, photo slot, optional caption box.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TemplateConfig {
    /// Background image path, relative to the assets directory.
    pub asset: String,
    /// Destination rect of the photo on the template.
    pub photo: Rect,
    /// Cut the photo to the circle inscribed in its crop.
    pub circular_mask: bool,
    /// Caption box; no caption is drawn when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<TextBoxConfig>,
}

impl Default for TemplateConfig {
    fn default() -> Self {
        Self {
            asset: "base-image.png".to_string(),
            photo: Rect::new(290, 1075, 2415, 1349),
            circular_mask: false,
            text: None,
        }
    }
}

impl TemplateConfig {
    /// Returns the offending key on failure.
    fn validate(&self) -> Result<(), String> {
        if self.asset.trim().is_empty() {
            return Err("asset must not be empty".into());
        }
        if self.photo.is_empty() {
            return Err("photo width and height must be non-zero".into());
        }
        if let Some(text) = &self.text {
            text.validate().map_err(|msg| format!("text.{msg}"))?;
        }
        Ok(())
    }
}

/// Caption box geometry and style.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TextBoxConfig {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    /// Font size in pixels per em.
    pub font_size: f32,
    /// Characters kept before width fitting starts.
    pub max_chars: usize,
    pub fill: Color,
    /// Painted fully opaque behind the caption.
    pub background: Color,
    /// TrueType/OpenType file relative to the assets directory.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub font: Option<String>,
}

impl Default for TextBoxConfig {
    fn default() -> Self {
        Self {
            x: 0,
            y: 0,
            width: 0,
            height: 0,
            font_size: 48.0,
            max_chars: 15,
            fill: Color::white(),
            background: Color::black(),
            font: None,
        }
    }
}

impl TextBoxConfig {
    pub fn rect(&self) -> Rect {
        Rect::new(self.x, self.y, self.width, self.height)
    }

    fn validate(&self) -> Result<(), String> {
        if self.width == 0 || self.height == 0 {
            return Err("width and height must be non-zero".into());
        }
        if !self.font_size.is_finite() || self.font_size <= 0.0 {
            return Err("font_size must be a positive number".into());
        }
        if self.max_chars == 0 {
            return Err("max_chars must be at least 1".into());
        }
        Ok(())
    }
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of parallel batch workers.
    /// When absent, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_processes: Option<usize>,
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config.max_processes.map(|n| n.min(cores)).unwrap_or(cores)
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the base layer user overrides are merged on top of.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(PosterConfig::default()).expect("default config must serialize")
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Merge a user config over the stock defaults.
///
/// Like [`merge_toml`], except for `[templates]`: a user file that defines
/// any template replaces the stock set, and each user template is filled in
/// from [`TemplateConfig::default`] rather than from a stock template of the
/// same name.
pub fn merge_config(mut base: toml::Value, mut overlay: toml::Value) -> toml::Value {
    let user_templates = overlay.as_table_mut().and_then(|t| t.remove("templates"));
    match user_templates {
        Some(toml::Value::Table(user)) => {
            let template_defaults = toml::Value::try_from(TemplateConfig::default())
                .expect("default template must serialize");
            let filled: toml::Table = user
                .into_iter()
                .map(|(name, tc)| (name, merge_toml(template_defaults.clone(), tc)))
                .collect();
            if let Some(table) = base.as_table_mut() {
                table.insert("templates".into(), toml::Value::Table(filled));
            }
        }
        // not a table: leave it for deserialization to reject
        Some(other) => {
            if let Some(table) = overlay.as_table_mut() {
                table.insert("templates".into(), other);
            }
        }
        None => {}
    }
    merge_toml(base, overlay)
}

/// Load a config file as a raw TOML value.
///
/// Returns `Ok(None)` if the file does not exist.
/// Returns `Err` if the file exists but contains invalid TOML.
pub fn load_raw_config(path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<PosterConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_config(base, ov),
        None => base,
    };
    let config: PosterConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from `path`.
///
/// Merges user values on top of stock defaults ([`merge_config`]), rejects unknown keys,
/// and validates the result. A missing file yields the stock defaults.
pub fn load_config(path: &Path) -> Result<PosterConfig, ConfigError> {
    let base = stock_defaults_value();
    let overlay = load_raw_config(path)?;
    resolve_config(base, overlay)
}

/// Returns a fully-commented stock `poster.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# Poster Frame Configuration
# ==========================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults. Unknown keys will cause an error.

# Template used when a request does not name one.
default_template = "poster"

# ---------------------------------------------------------------------------
# Templates
# ---------------------------------------------------------------------------
# Each [templates.<name>] table describes one poster variant. Paths are
# relative to the --assets directory.
[templates.poster]
# Background artwork the photo is composited onto.
asset = "base-image.png"

# Cut the photo to the circle inscribed in the crop (transparent corners).
circular_mask = false

# Where the cropped photo lands on the template, in template pixels.
# The crop is resized to this size when the two differ.
[templates.poster.photo]
x = 290
y = 1075
width = 2415
height = 1349

# Optional caption box, drawn on top of the photo. Uncomment to enable.
# The caption is cut to max_chars characters, then trimmed one character
# at a time until it fits the box width.
# [templates.poster.text]
# x = 290
# y = 2480
# width = 2415
# height = 160
# font_size = 96.0          # pixels per em
# max_chars = 15
# fill = "#ffffff"          # caption color
# background = "#000000"    # box color, always painted opaque
# font = "fonts/Caption.ttf" # omit for the built-in DejaVu Sans

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum parallel workers for `batch`.
# Omit or comment out to auto-detect (= number of CPU cores).
# max_processes = 4
"##
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_config_has_one_template() {
        let config = PosterConfig::default();
        assert_eq!(config.default_template, "poster");
        let poster = &config.templates["poster"];
        assert_eq!(poster.asset, "base-image.png");
        assert_eq!(poster.photo, Rect::new(290, 1075, 2415, 1349));
        assert!(!poster.circular_mask);
        assert!(poster.text.is_none());
    }

    #[test]
    fn parse_partial_config() {
        let toml = r#"
[templates.poster]
circular_mask = true
"#;
        let config: PosterConfig = toml::from_str(toml).unwrap();
        let poster = &config.templates["poster"];
        assert!(poster.circular_mask);
        // Unspecified template keys fall back to defaults
        assert_eq!(poster.asset, "base-image.png");
    }

    #[test]
    fn parse_text_box() {
        let toml = r##"
[templates.badge]
asset = "badge.png"

[templates.badge.photo]
x = 100
y = 100
width = 200
height = 200

[templates.badge.text]
x = 100
y = 320
width = 200
height = 40
fill = "#fff"
background = "#1e3a8a"
"##;
        let config: PosterConfig = toml::from_str(toml).unwrap();
        let text = config.templates["badge"].text.as_ref().unwrap();
        assert_eq!(text.rect(), Rect::new(100, 320, 200, 40));
        assert_eq!(text.fill, Color::white());
        assert_eq!(text.background, Color::rgb(30, 58, 138));
        // defaults
        assert_eq!(text.max_chars, 15);
        assert_eq!(text.font_size, 48.0);
        assert!(text.font.is_none());
    }

    #[test]
    fn invalid_color_rejected() {
        let toml = r#"
[templates.poster.text]
width = 10
height = 10
fill = "white"
"#;
        let result: Result<PosterConfig, _> = toml::from_str(toml);
        assert!(result.unwrap_err().to_string().contains("invalid color"));
    }

    // =========================================================================
    // load_config tests
    // =========================================================================

    #[test]
    fn load_config_returns_default_when_no_file() {
        let tmp = TempDir::new().unwrap();
        let config = load_config(&tmp.path().join("poster.toml")).unwrap();
        assert_eq!(config.templates.len(), 1);
        assert_eq!(config.templates["poster"].asset, "base-image.png");
    }

    #[test]
    fn load_config_merges_over_stock_template() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("poster.toml");
        fs::write(
            &path,
            r#"
[templates.poster]
asset = "certificate.jpg"

[templates.poster.photo]
x = 186
y = 162
"#,
        )
        .unwrap();

        let config = load_config(&path).unwrap();
        let poster = &config.templates["poster"];
        assert_eq!(poster.asset, "certificate.jpg");
        // x/y overridden, width/height kept from stock
        assert_eq!(poster.photo, Rect::new(186, 162, 2415, 1349));
    }

    #[test]
    fn load_config_adds_templates() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("poster.toml");
        fs::write(
            &path,
            r#"
default_template = "round"

[templates.round]
asset = "round.png"
circular_mask = true
"#,
        )
        .unwrap();

        let config = load_config(&path).unwrap();
        // user templates replace the stock set
        assert_eq!(config.templates.len(), 1);
        assert!(config.templates["round"].circular_mask);
        assert_eq!(config.templates["round"].photo, Rect::new(290, 1075, 2415, 1349));
        assert_eq!(config.default_template, "round");
    }

    #[test]
    fn user_templates_without_default_fail_validation() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("poster.toml");
        fs::write(
            &path,
            r#"
[templates.round]
asset = "round.png"
"#,
        )
        .unwrap();

        // default_template is still "poster", which no longer exists
        let result = load_config(&path);
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn non_table_templates_is_rejected() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("poster.toml");
        fs::write(&path, "templates = 3\n").unwrap();

        assert!(matches!(load_config(&path), Err(ConfigError::Toml(_))));
    }

    #[test]
    fn load_config_invalid_toml_is_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("poster.toml");
        fs::write(&path, "this is not valid toml [[[").unwrap();

        let result = load_config(&path);
        assert!(matches!(result, Err(ConfigError::Toml(_))));
    }

    #[test]
    fn unknown_key_rejected_via_load_config() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("poster.toml");
        fs::write(
            &path,
            r#"
[templates.poster]
circle = true
"#,
        )
        .unwrap();

        let result = load_config(&path);
        assert!(matches!(result, Err(ConfigError::Toml(_))));
    }

    // =========================================================================
    // Validation tests
    // =========================================================================

    #[test]
    fn validate_default_config_passes() {
        assert!(PosterConfig::default().validate().is_ok());
    }

    #[test]
    fn validate_unknown_default_template() {
        let config = PosterConfig {
            default_template: "missing".into(),
            ..PosterConfig::default()
        };
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("default_template"));
    }

    #[test]
    fn validate_empty_photo_rect() {
        let mut config = PosterConfig::default();
        config.templates.get_mut("poster").unwrap().photo.width = 0;
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("templates.poster.photo"));
    }

    #[test]
    fn validate_text_box_fields() {
        let mut config = PosterConfig::default();
        config.templates.get_mut("poster").unwrap().text = Some(TextBoxConfig {
            width: 100,
            height: 20,
            max_chars: 0,
            ..TextBoxConfig::default()
        });
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("templates.poster.text.max_chars"));

        config.templates.get_mut("poster").unwrap().text = Some(TextBoxConfig {
            width: 100,
            height: 20,
            font_size: f32::NAN,
            ..TextBoxConfig::default()
        });
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_zero_processes() {
        let config = PosterConfig {
            processing: ProcessingConfig {
                max_processes: Some(0),
            },
            ..PosterConfig::default()
        };
        assert!(config.validate().is_err());
    }

    // =========================================================================
    // merge_toml / stock config
    // =========================================================================

    #[test]
    fn merge_toml_deep_nested() {
        let base: toml::Value = toml::from_str(
            r#"
[templates.poster.photo]
x = 1
y = 2
"#,
        )
        .unwrap();
        let overlay: toml::Value = toml::from_str(
            r#"
[templates.poster.photo]
y = 20
"#,
        )
        .unwrap();
        let merged = merge_toml(base, overlay);
        let photo = merged
            .get("templates")
            .and_then(|t| t.get("poster"))
            .and_then(|p| p.get("photo"))
            .unwrap();
        assert_eq!(photo.get("x").unwrap().as_integer(), Some(1));
        assert_eq!(photo.get("y").unwrap().as_integer(), Some(20));
    }

    #[test]
    fn stock_config_toml_parses_to_defaults() {
        let config: PosterConfig = toml::from_str(stock_config_toml()).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(
            config.templates["poster"],
            PosterConfig::default().templates["poster"]
        );
    }

    #[test]
    fn effective_threads_user_constrains_down() {
        let config = ProcessingConfig {
            max_processes: Some(1),
        };
        assert_eq!(effective_threads(&config), 1);
    }

    #[test]
    fn effective_threads_auto_uses_cores() {
        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        assert_eq!(effective_threads(&ProcessingConfig::default()), cores);
    }
}
