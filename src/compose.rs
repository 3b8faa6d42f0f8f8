//! Poster composition: one photo in, one poster out.
//!
//! Templates are loaded once from config ([`TemplateSet::load`]) and shared
//! read-only across requests. A missing or undecodable asset stops the load,
//! so a misconfigured deployment fails before it accepts any work.
//!
//! ## Pipeline
//!
//! ```text
//! source bytes ─ decode ─ crop ─ mask ─┐
//!                                      ├─ composite ─ encode ─ PNG
//!          caption ─ fit ──────────────┘       ▲
//!                                              │
//!                                    template asset (copied)
//! ```
//!
//! Every stage error is propagated unchanged. The only tolerated degradation
//! is a crop that overhangs the source: it is clamped, logged, and reported
//! through [`CompositionResult::crop_clamped`].

use crate::config::{PosterConfig, TemplateConfig, TextBoxConfig};
use crate::imaging::{
    self, Color, EncodedImage, FittedText, FontFace, ImagingError, Rect, TextLayer,
};
use image::RgbaImage;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

/// Crop applied when a request does not carry one.
pub const DEFAULT_CROP: Rect = Rect::new(0, 0, 100, 100);

#[derive(Error, Debug)]
pub enum ComposeError {
    #[error(transparent)]
    Imaging(#[from] ImagingError),
    #[error("template asset {path} could not be loaded: {reason}")]
    AssetMissing { path: PathBuf, reason: String },
    #[error("unknown template: {0}")]
    UnknownTemplate(String),
}

/// Caption box settings with the font already parsed.
#[derive(Debug, Clone)]
pub struct TextStyle {
    pub text_box: Rect,
    pub font_size: f32,
    pub max_chars: usize,
    pub fill: Color,
    pub background: Color,
    pub face: FontFace,
}

/// A poster variant ready to composite onto.
#[derive(Debug, Clone)]
pub struct Template {
    pub name: String,
    /// Decoded background; never mutated after load.
    pub image: RgbaImage,
    pub photo: Rect,
    pub circular_mask: bool,
    pub text: Option<TextStyle>,
}

impl Template {
    /// Load the asset and font named by `config`, resolving paths against
    /// `assets_dir`.
    pub fn load(name: &str, config: &TemplateConfig, assets_dir: &Path) -> Result<Self, ComposeError> {
        let asset_path = assets_dir.join(&config.asset);
        let image = load_asset(&asset_path)?;
        debug!(
            template = name,
            asset = %asset_path.display(),
            width = image.width(),
            height = image.height(),
            "loaded template asset"
        );

        let text = config
            .text
            .as_ref()
            .map(|text| load_text_style(text, assets_dir))
            .transpose()?;

        Ok(Self {
            name: name.to_string(),
            image,
            photo: config.photo,
            circular_mask: config.circular_mask,
            text,
        })
    }
}

fn load_asset(path: &Path) -> Result<RgbaImage, ComposeError> {
    let bytes = std::fs::read(path).map_err(|e| asset_missing(path, e))?;
    imaging::decode(&bytes).map_err(|e| asset_missing(path, e))
}

fn load_text_style(config: &TextBoxConfig, assets_dir: &Path) -> Result<TextStyle, ComposeError> {
    let face = match &config.font {
        Some(font) => {
            let path = assets_dir.join(font);
            let bytes = std::fs::read(&path).map_err(|e| asset_missing(&path, e))?;
            FontFace::from_bytes(bytes).map_err(|e| asset_missing(&path, e))?
        }
        None => FontFace::embedded()?,
    };

    Ok(TextStyle {
        text_box: config.rect(),
        font_size: config.font_size,
        max_chars: config.max_chars,
        fill: config.fill,
        background: config.background,
        face,
    })
}

fn asset_missing(path: &Path, reason: impl ToString) -> ComposeError {
    ComposeError::AssetMissing {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    }
}

/// Every template from config, loaded up front.
#[derive(Debug)]
pub struct TemplateSet {
    default_template: String,
    templates: BTreeMap<String, Template>,
}

impl TemplateSet {
    /// Load every configured template. Stops at the first asset that fails.
    pub fn load(config: &PosterConfig, assets_dir: &Path) -> Result<Self, ComposeError> {
        let templates = config
            .templates
            .iter()
            .map(|(name, tc)| Ok((name.clone(), Template::load(name, tc, assets_dir)?)))
            .collect::<Result<BTreeMap<_, _>, ComposeError>>()?;

        Ok(Self {
            default_template: config.default_template.clone(),
            templates,
        })
    }

    /// Build a set from already-loaded templates.
    ///
    /// The first template becomes the default.
    pub fn from_templates(templates: impl IntoIterator<Item = Template>) -> Self {
        let mut default_template = None;
        let templates = templates
            .into_iter()
            .map(|t| {
                default_template.get_or_insert_with(|| t.name.clone());
                (t.name.clone(), t)
            })
            .collect();
        Self {
            default_template: default_template.unwrap_or_default(),
            templates,
        }
    }

    /// The named template, or the default one when `name` is `None`.
    pub fn get(&self, name: Option<&str>) -> Result<&Template, ComposeError> {
        let name = name.unwrap_or(self.default_template.as_str());
        self.templates
            .get(name)
            .ok_or_else(|| ComposeError::UnknownTemplate(name.to_string()))
    }

    pub fn default_name(&self) -> &str {
        &self.default_template
    }

    pub fn iter(&self) -> impl Iterator<Item = &Template> {
        self.templates.values()
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}

/// One user submission.
#[derive(Debug, Clone, Default)]
pub struct CompositionRequest {
    /// Raw upload bytes in any compiled-in format.
    pub source: Vec<u8>,
    /// Region of the source to keep; [`DEFAULT_CROP`] when absent.
    pub crop: Option<Rect>,
    /// Caption for the template's text box.
    pub text: Option<String>,
}

/// A finished poster.
#[derive(Debug, Clone)]
pub struct CompositionResult {
    pub image: RgbaImage,
    pub encoded: EncodedImage,
    /// Crop actually taken from the source, after clamping.
    pub crop: Rect,
    pub crop_clamped: bool,
    /// Caption as drawn; `None` when no caption was drawn.
    pub text: Option<FittedText>,
}

/// Run the full pipeline for one request against `template`.
pub fn compose(
    template: &Template,
    request: &CompositionRequest,
) -> Result<CompositionResult, ComposeError> {
    let source = imaging::decode(&request.source)?;
    debug!(
        template = %template.name,
        width = source.width(),
        height = source.height(),
        "decoded source"
    );

    let crop = imaging::extract(&source, request.crop.unwrap_or(DEFAULT_CROP))?;
    let photo = imaging::mask::apply(crop.image, template.circular_mask);

    let fitted = match (&template.text, request.text.as_deref()) {
        (Some(style), Some(caption)) => {
            let face = style.face.at_size(style.font_size);
            let fitted = imaging::fit(caption, style.text_box, style.max_chars, &face);
            if fitted.trimmed {
                debug!(original = caption, fitted = %fitted.text, "caption trimmed to fit");
            }
            Some((fitted, face))
        }
        (None, Some(_)) => {
            warn!(template = %template.name, "template has no text box; caption ignored");
            None
        }
        _ => None,
    };

    let layer = match (&template.text, &fitted) {
        (Some(style), Some((fitted, face))) => Some(TextLayer {
            fitted,
            text_box: style.text_box,
            fill: style.fill,
            background: style.background,
            face: *face,
        }),
        _ => None,
    };

    let image = imaging::composite(&template.image, &photo, template.photo, layer.as_ref());
    let encoded = imaging::encode_png(&image)?;
    debug!(
        template = %template.name,
        bytes = encoded.bytes.len(),
        "encoded poster"
    );

    Ok(CompositionResult {
        image,
        encoded,
        crop: crop.region,
        crop_clamped: crop.clamped,
        text: fitted
            .map(|(fitted, _)| fitted)
            .filter(|fitted| !fitted.text.is_empty()),
    })
}
