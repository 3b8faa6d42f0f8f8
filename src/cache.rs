//! Output cache for batch runs.
//!
//! Re-running a job list usually changes only a few jobs. This module lets
//! the batch stage skip composition when the source photo, the template, and
//! the job parameters are all unchanged since the last run.
//!
//! ## Cache keys
//!
//! Lookups are **content-addressed** on `source_hash` + `params_hash`, not on
//! the output path, so renaming an output reuses the previous poster instead
//! of composing it again.
//!
//! - **`source_hash`**: SHA-256 of the source photo bytes.
//! - **`params_hash`**: SHA-256 of the template fingerprint
//!   ([`hash_template`]) plus the job's crop and caption.
//!
//! A cache hit requires:
//! 1. An entry with matching `source_hash` and `params_hash` exists
//! 2. The previously written poster is still on disk
//!
//! A hit whose stored path differs from the job's output is copied over.
//!
//! ## Storage
//!
//! The manifest is a JSON file at `<out_dir>/.poster-cache.json`. Pass
//! `--no-cache` to `batch` to start from an empty manifest.

use crate::compose::Template;
use crate::imaging::Rect;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

/// Name of the cache manifest file within the output directory.
const MANIFEST_FILENAME: &str = ".poster-cache.json";

/// Bump to invalidate every existing cache when key computation changes.
const MANIFEST_VERSION: u32 = 2;

/// Hashes a poster was composed from, plus what composing it reported.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CacheEntry {
    pub source_hash: String,
    pub params_hash: String,
    /// Crop actually taken from the source.
    pub crop: Rect,
    #[serde(default)]
    pub crop_clamped: bool,
    /// Caption as drawn, after fitting.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl CacheEntry {
    fn content_key(&self) -> String {
        content_key(&self.source_hash, &self.params_hash)
    }
}

/// Output path → hashes, persisted between runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheManifest {
    pub version: u32,
    pub entries: HashMap<String, CacheEntry>,
    /// `"{source_hash}:{params_hash}"` → output path. Rebuilt on load.
    #[serde(skip)]
    by_content: HashMap<String, String>,
}

impl CacheManifest {
    /// A manifest with no entries (first run or `--no-cache`).
    pub fn empty() -> Self {
        Self {
            version: MANIFEST_VERSION,
            entries: HashMap::new(),
            by_content: HashMap::new(),
        }
    }

    /// Load from `out_dir`. Missing, corrupt, or outdated manifests load as
    /// empty.
    pub fn load(out_dir: &Path) -> Self {
        let Ok(content) = std::fs::read_to_string(manifest_path(out_dir)) else {
            return Self::empty();
        };
        let mut manifest: Self = match serde_json::from_str(&content) {
            Ok(m) => m,
            Err(e) => {
                tracing::warn!(error = %e, "ignoring unreadable cache manifest");
                return Self::empty();
            }
        };
        if manifest.version != MANIFEST_VERSION {
            return Self::empty();
        }
        manifest.by_content = manifest
            .entries
            .iter()
            .map(|(path, entry)| (entry.content_key(), path.clone()))
            .collect();
        manifest
    }

    pub fn save(&self, out_dir: &Path) -> io::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(manifest_path(out_dir), json)
    }

    /// Output path (relative to `out_dir`) and entry of a poster composed
    /// from the same inputs, if it is still on disk.
    pub fn find_cached(
        &self,
        source_hash: &str,
        params_hash: &str,
        out_dir: &Path,
    ) -> Option<(String, CacheEntry)> {
        let stored = self.by_content.get(&content_key(source_hash, params_hash))?;
        let entry = self.entries.get(stored)?;
        if entry.source_hash != source_hash || entry.params_hash != params_hash {
            return None;
        }
        out_dir
            .join(stored)
            .exists()
            .then(|| (stored.clone(), entry.clone()))
    }

    /// Record that `output_path` now holds the poster described by `entry`.
    ///
    /// An older entry for the same content under another path is dropped, as
    /// is the index of whatever `output_path` held before.
    pub fn insert(&mut self, output_path: String, entry: CacheEntry) {
        let key = entry.content_key();

        if let Some(previous) = self.entries.get(&output_path) {
            let previous_key = previous.content_key();
            if previous_key != key && self.by_content.get(&previous_key) == Some(&output_path) {
                self.by_content.remove(&previous_key);
            }
        }
        if let Some(old_path) = self.by_content.get(&key)
            && *old_path != output_path
        {
            self.entries.remove(old_path.as_str());
        }

        self.by_content.insert(key, output_path.clone());
        self.entries.insert(output_path, entry);
    }
}

fn content_key(source_hash: &str, params_hash: &str) -> String {
    format!("{source_hash}:{params_hash}")
}

/// Path of the cache manifest inside `out_dir`.
pub fn manifest_path(out_dir: &Path) -> PathBuf {
    out_dir.join(MANIFEST_FILENAME)
}

/// SHA-256 of `bytes` as lowercase hex.
pub fn hash_bytes(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// Fingerprint of a loaded template: placement, mask, caption style, and
/// the decoded asset pixels.
///
/// Editing the asset file, the caption font, or any template setting changes
/// the fingerprint.
pub fn hash_template(template: &Template) -> String {
    let mut hasher = Sha256::new();
    hasher.update(b"template\0");
    update_rect(&mut hasher, template.photo);
    hasher.update([u8::from(template.circular_mask)]);
    match &template.text {
        Some(style) => {
            hasher.update(b"\x01");
            update_rect(&mut hasher, style.text_box);
            hasher.update(style.font_size.to_le_bytes());
            hasher.update((style.max_chars as u64).to_le_bytes());
            hasher.update(style.fill.to_rgba().0);
            hasher.update(style.background.to_rgba().0);
            hasher.update(style.face.digest());
        }
        None => hasher.update(b"\x00"),
    }
    hasher.update(template.image.width().to_le_bytes());
    hasher.update(template.image.height().to_le_bytes());
    hasher.update(template.image.as_raw());
    format!("{:x}", hasher.finalize())
}

fn update_rect(hasher: &mut Sha256, rect: Rect) {
    for v in [rect.x, rect.y, rect.width, rect.height] {
        hasher.update(v.to_le_bytes());
    }
}

/// Hash of everything besides the source photo that shapes one poster.
pub fn hash_job_params(template_hash: &str, crop: Rect, text: Option<&str>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(b"job\0");
    hasher.update(template_hash.as_bytes());
    update_rect(&mut hasher, crop);
    match text {
        Some(text) => {
            hasher.update(b"\x01");
            hasher.update(text.as_bytes());
        }
        None => hasher.update(b"\x00"),
    }
    format!("{:x}", hasher.finalize())
}

/// Cache performance over one batch run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u32,
    pub copies: u32,
    pub misses: u32,
}

impl CacheStats {
    pub fn hit(&mut self) {
        self.hits += 1;
    }

    pub fn copy(&mut self) {
        self.copies += 1;
    }

    pub fn miss(&mut self) {
        self.misses += 1;
    }

    pub fn total(&self) -> u32 {
        self.hits + self.copies + self.misses
    }
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.hits, self.copies) {
            (0, 0) => write!(f, "{} composed", self.misses),
            (hits, 0) => write!(f, "{hits} cached, {} composed ({} total)", self.misses, self.total()),
            (hits, copies) => write!(
                f,
                "{hits} cached, {copies} copied, {} composed ({} total)",
                self.misses,
                self.total()
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compose::TextStyle;
    use crate::imaging::{Color, FontFace};
    use crate::test_helpers::{TEMPLATE_COLOR, solid_image};
    use std::fs;
    use tempfile::TempDir;

    fn entry(source_hash: &str, params_hash: &str) -> CacheEntry {
        CacheEntry {
            source_hash: source_hash.into(),
            params_hash: params_hash.into(),
            crop: Rect::new(0, 0, 100, 100),
            crop_clamped: false,
            text: None,
        }
    }

    fn cached_path(m: &CacheManifest, s: &str, p: &str, out_dir: &Path) -> Option<String> {
        m.find_cached(s, p, out_dir).map(|(path, _)| path)
    }

    // =========================================================================
    // Lookup
    // =========================================================================

    #[test]
    fn empty_manifest_finds_nothing() {
        let tmp = TempDir::new().unwrap();
        let m = CacheManifest::empty();
        assert!(m.entries.is_empty());
        assert_eq!(cached_path(&m, "s", "p", tmp.path()), None);
    }

    #[test]
    fn hit_requires_both_hashes_and_file() {
        let tmp = TempDir::new().unwrap();
        let mut m = CacheManifest::empty();
        m.insert("alice.png".into(), entry("src", "prm"));

        // not written yet
        assert_eq!(cached_path(&m, "src", "prm", tmp.path()), None);

        fs::write(tmp.path().join("alice.png"), "png").unwrap();
        assert_eq!(cached_path(&m, "src", "prm", tmp.path()), Some("alice.png".into()));
        assert_eq!(cached_path(&m, "other", "prm", tmp.path()), None);
        assert_eq!(cached_path(&m, "src", "other", tmp.path()), None);
    }

    #[test]
    fn hit_returns_the_stored_report() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("b.png"), "png").unwrap();
        let mut m = CacheManifest::empty();
        let stored = CacheEntry {
            crop: Rect::new(0, 0, 300, 240),
            crop_clamped: true,
            text: Some("Abdullah Ibn Mu".into()),
            ..entry("s", "p")
        };
        m.insert("b.png".into(), stored.clone());

        assert_eq!(m.find_cached("s", "p", tmp.path()), Some(("b.png".into(), stored)));
    }

    #[test]
    fn insert_same_content_under_new_path_drops_old_entry() {
        let mut m = CacheManifest::empty();
        m.insert("old.png".into(), entry("s", "p"));
        m.insert("new.png".into(), entry("s", "p"));

        assert!(!m.entries.contains_key("old.png"));
        assert!(m.entries.contains_key("new.png"));
    }

    #[test]
    fn overwritten_output_no_longer_serves_old_content() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("a.png"), "png").unwrap();
        let mut m = CacheManifest::empty();
        m.insert("a.png".into(), entry("ada", "p"));

        // a different poster replaces a.png
        m.insert("a.png".into(), entry("alan", "p"));

        assert_eq!(cached_path(&m, "ada", "p", tmp.path()), None);
        assert_eq!(cached_path(&m, "alan", "p", tmp.path()), Some("a.png".into()));
    }

    #[test]
    fn overwrite_keeps_index_of_content_moved_elsewhere() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("a.png"), "png").unwrap();
        fs::write(tmp.path().join("b.png"), "png").unwrap();
        let mut m = CacheManifest::empty();
        m.insert("a.png".into(), entry("ada", "p"));
        m.insert("b.png".into(), entry("ada", "p"));
        m.insert("a.png".into(), entry("alan", "p"));

        assert_eq!(cached_path(&m, "ada", "p", tmp.path()), Some("b.png".into()));
    }

    // =========================================================================
    // Persistence
    // =========================================================================

    #[test]
    fn save_and_load_keeps_entries_and_index() {
        let tmp = TempDir::new().unwrap();
        let mut m = CacheManifest::empty();
        m.insert("a.png".into(), entry("s1", "p1"));
        m.insert("posters/b.png".into(), entry("s2", "p2"));
        m.save(tmp.path()).unwrap();
        fs::create_dir_all(tmp.path().join("posters")).unwrap();
        fs::write(tmp.path().join("posters/b.png"), "png").unwrap();

        let loaded = CacheManifest::load(tmp.path());

        assert_eq!(loaded.entries.len(), 2);
        assert_eq!(loaded.entries["a.png"], entry("s1", "p1"));
        assert_eq!(
            cached_path(&loaded, "s2", "p2", tmp.path()),
            Some("posters/b.png".into())
        );
    }

    #[test]
    fn load_missing_or_corrupt_is_empty() {
        let tmp = TempDir::new().unwrap();
        assert!(CacheManifest::load(tmp.path()).entries.is_empty());

        fs::write(manifest_path(tmp.path()), "not json").unwrap();
        assert!(CacheManifest::load(tmp.path()).entries.is_empty());
    }

    #[test]
    fn load_other_version_is_empty() {
        let tmp = TempDir::new().unwrap();
        let json = format!(
            r#"{{"version": {}, "entries": {{"a.png": {{"source_hash":"s","params_hash":"p","crop":{{"x":0,"y":0,"width":1,"height":1}}}}}}}}"#,
            MANIFEST_VERSION + 1
        );
        fs::write(manifest_path(tmp.path()), json).unwrap();
        assert!(CacheManifest::load(tmp.path()).entries.is_empty());
    }

    // =========================================================================
    // Hashes
    // =========================================================================

    #[test]
    fn hash_bytes_is_sha256_hex() {
        assert_eq!(
            hash_bytes(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn template_hash_tracks_settings_and_pixels() {
        let template = Template {
            name: "poster".into(),
            image: solid_image(4, 4, TEMPLATE_COLOR),
            photo: Rect::new(0, 0, 2, 2),
            circular_mask: false,
            text: None,
        };
        let base = hash_template(&template);
        assert_eq!(base, hash_template(&template.clone()));

        let mut masked = template.clone();
        masked.circular_mask = true;
        assert_ne!(base, hash_template(&masked));

        let mut repainted = template.clone();
        repainted.image.put_pixel(3, 3, image::Rgba([0, 0, 0, 255]));
        assert_ne!(base, hash_template(&repainted));

        // the name is not part of the fingerprint
        let mut renamed = template;
        renamed.name = "other".into();
        assert_eq!(base, hash_template(&renamed));
    }

    #[test]
    fn template_hash_tracks_caption_font() {
        let dejavu: &[u8] = include_bytes!("../assets/fonts/DejaVuSans.ttf");
        let captioned = |face: FontFace| Template {
            name: "poster".into(),
            image: solid_image(4, 4, TEMPLATE_COLOR),
            photo: Rect::new(0, 0, 2, 2),
            circular_mask: false,
            text: Some(TextStyle {
                text_box: Rect::new(0, 2, 4, 2),
                font_size: 12.0,
                max_chars: 15,
                fill: Color::white(),
                background: Color::rgb(0, 0, 0),
                face,
            }),
        };

        let embedded = hash_template(&captioned(FontFace::embedded().unwrap()));
        let same_file = hash_template(&captioned(FontFace::from_bytes(dejavu.to_vec()).unwrap()));
        assert_eq!(embedded, same_file);

        let mut edited = dejavu.to_vec();
        edited.extend_from_slice(&[0; 4]);
        let other = hash_template(&captioned(FontFace::from_bytes(edited).unwrap()));
        assert_ne!(embedded, other);
    }

    #[test]
    fn job_hash_tracks_crop_and_text() {
        let crop = Rect::new(0, 0, 100, 100);
        let base = hash_job_params("t", crop, Some("Ada"));

        assert_eq!(base, hash_job_params("t", crop, Some("Ada")));
        assert_ne!(base, hash_job_params("t2", crop, Some("Ada")));
        assert_ne!(base, hash_job_params("t", Rect::new(1, 0, 100, 100), Some("Ada")));
        assert_ne!(base, hash_job_params("t", crop, Some("Bob")));
        assert_ne!(hash_job_params("t", crop, None), hash_job_params("t", crop, Some("")));
    }

    // =========================================================================
    // CacheStats
    // =========================================================================

    #[test]
    fn stats_display() {
        let mut s = CacheStats::default();
        s.miss();
        s.miss();
        assert_eq!(s.to_string(), "2 composed");

        s.hit();
        assert_eq!(s.to_string(), "1 cached, 2 composed (3 total)");

        s.copy();
        assert_eq!(s.to_string(), "1 cached, 1 copied, 2 composed (4 total)");
    }
}
