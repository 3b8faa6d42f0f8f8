//! Batch composition from a JSON job list.
//!
//! Each job names a source photo, an output path, and optionally a crop, a
//! caption, and a template:
//!
//! ```json
//! [
//!   { "source": "photos/ada.jpg", "output": "ada.png", "text": "Ada Lovelace" },
//!   { "source": "photos/alan.jpg", "output": "round/alan.png",
//!     "crop": { "x": 40, "y": 0, "width": 600, "height": 600 },
//!     "template": "round" },
//!   { "source": "photos/grace.png", "output": "grace.png",
//!     "crop_percent": { "x": 10, "y": 10, "width": 80, "height": 80 } }
//! ]
//! ```
//!
//! Source paths are relative to the job file's directory, output paths to
//! `--out-dir`. When both `crop` and `crop_percent` are given, `crop` wins.
//!
//! Jobs run in parallel on the global rayon pool. A failing job is reported
//! as [`BatchEvent::Failed`] and counted; the others still run. Posters are
//! written only after they encode successfully.
//!
//! ## Output Structure
//!
//! ```text
//! dist/
//! ├── .poster-cache.json   # Cache manifest (see crate::cache)
//! ├── ada.png
//! ├── grace.png
//! └── round/
//!     └── alan.png
//! ```

use crate::cache::{self, CacheEntry, CacheManifest, CacheStats};
use crate::compose::{self, ComposeError, CompositionRequest, DEFAULT_CROP, TemplateSet};
use crate::imaging::{self, PercentArea, Rect};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::mpsc::Sender;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum BatchError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Compose(#[from] ComposeError),
    #[error("Source image not found: {0}")]
    SourceNotFound(PathBuf),
}

/// One entry of the job file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BatchJob {
    pub source: PathBuf,
    pub output: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crop: Option<Rect>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crop_percent: Option<PercentArea>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,
}

/// How a finished job got its poster.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    /// Same output already on disk.
    Cached,
    /// Same poster found under another output path and copied.
    Copied,
    /// Composed and written.
    Composed,
}

/// Progress report sent while a batch runs.
#[derive(Debug, Clone)]
pub enum BatchEvent {
    Finished {
        index: usize,
        source: String,
        output: String,
        status: JobStatus,
        crop: Rect,
        crop_clamped: bool,
        text: Option<String>,
    },
    Failed {
        index: usize,
        source: String,
        error: String,
    },
}

/// Totals of one batch run.
#[derive(Debug, Default)]
pub struct BatchOutcome {
    pub succeeded: usize,
    pub failed: usize,
    pub cache_stats: CacheStats,
}

struct JobReport {
    status: JobStatus,
    crop: Rect,
    crop_clamped: bool,
    text: Option<String>,
}

/// Read and parse a job file.
pub fn load_jobs(path: &Path) -> Result<Vec<BatchJob>, BatchError> {
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

/// Compose every job into `out_dir`.
///
/// Only setup failures (creating `out_dir`, saving the cache manifest) are
/// returned as errors; per-job failures are counted in the outcome.
pub fn run_batch(
    jobs: &[BatchJob],
    jobs_dir: &Path,
    templates: &TemplateSet,
    out_dir: &Path,
    use_cache: bool,
    progress: Option<Sender<BatchEvent>>,
) -> Result<BatchOutcome, BatchError> {
    std::fs::create_dir_all(out_dir)?;

    let manifest = Mutex::new(if use_cache {
        CacheManifest::load(out_dir)
    } else {
        CacheManifest::empty()
    });
    let template_hashes: HashMap<&str, String> = templates
        .iter()
        .map(|t| (t.name.as_str(), cache::hash_template(t)))
        .collect();
    let ctx = JobContext {
        jobs_dir,
        out_dir,
        templates,
        template_hashes: &template_hashes,
        manifest: &manifest,
    };

    let results: Vec<Result<JobReport, BatchError>> = jobs
        .par_iter()
        .enumerate()
        .map(|(index, job)| {
            let result = ctx.run(job);
            if let Some(tx) = &progress {
                tx.send(event_for(index, job, &result)).ok();
            }
            result
        })
        .collect();

    let mut outcome = BatchOutcome::default();
    for result in &results {
        match result {
            Ok(report) => {
                outcome.succeeded += 1;
                match report.status {
                    JobStatus::Cached => outcome.cache_stats.hit(),
                    JobStatus::Copied => outcome.cache_stats.copy(),
                    JobStatus::Composed => outcome.cache_stats.miss(),
                }
            }
            Err(_) => outcome.failed += 1,
        }
    }

    let manifest = manifest.into_inner().unwrap_or_else(|e| e.into_inner());
    manifest.save(out_dir)?;

    Ok(outcome)
}

fn event_for(index: usize, job: &BatchJob, result: &Result<JobReport, BatchError>) -> BatchEvent {
    let source = job.source.display().to_string();
    match result {
        Ok(report) => BatchEvent::Finished {
            index,
            source,
            output: job.output.display().to_string(),
            status: report.status,
            crop: report.crop,
            crop_clamped: report.crop_clamped,
            text: report.text.clone(),
        },
        Err(e) => BatchEvent::Failed {
            index,
            source,
            error: e.to_string(),
        },
    }
}

struct JobContext<'a> {
    jobs_dir: &'a Path,
    out_dir: &'a Path,
    templates: &'a TemplateSet,
    template_hashes: &'a HashMap<&'a str, String>,
    manifest: &'a Mutex<CacheManifest>,
}

impl JobContext<'_> {
    fn run(&self, job: &BatchJob) -> Result<JobReport, BatchError> {
        let source_path = self.jobs_dir.join(&job.source);
        if !source_path.exists() {
            return Err(BatchError::SourceNotFound(source_path));
        }
        let bytes = std::fs::read(&source_path)?;
        let template = self.templates.get(job.template.as_deref())?;
        let crop = resolve_crop(job, &bytes)?;

        let output_key = cache_key_path(&job.output);
        let source_hash = cache::hash_bytes(&bytes);
        let template_hash = self
            .template_hashes
            .get(template.name.as_str())
            .map(String::as_str)
            .unwrap_or_default();
        let params_hash = cache::hash_job_params(template_hash, crop, job.text.as_deref());

        if let Some((status, entry)) = self.reuse_cached(&output_key, &source_hash, &params_hash)? {
            debug!(output = %output_key, ?status, "reused cached poster");
            return Ok(JobReport {
                status,
                crop: entry.crop,
                crop_clamped: entry.crop_clamped,
                text: entry.text,
            });
        }

        let request = CompositionRequest {
            source: bytes,
            crop: Some(crop),
            text: job.text.clone(),
        };
        let result = compose::compose(template, &request)?;

        let output_path = self.out_dir.join(&job.output);
        if let Some(parent) = output_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let entry = CacheEntry {
            source_hash,
            params_hash,
            crop: result.crop,
            crop_clamped: result.crop_clamped,
            text: result.text.map(|t| t.text),
        };
        // Copies read other outputs under this lock; never let one see a
        // poster mid-overwrite.
        {
            let mut manifest = self.lock_manifest();
            std::fs::write(&output_path, &result.encoded.bytes)?;
            manifest.insert(output_key, entry.clone());
        }
        debug!(output = %output_path.display(), "wrote poster");

        Ok(JobReport {
            status: JobStatus::Composed,
            crop: entry.crop,
            crop_clamped: entry.crop_clamped,
            text: entry.text,
        })
    }

    /// Cached or copied status, with what the original composition
    /// reported, when an identical poster is already on disk.
    fn reuse_cached(
        &self,
        output_key: &str,
        source_hash: &str,
        params_hash: &str,
    ) -> Result<Option<(JobStatus, CacheEntry)>, BatchError> {
        let mut manifest = self.lock_manifest();
        let Some((stored, entry)) = manifest.find_cached(source_hash, params_hash, self.out_dir)
        else {
            return Ok(None);
        };
        if stored == output_key {
            return Ok(Some((JobStatus::Cached, entry)));
        }

        let dest = self.out_dir.join(output_key);
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::copy(self.out_dir.join(&stored), &dest)?;
        manifest.insert(output_key.to_string(), entry.clone());
        Ok(Some((JobStatus::Copied, entry)))
    }

    fn lock_manifest(&self) -> std::sync::MutexGuard<'_, CacheManifest> {
        self.manifest.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Pixel crop for a job: explicit rect, then percentages of the source size,
/// then the default crop.
fn resolve_crop(job: &BatchJob, bytes: &[u8]) -> Result<Rect, BatchError> {
    if let Some(crop) = job.crop {
        return Ok(crop);
    }
    match &job.crop_percent {
        Some(area) => {
            let (width, height) = imaging::dimensions(bytes).map_err(ComposeError::from)?;
            Ok(Rect::from_percentages(area, width, height))
        }
        None => Ok(DEFAULT_CROP),
    }
}

/// Manifest key for an output path: forward slashes on every platform.
fn cache_key_path(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
