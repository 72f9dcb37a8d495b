//! Per-video plate lists and cross-video comparison summaries on disk.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{Error, Result};

pub const VIDEO_EXTENSIONS: [&str; 2] = ["mp4", "mov"];
pub const VIOLATION_TYPE: &str = "Common vehicle detection (likely violation)";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViolationSummary {
    pub video1: String,
    pub video2: String,
    pub violating_plates: Vec<String>,
    pub violation_type: String,
}

/// Extension match ignores case, so `clip.MP4` is a video too.
pub fn is_video_file(name: &str) -> bool {
    Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            VIDEO_EXTENSIONS
                .iter()
                .any(|video| video.eq_ignore_ascii_case(ext))
        })
        .unwrap_or(false)
}

/// Rejects anything that is not a single plain path component.
pub fn check_name(name: &str) -> Result<&str> {
    let trimmed = name.trim();
    if trimmed.is_empty()
        || trimmed == "."
        || trimmed == ".."
        || trimmed.contains('/')
        || trimmed.contains('\\')
    {
        return Err(Error::InvalidInput(format!("invalid file name: {name:?}")));
    }
    Ok(trimmed)
}

/// `clip.mov` and `clip` both name the video `clip`.
pub fn video_stem(name: &str) -> Result<&str> {
    let name = check_name(name)?;
    if is_video_file(name) {
        if let Some(stem) = Path::new(name).file_stem().and_then(|stem| stem.to_str()) {
            return Ok(stem);
        }
    }
    Ok(name)
}

#[derive(Debug, Clone)]
pub struct ResultStore {
    results_dir: PathBuf,
}

impl ResultStore {
    pub fn new(results_dir: impl Into<PathBuf>) -> Self {
        Self {
            results_dir: results_dir.into(),
        }
    }

    pub fn results_dir(&self) -> &Path {
        &self.results_dir
    }

    pub fn result_path(&self, name: &str) -> Result<PathBuf> {
        Ok(self.results_dir.join(format!("{}.json", video_stem(name)?)))
    }

    pub fn summary_path(&self, video1: &str, video2: &str) -> Result<PathBuf> {
        let (video1, video2) = (check_name(video1)?, check_name(video2)?);
        Ok(self
            .results_dir
            .join(format!("{video1}_{video2}_violation.json")))
    }

    pub fn save_plates(&self, name: &str, plates: &[String]) -> Result<PathBuf> {
        let path = self.result_path(name)?;
        fs::create_dir_all(&self.results_dir)?;
        fs::write(&path, serde_json::to_string_pretty(plates)?)?;
        info!(path = %path.display(), plates = plates.len(), "saved scan result");
        Ok(path)
    }

    pub fn load_plates(&self, name: &str) -> Result<Vec<String>> {
        let path = self.result_path(name)?;
        if !path.is_file() {
            return Err(Error::NotFound(path.display().to_string()));
        }
        let contents = fs::read_to_string(&path)?;
        serde_json::from_str(&contents).map_err(|e| Error::InvalidJson {
            path: path.display().to_string(),
            reason: e.to_string(),
        })
    }

    pub fn has_result(&self, name: &str) -> bool {
        self.result_path(name)
            .map(|path| path.is_file())
            .unwrap_or(false)
    }

    /// Plates present in both videos, sorted. The summary is written next to
    /// the per-video results.
    pub fn compare(&self, video1: &str, video2: &str) -> Result<(ViolationSummary, PathBuf)> {
        let summary_path = self.summary_path(video1, video2)?;
        let missing: Vec<String> = [video1, video2]
            .into_iter()
            .filter(|name| !self.has_result(name))
            .map(str::to_string)
            .collect();
        if !missing.is_empty() {
            return Err(Error::NotFound(missing.join(", ")));
        }

        let plates1: BTreeSet<String> = self.load_plates(video1)?.into_iter().collect();
        let plates2: BTreeSet<String> = self.load_plates(video2)?.into_iter().collect();
        let summary = ViolationSummary {
            video1: video1.trim().to_string(),
            video2: video2.trim().to_string(),
            violating_plates: plates1.intersection(&plates2).cloned().collect(),
            violation_type: VIOLATION_TYPE.to_string(),
        };

        fs::write(&summary_path, serde_json::to_string_pretty(&summary)?)?;
        info!(
            path = %summary_path.display(),
            common = summary.violating_plates.len(),
            "saved violation summary"
        );
        Ok((summary, summary_path))
    }
}
