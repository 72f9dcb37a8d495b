//! TOML configuration shared by the scanner and the HTTP service.
//!
//! Every field has a default matching the shared-mount layout, so an empty file
//! (or no file at all) is a valid configuration.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

const MOUNT_ROOT: &str = "/mnt/ebs100";

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub paths: PathsConfig,
    pub scan: ScanConfig,
    pub storage: StorageConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PathsConfig {
    pub uploads_dir: PathBuf,
    pub results_dir: PathBuf,
    /// Where plate crops are written.
    pub violations_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        let root = PathBuf::from(MOUNT_ROOT);
        Self {
            uploads_dir: root.join("uploads"),
            results_dir: root.join("results"),
            violations_dir: root.join("violations"),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Only every n-th frame goes through detection.
    pub frame_interval: u32,
    pub model_path: PathBuf,
    pub input_size: i32,
    pub num_classes: usize,
    /// Detector-side cut before non-maximum suppression.
    pub score_threshold: f32,
    pub nms_threshold: f32,
    /// Region filter applied after detection.
    pub min_confidence: f32,
    pub min_width: i32,
    pub min_height: i32,
    pub similarity_threshold: f64,
    pub tessdata_dir: PathBuf,
    pub ocr_language: String,
    pub state_codes: Vec<String>,
    pub use_gpu: bool,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            frame_interval: 4,
            model_path: PathBuf::from("models/yolov8n.onnx"),
            input_size: 640,
            num_classes: 80,
            score_threshold: 0.25,
            nms_threshold: 0.7,
            min_confidence: 0.1,
            min_width: 70,
            min_height: 20,
            similarity_threshold: 0.85,
            tessdata_dir: PathBuf::from("models"),
            ocr_language: "eng".to_string(),
            state_codes: ["MH", "DL", "WB", "KA", "DD", "GJ", "TN", "PB", "UP", "TS"]
                .iter()
                .map(|code| code.to_string())
                .collect(),
            use_gpu: false,
        }
    }
}

impl ScanConfig {
    pub fn effective_interval(&self) -> u32 {
        self.frame_interval.max(1)
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Artifacts are uploaded only when a bucket is set.
    pub bucket: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Program run by `/process`; the video path is appended to its arguments.
    pub scanner_program: PathBuf,
    pub scanner_args: Vec<String>,
    pub max_upload_mb: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            scanner_program: PathBuf::from("plate_scan"),
            scanner_args: Vec::new(),
            max_upload_mb: 2048,
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {e}", path.display())))?;
        Self::from_toml_str(&contents)
    }

    /// Loads `path` when given, otherwise falls back to the defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: Config =
            toml::from_str(contents).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        let scan = &self.scan;
        for (name, value) in [
            ("score_threshold", scan.score_threshold),
            ("nms_threshold", scan.nms_threshold),
            ("min_confidence", scan.min_confidence),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(Error::Config(format!("scan.{name} must be within [0, 1]")));
            }
        }
        if !(0.0..=1.0).contains(&scan.similarity_threshold) {
            return Err(Error::Config(
                "scan.similarity_threshold must be within [0, 1]".to_string(),
            ));
        }
        if scan.input_size <= 0 || scan.num_classes == 0 {
            return Err(Error::Config(
                "scan.input_size and scan.num_classes must be positive".to_string(),
            ));
        }
        if self.server.max_upload_mb == 0 {
            return Err(Error::Config("server.max_upload_mb must be positive".to_string()));
        }
        Ok(())
    }
}
