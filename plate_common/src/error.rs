use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A result file exists but is not a list of plates.
    #[error("Invalid JSON in {path}: {reason}")]
    InvalidJson { path: String, reason: String },

    #[error("Upload failed: {0}")]
    Upload(String),

    #[error("Video error: {0}")]
    Video(String),

    #[error("Detection error: {0}")]
    Detection(String),

    #[error("OCR error: {0}")]
    Ocr(String),
}
