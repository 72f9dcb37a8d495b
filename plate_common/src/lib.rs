//! Shared pieces of the plate watch tools: configuration, plate text rules,
//! result files and artifact upload.

pub mod config;
pub mod error;
pub mod metrics;
pub mod plate_format;
pub mod plate_registry;
pub mod results;
pub mod uploader;

pub use config::Config;
pub use error::{Error, Result};
