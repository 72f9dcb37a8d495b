//! HTTP front of the plate watch tools: upload videos, trigger scans, compare
//! the plates two videos have in common.

use std::path::{Path, PathBuf};
use std::time::Instant;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use plate_common::results::ResultStore;
use plate_common::uploader::ArtifactUploader;
use plate_common::Config;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod api;

/// External program that scans one video and writes its result file.
#[derive(Debug, Clone)]
pub struct ScannerCommand {
    pub program: PathBuf,
    pub args: Vec<String>,
}

impl ScannerCommand {
    /// Command line for scanning `video`.
    pub fn args_for(&self, video: &Path) -> Vec<String> {
        let mut args = self.args.clone();
        args.push(video.to_string_lossy().into_owned());
        args
    }
}

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub uploads_dir: PathBuf,
    pub store: ResultStore,
    pub scanner: ScannerCommand,
    pub uploader: ArtifactUploader,
    pub max_upload_bytes: usize,
    pub started: Instant,
}

impl AppState {
    /// `config_path` is handed on to the scanner so both sides agree on paths.
    pub fn new(config: &Config, config_path: Option<&Path>, uploader: ArtifactUploader) -> Self {
        let mut args = config.server.scanner_args.clone();
        if let Some(path) = config_path {
            args.push("--config".to_string());
            args.push(path.to_string_lossy().into_owned());
        }

        Self {
            uploads_dir: config.paths.uploads_dir.clone(),
            store: ResultStore::new(config.paths.results_dir.clone()),
            scanner: ScannerCommand {
                program: config.server.scanner_program.clone(),
                args,
            },
            uploader,
            max_upload_bytes: config.server.max_upload_mb.saturating_mul(1024 * 1024),
            started: Instant::now(),
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    let max_upload_bytes = state.max_upload_bytes;

    Router::new()
        .route("/", get(api::serve_index))
        .route("/health", get(api::health))
        .route("/metrics", get(api::metrics))
        .route("/list_videos", get(api::list_videos))
        .route("/upload", post(api::upload))
        .route("/process", post(api::process_video))
        .route("/compare_videos", post(api::compare_videos))
        .route("/results", get(api::get_results))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scanner_gets_config_and_video_path() {
        let mut config = Config::default();
        config.server.scanner_args = vec!["--log-level".to_string(), "debug".to_string()];
        let state = AppState::new(
            &config,
            Some(Path::new("/etc/plate_watch.toml")),
            ArtifactUploader::disabled(),
        );

        assert_eq!(
            state.scanner.args_for(Path::new("/mnt/ebs100/uploads/a.mp4")),
            vec![
                "--log-level",
                "debug",
                "--config",
                "/etc/plate_watch.toml",
                "/mnt/ebs100/uploads/a.mp4"
            ]
        );
        assert_eq!(state.max_upload_bytes, 2048 * 1024 * 1024);
    }
}
