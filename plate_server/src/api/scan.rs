use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use plate_common::metrics::{SCANS_FAILED, SCANS_RUN};
use plate_common::results::check_name;
use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tracing::info;

use super::{count_request, ApiError};
use crate::AppState;

/// Scanner diagnostics kept in an error response.
const STDERR_TAIL: usize = 2000;

#[derive(Deserialize)]
pub struct ProcessRequest {
    pub filename: Option<String>,
}

#[derive(Serialize)]
pub struct ProcessResponse {
    pub message: &'static str,
    pub result_file: String,
}

fn tail(text: &str, max: usize) -> &str {
    let mut start = text.len().saturating_sub(max);
    while !text.is_char_boundary(start) {
        start += 1;
    }
    &text[start..]
}

/// POST /process - runs the scanner over an uploaded video and waits for it
pub async fn process_video(
    State(state): State<AppState>,
    request: Result<Json<ProcessRequest>, JsonRejection>,
) -> Result<Json<ProcessResponse>, ApiError> {
    count_request("process");
    let Json(request) = request?;

    let filename = request
        .filename
        .filter(|name| !name.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("Filename is required".to_string()))?;
    let filename = check_name(&filename)?;

    let video_path = state.uploads_dir.join(filename);
    if !video_path.is_file() {
        return Err(ApiError::NotFound("File not found".to_string()));
    }
    let result_file = state.store.result_path(filename)?;

    let args = state.scanner.args_for(&video_path);
    info!(program = %state.scanner.program.display(), ?args, "starting scan");
    SCANS_RUN.inc();

    let output = Command::new(&state.scanner.program)
        .args(&args)
        .output()
        .await
        .map_err(|e| {
            SCANS_FAILED.inc();
            ApiError::ProcessingFailed {
                details: format!("cannot start {}: {e}", state.scanner.program.display()),
            }
        })?;

    if !output.status.success() {
        SCANS_FAILED.inc();
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(ApiError::ProcessingFailed {
            details: format!(
                "scanner exited with {}: {}",
                output.status,
                tail(stderr.trim(), STDERR_TAIL)
            ),
        });
    }

    info!(video = filename, result = %result_file.display(), "scan completed");
    Ok(Json(ProcessResponse {
        message: "Processing completed",
        result_file: result_file.display().to_string(),
    }))
}
