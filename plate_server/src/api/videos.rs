use std::path::Path;

use axum::extract::multipart::Field;
use axum::extract::{Multipart, State};
use axum::Json;
use plate_common::results::is_video_file;
use serde::Serialize;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};

use super::{count_request, ApiError};
use crate::AppState;

#[derive(Serialize)]
pub struct VideoList {
    pub videos: Vec<String>,
}

#[derive(Serialize)]
pub struct UploadResponse {
    pub message: &'static str,
    pub filename: String,
}

/// Final component of a client supplied file name, whichever separator the
/// client used.
pub(crate) fn upload_name(raw: &str) -> Option<String> {
    let name = raw.rsplit(['/', '\\']).next().unwrap_or_default().trim();
    match name {
        "" | "." | ".." => None,
        name => Some(name.to_string()),
    }
}

/// In-progress uploads carry a suffix that keeps them out of the video list.
fn partial_name(filename: &str) -> String {
    format!(".{filename}.part")
}

async fn stream_field(field: &mut Field<'_>, path: &Path) -> Result<usize, ApiError> {
    let mut file = fs::File::create(path).await?;
    let mut written = 0usize;
    while let Some(chunk) = field
        .chunk()
        .await
        .map_err(|e| ApiError::BadRequest(format!("file read error: {e}")))?
    {
        file.write_all(&chunk).await?;
        written += chunk.len();
    }
    file.flush().await?;
    Ok(written)
}

/// GET /list_videos
pub async fn list_videos(State(state): State<AppState>) -> Result<Json<VideoList>, ApiError> {
    count_request("list_videos");

    let mut entries = fs::read_dir(&state.uploads_dir).await?;
    let mut videos = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        if let Some(name) = entry.file_name().to_str() {
            if is_video_file(name) {
                videos.push(name.to_string());
            }
        }
    }
    videos.sort();

    Ok(Json(VideoList { videos }))
}

/// POST /upload - multipart/form-data with a `file` field
pub async fn upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    count_request("upload");

    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("multipart error: {e}")))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let filename = field
            .file_name()
            .and_then(upload_name)
            .ok_or_else(|| ApiError::BadRequest("No selected file".to_string()))?;

        fs::create_dir_all(&state.uploads_dir).await?;
        let path = state.uploads_dir.join(&filename);
        let partial = state.uploads_dir.join(partial_name(&filename));
        let written = match stream_field(&mut field, &partial).await {
            Ok(written) => written,
            Err(e) => {
                if let Err(remove_error) = fs::remove_file(&partial).await {
                    warn!(
                        path = %partial.display(),
                        error = %remove_error,
                        "cannot remove partial upload"
                    );
                }
                return Err(e);
            }
        };
        fs::rename(&partial, &path).await?;
        info!(path = %path.display(), bytes = written, "video uploaded");

        return Ok(Json(UploadResponse {
            message: "File uploaded successfully",
            filename,
        }));
    }

    Err(ApiError::BadRequest("No file part".to_string()))
}
