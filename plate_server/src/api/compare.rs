use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::Json;
use plate_common::metrics::COMPARISONS;
use plate_common::uploader::summary_key;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{count_request, ApiError};
use crate::AppState;

#[derive(Deserialize)]
pub struct CompareRequest {
    pub video1: Option<String>,
    pub video2: Option<String>,
}

#[derive(Serialize)]
pub struct CompareResponse {
    pub common_plates: Vec<String>,
}

#[derive(Deserialize)]
pub struct ResultsQuery {
    pub filename: Option<String>,
}

#[derive(Serialize)]
pub struct ResultsResponse {
    pub results: Vec<String>,
}

fn required(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.trim().is_empty())
}

async fn blocking<T, F>(work: F) -> Result<T, ApiError>
where
    F: FnOnce() -> plate_common::Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?
        .map_err(ApiError::from)
}

/// POST /compare_videos - plates seen in both videos
pub async fn compare_videos(
    State(state): State<AppState>,
    request: Result<Json<CompareRequest>, JsonRejection>,
) -> Result<Json<CompareResponse>, ApiError> {
    count_request("compare_videos");
    let Json(request) = request?;

    let (Some(video1), Some(video2)) = (required(request.video1), required(request.video2)) else {
        return Err(ApiError::BadRequest(
            "Both filenames are required".to_string(),
        ));
    };

    let store = state.store.clone();
    let (summary, summary_path) = blocking(move || store.compare(&video1, &video2))
        .await
        .map_err(|e| match e {
            ApiError::NotFound(_) => {
                ApiError::NotFound("One or both result files not found".to_string())
            }
            other => other,
        })?;
    COMPARISONS.inc();
    info!(
        video1 = %summary.video1,
        video2 = %summary.video2,
        common = summary.violating_plates.len(),
        "videos compared"
    );

    if let Some(summary_file) = summary_path.file_name().and_then(|name| name.to_str()) {
        state
            .uploader
            .upload_best_effort(&summary_path, &summary_key(summary_file))
            .await;
    }

    Ok(Json(CompareResponse {
        common_plates: summary.violating_plates,
    }))
}

/// GET /results?filename=
pub async fn get_results(
    State(state): State<AppState>,
    query: Result<Query<ResultsQuery>, QueryRejection>,
) -> Result<Json<ResultsResponse>, ApiError> {
    count_request("results");
    let Query(query) = query?;

    let filename = required(query.filename)
        .ok_or_else(|| ApiError::BadRequest("Filename is required".to_string()))?;

    let store = state.store.clone();
    let results = blocking(move || store.load_plates(&filename))
        .await
        .map_err(|e| match e {
            ApiError::NotFound(_) => ApiError::NotFound("Result file not found".to_string()),
            other => other,
        })?;

    Ok(Json(ResultsResponse { results }))
}
