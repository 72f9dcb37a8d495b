use axum::extract::State;
use axum::http::header;
use axum::response::{Html, IntoResponse};
use axum::Json;
use plate_common::metrics::gather_text;
use serde::Serialize;

use super::count_request;
use crate::AppState;

const INDEX_HTML: &str = include_str!("../../static/index.html");

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub uptime_secs: f64,
}

/// GET / - upload and compare page
pub async fn serve_index() -> Html<&'static str> {
    count_request("index");
    Html(INDEX_HTML)
}

/// GET /health
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    count_request("health");
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        uptime_secs: state.started.elapsed().as_secs_f64(),
    })
}

/// GET /metrics - Prometheus text format
pub async fn metrics() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        gather_text(),
    )
}
