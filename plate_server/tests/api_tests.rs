//! Integration tests for the plate_server HTTP routes
//!
//! The scanner is replaced by `true` / `false` so the routes can be driven
//! without models or video decoding.

use std::fs;
use std::path::{Path, PathBuf};

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use plate_common::uploader::ArtifactUploader;
use plate_common::Config;
use plate_server::{build_router, AppState};
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::util::ServiceExt; // for `oneshot` method

const BOUNDARY: &str = "plate-watch-boundary";

struct TestApp {
    dir: TempDir,
    app: Router,
}

impl TestApp {
    fn uploads(&self) -> PathBuf {
        self.dir.path().join("uploads")
    }

    fn results(&self) -> PathBuf {
        self.dir.path().join("results")
    }

    fn write_result(&self, stem: &str, contents: &str) {
        fs::write(self.results().join(format!("{stem}.json")), contents).unwrap();
    }
}

/// Test helper: app over a scratch mount with the given scanner program
fn setup_app(scanner: &str) -> TestApp {
    let dir = tempfile::tempdir().unwrap();
    let mut config = Config::default();
    config.paths.uploads_dir = dir.path().join("uploads");
    config.paths.results_dir = dir.path().join("results");
    config.paths.violations_dir = dir.path().join("violations");
    config.server.scanner_program = PathBuf::from(scanner);
    fs::create_dir_all(&config.paths.uploads_dir).unwrap();
    fs::create_dir_all(&config.paths.results_dir).unwrap();

    let state = AppState::new(&config, None, ArtifactUploader::disabled());
    TestApp {
        dir,
        app: build_router(state),
    }
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn multipart_head(field: &str, filename: &str) -> Vec<u8> {
    format!(
        "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\nContent-Type: video/mp4\r\n\r\n"
    )
    .into_bytes()
}

fn post_multipart(field: &str, filename: &str, contents: &[u8]) -> Request<Body> {
    let mut body = multipart_head(field, filename);
    body.extend_from_slice(contents);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
    multipart_request(body)
}

fn multipart_request(body: Vec<u8>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/upload")
        .header(
            "content-type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

/// Test helper: status and JSON body of one request
async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("Should read body");
    let body = serde_json::from_slice(&bytes).expect("Should parse JSON");
    (status, body)
}

// =============================================================================
// Health, index and metrics
// =============================================================================

#[tokio::test]
async fn test_health_reports_ok() {
    let test = setup_app("true");
    let (status, body) = send(&test.app, get("/health")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert!(body["version"].is_string());
}

#[tokio::test]
async fn test_index_serves_html() {
    let test = setup_app("true");
    let response = test.app.clone().oneshot(get("/")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert!(String::from_utf8_lossy(&bytes).contains("<title>Plate Watch</title>"));
}

#[tokio::test]
async fn test_metrics_count_requests() {
    let test = setup_app("true");
    send(&test.app, get("/list_videos")).await;

    let response = test.app.clone().oneshot(get("/metrics")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8_lossy(&bytes);
    assert!(text.contains("plate_http_requests_total"));
    assert!(text.contains("route=\"list_videos\""));
}

#[tokio::test]
async fn test_health_is_counted() {
    let test = setup_app("true");
    send(&test.app, get("/health")).await;

    let response = test.app.clone().oneshot(get("/metrics")).await.unwrap();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert!(String::from_utf8_lossy(&bytes).contains("route=\"health\""));
}

// =============================================================================
// Listing and upload
// =============================================================================

#[tokio::test]
async fn test_list_videos_filters_and_sorts() {
    let test = setup_app("true");
    for name in ["south.mov", "north.mp4", "notes.txt", "east.MP4"] {
        fs::write(test.uploads().join(name), b"x").unwrap();
    }

    let (status, body) = send(&test.app, get("/list_videos")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({ "videos": ["east.MP4", "north.mp4", "south.mov"] })
    );
}

#[tokio::test]
async fn test_list_videos_without_upload_dir_is_an_error() {
    let test = setup_app("true");
    fs::remove_dir_all(test.uploads()).unwrap();

    let (status, body) = send(&test.app, get("/list_videos")).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_upload_saves_under_plain_name() {
    let test = setup_app("true");
    let (status, body) = send(
        &test.app,
        post_multipart("file", "../../cams/north.mp4", b"fake video bytes"),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "File uploaded successfully");
    assert_eq!(body["filename"], "north.mp4");
    assert_eq!(
        fs::read(test.uploads().join("north.mp4")).unwrap(),
        b"fake video bytes"
    );
    assert!(!test.dir.path().join("cams").exists());
}

#[tokio::test]
async fn test_truncated_upload_leaves_no_file() {
    let test = setup_app("true");
    let mut body = multipart_head("file", "north.mp4");
    body.extend_from_slice(b"first part of the video and then the client went away");

    let (status, body) = send(&test.app, multipart_request(body)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
    let left: Vec<_> = fs::read_dir(test.uploads()).unwrap().collect();
    assert!(left.is_empty(), "{left:?}");

    let (_, listing) = send(&test.app, get("/list_videos")).await;
    assert_eq!(listing, json!({ "videos": [] }));
}

#[tokio::test]
async fn test_upload_requires_file_field() {
    let test = setup_app("true");
    let (status, body) = send(&test.app, post_multipart("video", "north.mp4", b"x")).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "No file part");
}

#[tokio::test]
async fn test_upload_requires_file_name() {
    let test = setup_app("true");
    let (status, body) = send(&test.app, post_multipart("file", "", b"x")).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "No selected file");
}

// =============================================================================
// Processing
// =============================================================================

#[tokio::test]
async fn test_process_requires_filename() {
    let test = setup_app("true");
    let (status, body) = send(&test.app, post_json("/process", json!({}))).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Filename is required");
}

#[tokio::test]
async fn test_process_rejects_non_json_body_as_json() {
    let test = setup_app("true");
    let request = Request::builder()
        .method("POST")
        .uri("/process")
        .header("content-type", "application/x-www-form-urlencoded")
        .body(Body::from("filename=north.mp4"))
        .unwrap();

    let response = test.app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(response.headers()["content-type"], "application/json");
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert!(body["error"].as_str().unwrap().contains("Content-Type"));
}

#[tokio::test]
async fn test_compare_rejects_malformed_json() {
    let test = setup_app("true");
    let request = Request::builder()
        .method("POST")
        .uri("/compare_videos")
        .header("content-type", "application/json")
        .body(Body::from("{\"video1\": "))
        .unwrap();

    let (status, body) = send(&test.app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_process_unknown_video() {
    let test = setup_app("true");
    let (status, body) = send(
        &test.app,
        post_json("/process", json!({ "filename": "missing.mp4" })),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "File not found");
}

#[tokio::test]
async fn test_process_rejects_traversal() {
    let test = setup_app("true");
    let (status, _) = send(
        &test.app,
        post_json("/process", json!({ "filename": "../uploads/north.mp4" })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_process_reports_result_file() {
    let test = setup_app("true");
    fs::write(test.uploads().join("north.mov"), b"x").unwrap();

    let (status, body) = send(
        &test.app,
        post_json("/process", json!({ "filename": "north.mov" })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Processing completed");
    assert_eq!(
        Path::new(body["result_file"].as_str().unwrap()),
        test.results().join("north.json")
    );
}

#[tokio::test]
async fn test_process_surfaces_scanner_failure() {
    let test = setup_app("false");
    fs::write(test.uploads().join("north.mp4"), b"x").unwrap();

    let (status, body) = send(
        &test.app,
        post_json("/process", json!({ "filename": "north.mp4" })),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "Processing failed");
    assert!(body["details"].as_str().unwrap().contains("scanner exited"));
}

// =============================================================================
// Comparison and results
// =============================================================================

#[tokio::test]
async fn test_compare_requires_both_names() {
    let test = setup_app("true");
    let (status, body) = send(
        &test.app,
        post_json("/compare_videos", json!({ "video1": "north" })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Both filenames are required");
}

#[tokio::test]
async fn test_compare_missing_results() {
    let test = setup_app("true");
    test.write_result("north", r#"["MH12AB1234"]"#);

    let (status, body) = send(
        &test.app,
        post_json("/compare_videos", json!({ "video1": "north", "video2": "south" })),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "One or both result files not found");
}

#[tokio::test]
async fn test_compare_invalid_json() {
    let test = setup_app("true");
    test.write_result("north", r#"["MH12AB1234"]"#);
    test.write_result("south", "not json");

    let (status, body) = send(
        &test.app,
        post_json("/compare_videos", json!({ "video1": "north", "video2": "south" })),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "Invalid JSON format");
}

#[tokio::test]
async fn test_compare_writes_summary() {
    let test = setup_app("true");
    test.write_result("north", r#"["TN22X0001", "MH12AB1234", "KA05MN4321"]"#);
    test.write_result("south", r#"["KA05MN4321", "DL01C0001", "MH12AB1234"]"#);

    let (status, body) = send(
        &test.app,
        post_json("/compare_videos", json!({ "video1": "north", "video2": "south" })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({ "common_plates": ["KA05MN4321", "MH12AB1234"] })
    );

    let summary: Value = serde_json::from_str(
        &fs::read_to_string(test.results().join("north_south_violation.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(summary["video1"], "north");
    assert_eq!(summary["video2"], "south");
    assert_eq!(
        summary["violation_type"],
        "Common vehicle detection (likely violation)"
    );
}

#[tokio::test]
async fn test_results_requires_filename() {
    let test = setup_app("true");
    let (status, body) = send(&test.app, get("/results")).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Filename is required");
}

#[tokio::test]
async fn test_results_not_found() {
    let test = setup_app("true");
    let (status, body) = send(&test.app, get("/results?filename=north.mp4")).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Result file not found");
}

#[tokio::test]
async fn test_results_invalid_json() {
    let test = setup_app("true");
    test.write_result("north", "{\"plates\": ");

    let (status, body) = send(&test.app, get("/results?filename=north.mp4")).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "Invalid JSON format");
}

#[tokio::test]
async fn test_results_by_video_name() {
    let test = setup_app("true");
    test.write_result("north", r#"["MH12AB1234", "KA05MN4321"]"#);

    let (status, body) = send(&test.app, get("/results?filename=north.mp4")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "results": ["MH12AB1234", "KA05MN4321"] }));
}
