use std::path::Path;
use std::time::Duration;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use clipgrab::error::FFMPEG_NOT_INSTALLED;
use clipgrab::server::{router, AppState};
use clipgrab::tools::Toolchain;

/// A toolchain whose binaries cannot exist, so any external call would fail loudly.
fn no_tools() -> Toolchain {
    Toolchain {
        ytdlp: "/nonexistent/clipgrab-yt-dlp".into(),
        ffmpeg: "/nonexistent/clipgrab-ffmpeg".into(),
        timeout: Duration::from_secs(5),
    }
}

fn app(download_dir: &Path) -> Router {
    router(AppState::new(no_tools(), download_dir.to_path_buf()))
}

async fn post_json(app: Router, uri: &str, body: Value) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&bytes).unwrap())
}

async fn post_raw(app: Router, uri: &str, body: &str) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&bytes).unwrap())
}

async fn get(app: Router, uri: &str) -> (StatusCode, axum::http::HeaderMap, Vec<u8>) {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, headers, bytes.to_vec())
}

#[tokio::test]
async fn index_renders_the_form() {
    let dir = tempfile::tempdir().unwrap();
    let (status, _, body) = get(app(dir.path()), "/").await;

    assert_eq!(status, StatusCode::OK);
    let html = tokio_test::assert_ok!(String::from_utf8(body));
    assert!(html.contains("<option value=\"single_best\""));
    assert!(html.contains("Audio Only (MP3) - Requires FFmpeg"));
}

#[tokio::test]
async fn reports_missing_ffmpeg() {
    let dir = tempfile::tempdir().unwrap();
    let (status, _, body) = get(app(dir.path()), "/check-ffmpeg").await;

    assert_eq!(status, StatusCode::OK);
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body, json!({ "available": false }));
}

#[tokio::test]
async fn missing_url_is_rejected() {
    let dir = tempfile::tempdir().unwrap();

    let (status, body) = post_json(app(dir.path()), "/download", json!({ "quality": "480p" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "URL is required");

    let (status, body) = post_json(app(dir.path()), "/download", json!({ "url": "  " })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "URL is required");
}

#[tokio::test]
async fn unrecognised_url_is_rejected_before_download() {
    let dir = tempfile::tempdir().unwrap();
    let (status, body) = post_json(
        app(dir.path()),
        "/download",
        json!({ "url": "javascript:alert(1)", "quality": "single_best" }),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid URL");
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);

    let (status, body) = post_json(
        app(dir.path()),
        "/download",
        json!({ "url": "not a url", "quality": "single_best" }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid URL");
}

#[tokio::test]
async fn unknown_quality_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let (status, body) = post_json(
        app(dir.path()),
        "/download",
        json!({ "url": "https://www.youtube.com/watch?v=dQw4w9WgXcQ", "quality": "4k" }),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Unknown quality: 4k");
}

#[tokio::test]
async fn merge_presets_need_ffmpeg() {
    let dir = tempfile::tempdir().unwrap();

    for quality in ["best", "1080p", "720p", "audio"] {
        let (status, body) = post_json(
            app(dir.path()),
            "/download",
            json!({ "url": "https://www.youtube.com/watch?v=dQw4w9WgXcQ", "quality": quality }),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST, "{quality}");
        assert_eq!(body["error"], FFMPEG_NOT_INSTALLED);
    }
}

#[tokio::test]
async fn extractor_failure_is_reported_and_cleaned_up() {
    let dir = tempfile::tempdir().unwrap();
    let (status, body) = post_json(
        app(dir.path()),
        "/download",
        json!({ "url": "https://www.youtube.com/watch?v=dQw4w9WgXcQ", "quality": "360p" }),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "yt-dlp is not installed or not on PATH");
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn serves_file_then_removes_it() {
    let dir = tempfile::tempdir().unwrap();
    let job = Uuid::new_v4();
    let job_dir = dir.path().join(job.to_string());
    std::fs::create_dir(&job_dir).unwrap();
    std::fs::write(job_dir.join("My Clip.mp4"), b"not really a video").unwrap();

    let uri = format!("/get-file/{job}/My%20Clip.mp4");
    let (status, headers, body) = get(app(dir.path()), &uri).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, b"not really a video");
    assert_eq!(headers[header::CONTENT_TYPE], "video/mp4");
    assert_eq!(headers[header::CONTENT_LENGTH], "18");
    assert!(headers[header::CONTENT_DISPOSITION]
        .to_str()
        .unwrap()
        .starts_with("attachment; filename=\"My Clip.mp4\""));
    assert!(!job_dir.exists());

    let (status, _, _) = get(app(dir.path()), &uri).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn get_file_rejects_bad_paths() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("outside.mp4"), b"x").unwrap();

    let (status, _, body) = get(app(dir.path()), "/get-file/not-a-job/outside.mp4").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body["error"], "File not found");

    let uri = format!("/get-file/{}/..%2Foutside.mp4", Uuid::new_v4());
    let (status, _, _) = get(app(dir.path()), &uri).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(dir.path().join("outside.mp4").exists());
}

#[tokio::test]
async fn stream_listing_needs_a_video_id() {
    let dir = tempfile::tempdir().unwrap();
    let (status, body) = post_json(
        app(dir.path()),
        "/api/streams",
        json!({ "url": "https://example.com/clip" }),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("video id"));
}

#[tokio::test]
async fn malformed_bodies_get_a_json_error() {
    let dir = tempfile::tempdir().unwrap();

    for uri in ["/download", "/api/streams"] {
        for body in ["garbage", r#"{"url": 5}"#] {
            let (status, reply) = post_raw(app(dir.path()), uri, body).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{uri} {body}");
            assert!(reply["error"].is_string(), "{uri} {body}");
        }
    }
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

/// Stand-in for yt-dlp: fills in the output template and prints the path.
#[cfg(unix)]
const FAKE_YTDLP: &str = r#"#!/bin/sh
out=""
while [ $# -gt 0 ]; do
  if [ "$1" = "--output" ]; then out="$2"; shift; fi
  shift
done
out="$(dirname "$out")/Clip.mp4"
printf 'fake media' > "$out"
echo "$out"
"#;

#[cfg(unix)]
#[tokio::test]
async fn successful_download_links_to_the_file() {
    use std::os::unix::fs::PermissionsExt;

    let bin = tempfile::tempdir().unwrap();
    let ytdlp = bin.path().join("yt-dlp");
    std::fs::write(&ytdlp, FAKE_YTDLP).unwrap();
    std::fs::set_permissions(&ytdlp, std::fs::Permissions::from_mode(0o755)).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let tools = Toolchain {
        ytdlp: ytdlp.to_string_lossy().into_owned(),
        ..no_tools()
    };
    let app = router(AppState::new(tools, dir.path().to_path_buf()));

    let (status, body) = post_json(
        app.clone(),
        "/download",
        json!({ "url": "https://www.youtube.com/watch?v=dQw4w9WgXcQ", "quality": "360p" }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Download completed successfully!");
    assert_eq!(body["filename"], "Clip.mp4");
    let job = body["job"].as_str().unwrap();
    let link = body["download_url"].as_str().unwrap();
    assert_eq!(link, format!("/get-file/{job}/Clip.mp4"));

    let (status, _, file) = get(app, link).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(file, b"fake media");
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}
