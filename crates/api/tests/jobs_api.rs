//! Integration tests for `/start`, `/progress/{id}` and `/result/{id}`,
//! driven against a scripted stand-in for the extraction tool.

#![cfg(unix)]

mod common;

use std::time::Duration;

use axum::http::{header, StatusCode};
use axum::Router;
use common::{
    body_bytes, body_json, body_text, build_test_app, get, post_form, post_multipart, sse_events,
    test_config, TestDirs,
};

const SUCCESS_SCRIPT: &str = r#"
echo "[download]  25.0% of 4.00KiB at 2.00KiB/s ETA 00:02"
echo "[download]  75.0% of 4.00KiB at 2.00KiB/s ETA 00:01"
printf 'video-bytes' > creator-clip-xyz789.mp4
echo "[download] 100% of 4.00KiB"
echo "[reelfetch:id] xyz789"
echo "[reelfetch:path] $PWD/creator-clip-xyz789.mp4"
"#;

const YOUTUBE_FORM: &str = "url=https%3A%2F%2Fwww.youtube.com%2Fwatch%3Fv%3Dxyz789";

async fn start(app: &Router, body: &str) -> String {
    let response = post_form(app.clone(), "/start", body).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    json["job_id"].as_str().expect("job_id in response").to_string()
}

/// Read the whole SSE stream; it ends after the terminal event.
async fn progress(app: &Router, job_id: &str) -> Vec<serde_json::Value> {
    let response = get(app.clone(), &format!("/progress/{job_id}")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = tokio::time::timeout(Duration::from_secs(10), body_text(response))
        .await
        .expect("progress stream did not end");
    sse_events(&body)
}

#[tokio::test]
async fn full_flow_start_progress_result() {
    let dirs = TestDirs::new();
    let (app, _) = build_test_app(test_config(&dirs, SUCCESS_SCRIPT));

    let job_id = start(&app, YOUTUBE_FORM).await;
    assert_eq!(job_id.len(), 32);

    let events = progress(&app, &job_id).await;
    let types: Vec<&str> = events.iter().map(|e| e["type"].as_str().unwrap()).collect();
    assert_eq!(types, vec!["progress", "progress", "progress", "done"]);
    assert_eq!(events[0]["percent"], 25.0);
    assert_eq!(events[0]["total"], "4.00KiB");
    assert_eq!(events[0]["speed"], "2.00KiB/s");
    assert_eq!(events[0]["eta"], "00:02");
    assert_eq!(events[2]["percent"], 100.0);
    assert!(events[2]["speed"].is_null());
    assert_eq!(events[3]["filename"], "creator-clip-xyz789.mp4");

    let response = get(app.clone(), &format!("/result/{job_id}")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "video/mp4");
    assert_eq!(
        response.headers()[header::CONTENT_DISPOSITION],
        "attachment; filename=\"creator-clip-xyz789.mp4\""
    );
    assert_eq!(response.headers()[header::CONTENT_LENGTH], "11");
    assert_eq!(body_bytes(response).await, b"video-bytes");
}

#[tokio::test]
async fn progress_stream_headers() {
    let dirs = TestDirs::new();
    let (app, _) = build_test_app(test_config(&dirs, SUCCESS_SCRIPT));
    let job_id = start(&app, YOUTUBE_FORM).await;

    let response = get(app.clone(), &format!("/progress/{job_id}")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers()[header::CONTENT_TYPE]
        .to_str()
        .unwrap()
        .starts_with("text/event-stream"));
    assert_eq!(response.headers()["x-accel-buffering"], "no");
    assert_eq!(response.headers()[header::CACHE_CONTROL], "no-cache");
}

#[tokio::test]
async fn missing_url_is_rejected() {
    let dirs = TestDirs::new();
    let (app, state) = build_test_app(test_config(&dirs, SUCCESS_SCRIPT));

    let response = post_form(app, "/start", "url=").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["code"], "VALIDATION_ERROR");
    assert_eq!(json["error"], "A URL is required");
    assert_eq!(state.orchestrator.job_count(), 0);
}

#[tokio::test]
async fn unsupported_url_is_rejected() {
    let dirs = TestDirs::new();
    let (app, state) = build_test_app(test_config(&dirs, SUCCESS_SCRIPT));

    let response = post_form(app, "/start", "url=https%3A%2F%2Fvimeo.com%2F123").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert!(json["error"].as_str().unwrap().contains("Unsupported URL"));
    assert_eq!(state.orchestrator.job_count(), 0);
}

#[tokio::test]
async fn cookie_upload_must_be_txt() {
    let dirs = TestDirs::new();
    let (app, _) = build_test_app(test_config(&dirs, SUCCESS_SCRIPT));

    let response = post_multipart(
        app,
        "/start",
        &[
            ("url", None, "https://www.tiktok.com/@someone/video/1"),
            ("cookies", Some("cookies.json"), "{}"),
        ],
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["code"], "VALIDATION_ERROR");
    assert_eq!(json["error"], "Upload a cookies.txt file in Netscape format.");
    assert!(!dirs.cookies().join("cookies.txt").exists());
}

#[tokio::test]
async fn cookies_are_stored_and_forwarded_to_the_tool() {
    let dirs = TestDirs::new();
    // Records the generated arguments, then exits without an artifact.
    let script = r#"printf '%s\n' "$@" > args.log"#;
    let (app, _) = build_test_app(test_config(&dirs, script));

    let response = post_multipart(
        app.clone(),
        "/start",
        &[
            ("url", None, "https://www.instagram.com/reel/abc/"),
            ("cookie_header", None, "sessionid=42"),
            ("cookies", Some("cookies.txt"), "# Netscape HTTP Cookie File"),
        ],
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let job_id = body_json(response).await["job_id"].as_str().unwrap().to_string();

    let events = progress(&app, &job_id).await;
    assert_eq!(events.last().unwrap()["type"], "error");

    let stored = dirs.cookies().join("cookies.txt");
    assert_eq!(std::fs::read_to_string(&stored).unwrap(), "# Netscape HTTP Cookie File");

    let args = std::fs::read_to_string(dirs.downloads().join("args.log")).unwrap();
    let args: Vec<&str> = args.lines().collect();
    assert!(args.windows(2).any(|w| w == ["--add-header", "Cookie: sessionid=42"]));
    assert!(args
        .windows(2)
        .any(|w| w[0] == "--cookies" && w[1] == stored.to_str().unwrap()));
    assert!(args.windows(2).any(|w| w == ["--add-header", "Referer: https://www.instagram.com/"]));
    assert_eq!(args.last(), Some(&"https://www.instagram.com/reel/abc/"));
}

#[tokio::test]
async fn unknown_job_is_404_everywhere() {
    let dirs = TestDirs::new();
    let (app, _) = build_test_app(test_config(&dirs, SUCCESS_SCRIPT));

    let response = get(app.clone(), "/progress/does-not-exist").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = get(app, "/result/does-not-exist").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["code"], "NOT_FOUND");
}

#[tokio::test]
async fn result_while_running_is_409() {
    let dirs = TestDirs::new();
    let (app, _) = build_test_app(test_config(&dirs, "sleep 1; printf 'x' > slow.webm"));

    let job_id = start(&app, YOUTUBE_FORM).await;
    let response = get(app.clone(), &format!("/result/{job_id}")).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    progress(&app, &job_id).await;
    let response = get(app, &format!("/result/{job_id}")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "video/webm");
}

#[tokio::test]
async fn failed_job_result_is_500_with_message() {
    let dirs = TestDirs::new();
    let (app, _) = build_test_app(test_config(&dirs, "echo 'ERROR: Private video' >&2; exit 1"));

    let job_id = start(&app, YOUTUBE_FORM).await;
    let events = progress(&app, &job_id).await;
    assert_eq!(events.len(), 1);
    assert_eq!(events[0]["type"], "error");

    let response = get(app, &format!("/result/{job_id}")).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let json = body_json(response).await;
    assert_eq!(json["code"], "JOB_FAILED");
    assert_eq!(json["error"], events[0]["message"]);
}

#[tokio::test]
async fn deleted_result_is_410() {
    let dirs = TestDirs::new();
    let (app, _) = build_test_app(test_config(&dirs, SUCCESS_SCRIPT));

    let job_id = start(&app, YOUTUBE_FORM).await;
    progress(&app, &job_id).await;
    std::fs::remove_file(dirs.downloads().join("creator-clip-xyz789.mp4")).unwrap();

    let response = get(app, &format!("/result/{job_id}")).await;
    assert_eq!(response.status(), StatusCode::GONE);
}

#[tokio::test]
async fn reconnecting_after_completion_gets_empty_stream() {
    let dirs = TestDirs::new();
    let (app, _) = build_test_app(test_config(&dirs, SUCCESS_SCRIPT));

    let job_id = start(&app, YOUTUBE_FORM).await;
    assert!(!progress(&app, &job_id).await.is_empty());
    assert!(progress(&app, &job_id).await.is_empty());
}
