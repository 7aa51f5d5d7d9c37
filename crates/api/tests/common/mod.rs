#![allow(dead_code)]

use axum::body::Body;
use axum::http::{Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use reelfetch_api::config::ServerConfig;
use reelfetch_api::router::build_app_router;
use reelfetch_api::state::AppState;
use reelfetch_core::command::ToolCommand;
use reelfetch_core::schedule::DailyTime;
use tempfile::TempDir;
use tower::ServiceExt;

pub const BOUNDARY: &str = "reelfetch-test-boundary";

/// Scratch directories backing one test app. Dropping it deletes them.
pub struct TestDirs {
    pub root: TempDir,
}

impl TestDirs {
    pub fn new() -> Self {
        Self {
            root: tempfile::tempdir().unwrap(),
        }
    }

    pub fn downloads(&self) -> std::path::PathBuf {
        self.root.path().join("downloads")
    }

    pub fn cookies(&self) -> std::path::PathBuf {
        self.root.path().join("cookies")
    }
}

/// Build a test `ServerConfig` whose tool is `sh -c <script>`.
///
/// The generated tool arguments become unused positional parameters of the
/// script, which runs inside the download directory.
pub fn test_config(dirs: &TestDirs, script: &str) -> ServerConfig {
    std::fs::create_dir_all(dirs.downloads()).unwrap();
    std::fs::create_dir_all(dirs.cookies()).unwrap();

    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:8085".to_string()],
        request_timeout_secs: 30,
        download_dir: dirs.downloads(),
        cookies_dir: dirs.cookies(),
        tool: ToolCommand::new("sh").with_leading_args(["-c", script, "fake-yt-dlp"]),
        timezone: chrono_tz::UTC,
        cleanup_time: DailyTime::default(),
        cleanup_enabled: false,
        cleanup_min_age_secs: 0,
        max_concurrent_jobs: 2,
        max_queued_jobs: 8,
        job_ttl_secs: 3600,
        eviction_interval_secs: 60,
    }
}

/// Build the full application router exactly as `main.rs` does.
pub fn build_test_app(config: ServerConfig) -> (Router, AppState) {
    let state = AppState::new(config.clone());
    (build_app_router(state.clone(), &config), state)
}

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn post_form(app: Router, uri: &str, body: &str) -> Response<Body> {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/x-www-form-urlencoded")
        .body(Body::from(body.to_string()))
        .unwrap();
    app.oneshot(request).await.unwrap()
}

/// A multipart part: `(field name, optional file name, content)`.
pub type Part<'a> = (&'a str, Option<&'a str>, &'a str);

pub async fn post_multipart(app: Router, uri: &str, parts: &[Part<'_>]) -> Response<Body> {
    let mut body = String::new();
    for (name, file_name, content) in parts {
        body.push_str(&format!("--{BOUNDARY}\r\n"));
        match file_name {
            Some(file_name) => {
                body.push_str(&format!(
                    "Content-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\n"
                ));
                body.push_str("Content-Type: text/plain\r\n\r\n");
            }
            None => {
                body.push_str(&format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n"));
            }
        }
        body.push_str(content);
        body.push_str("\r\n");
    }
    body.push_str(&format!("--{BOUNDARY}--\r\n"));

    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", format!("multipart/form-data; boundary={BOUNDARY}"))
        .body(Body::from(body))
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    response.into_body().collect().await.unwrap().to_bytes().to_vec()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

pub async fn body_text(response: Response<Body>) -> String {
    String::from_utf8(body_bytes(response).await).unwrap()
}

/// Parse the `data:` payloads of an SSE body.
pub fn sse_events(body: &str) -> Vec<serde_json::Value> {
    body.lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(|data| serde_json::from_str(data.trim()).unwrap())
        .collect()
}
