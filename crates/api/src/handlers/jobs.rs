//! Handlers for extraction jobs.
//!
//! A client starts a job, follows its progress over SSE, and downloads the
//! produced file once the stream reports `done`.

use std::io;
use std::path::{Path as FsPath, PathBuf};
use std::time::Duration;

use axum::body::{Body, Bytes};
use axum::extract::{FromRequest, Multipart, Path, Request, State};
use axum::http::header::{self, HeaderName, HeaderValue};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::{Form, Json};
use futures::StreamExt;
use reelfetch_core::command::ExternalCommandSpec;
use reelfetch_core::error::CoreError;
use reelfetch_core::media::content_type_for;
use reelfetch_core::platform::validate_media_url;
use reelfetch_core::types::JobId;
use reelfetch_pipeline::orchestrator::MSG_FILE_GONE;
use serde::{Deserialize, Serialize};
use tokio_util::io::ReaderStream;

use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// Name an uploaded cookies file is stored under, inside `COOKIES_DIR`.
pub const COOKIES_FILE_NAME: &str = "cookies.txt";

const MSG_BAD_COOKIES_FILE: &str = "Upload a cookies.txt file in Netscape format.";

/// Interval between SSE keep-alive comments.
const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(15);

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

/// Fields accepted by `POST /start`, from either form encoding.
#[derive(Debug, Default)]
struct StartForm {
    url: String,
    cookie_header: Option<String>,
    /// Uploaded cookies file: original file name and contents.
    cookies: Option<(String, Bytes)>,
}

#[derive(Debug, Deserialize)]
struct UrlEncodedStart {
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    cookie_header: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StartResponse {
    pub job_id: JobId,
}

// ---------------------------------------------------------------------------
// POST /start
// ---------------------------------------------------------------------------

/// Validate the submission, persist an uploaded cookies file, and queue the
/// extraction. Responds as soon as the job is queued.
pub async fn start_job(
    State(state): State<AppState>,
    request: Request,
) -> AppResult<Json<StartResponse>> {
    let form = read_start_form(request).await?;

    let platform = validate_media_url(&form.url)?;
    let cookie_file = resolve_cookie_file(&state.config.cookies_dir, form.cookies).await?;

    let spec = ExternalCommandSpec::new(platform, form.url.trim())
        .with_cookie_header(form.cookie_header)
        .with_cookie_file(cookie_file);

    let job_id = state.orchestrator.start(&spec)?;
    tracing::info!(
        %job_id,
        platform = %platform,
        with_cookie_header = spec.cookie_header.is_some(),
        with_cookie_file = spec.cookie_file.is_some(),
        "Extraction queued",
    );

    Ok(Json(StartResponse { job_id }))
}

async fn read_start_form(request: Request) -> AppResult<StartForm> {
    let is_multipart = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.to_ascii_lowercase().starts_with("multipart/form-data"));

    if is_multipart {
        let multipart = Multipart::from_request(request, &())
            .await
            .map_err(|e| AppError::BadRequest(e.body_text()))?;
        read_multipart(multipart).await
    } else {
        let Form(fields) = Form::<UrlEncodedStart>::from_request(request, &())
            .await
            .map_err(|e| AppError::BadRequest(e.body_text()))?;
        Ok(StartForm {
            url: fields.url.unwrap_or_default(),
            cookie_header: fields.cookie_header,
            cookies: None,
        })
    }
}

async fn read_multipart(mut multipart: Multipart) -> AppResult<StartForm> {
    let mut form = StartForm::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?
    {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "url" => {
                form.url = field
                    .text()
                    .await
                    .map_err(|e| AppError::BadRequest(e.to_string()))?;
            }
            "cookie_header" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| AppError::BadRequest(e.to_string()))?;
                form.cookie_header = Some(text);
            }
            "cookies" => {
                // Browsers send an empty part when no file was chosen.
                let file_name = field.file_name().unwrap_or("").to_string();
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::BadRequest(e.to_string()))?;
                if !file_name.is_empty() {
                    form.cookies = Some((file_name, data));
                }
            }
            _ => {} // ignore unknown fields
        }
    }

    Ok(form)
}

/// Store an uploaded cookies file, or fall back to a previously stored one.
async fn resolve_cookie_file(
    cookies_dir: &FsPath,
    upload: Option<(String, Bytes)>,
) -> AppResult<Option<PathBuf>> {
    let stored = cookies_dir.join(COOKIES_FILE_NAME);

    if let Some((file_name, data)) = upload {
        if !file_name.to_ascii_lowercase().ends_with(".txt") {
            return Err(CoreError::Validation(MSG_BAD_COOKIES_FILE.to_string()).into());
        }
        tokio::fs::create_dir_all(cookies_dir)
            .await
            .map_err(|e| AppError::InternalError(e.to_string()))?;
        tokio::fs::write(&stored, &data)
            .await
            .map_err(|e| AppError::InternalError(e.to_string()))?;
        tracing::info!(path = %stored.display(), bytes = data.len(), "Stored uploaded cookies file");
        return Ok(Some(stored));
    }

    let exists = tokio::fs::metadata(&stored)
        .await
        .is_ok_and(|m| m.is_file());
    Ok(exists.then_some(stored))
}

// ---------------------------------------------------------------------------
// GET /progress/{id}
// ---------------------------------------------------------------------------

/// Stream the job's events as SSE `data:` frames until the terminal one.
///
/// Events already delivered to an earlier connection are not replayed; a
/// second connection waits until the first disconnects.
pub async fn job_progress(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Response> {
    let job_id = JobId::from(id);
    let events = state.orchestrator.subscribe(&job_id)?;
    tracing::debug!(%job_id, "Progress stream opened");

    let frames = events.map(|event| Event::default().json_data(&event));

    let sse = Sse::new(frames).keep_alive(
        KeepAlive::new()
            .interval(KEEP_ALIVE_INTERVAL)
            .text("keep-alive"),
    );

    Ok((
        [(
            HeaderName::from_static("x-accel-buffering"),
            HeaderValue::from_static("no"),
        )],
        sse,
    )
        .into_response())
}

// ---------------------------------------------------------------------------
// GET /result/{id}
// ---------------------------------------------------------------------------

/// Download the produced file as an attachment.
pub async fn job_result(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Response> {
    let job_id = JobId::from(id);
    let path = state.orchestrator.result(&job_id).await?;

    let file = tokio::fs::File::open(&path).await.map_err(file_error)?;
    let size = file.metadata().await.map_err(file_error)?.len();

    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| format!("{job_id}.mp4"));

    tracing::info!(%job_id, file = %filename, size, "Serving result");

    Response::builder()
        .header(header::CONTENT_TYPE, content_type_for(&path))
        .header(header::CONTENT_LENGTH, size.to_string())
        .header(header::CONTENT_DISPOSITION, content_disposition(&filename))
        .body(Body::from_stream(ReaderStream::new(file)))
        .map_err(|e| AppError::InternalError(e.to_string()))
}

/// The file may vanish between the result check and the open.
fn file_error(err: io::Error) -> AppError {
    if err.kind() == io::ErrorKind::NotFound {
        AppError::Core(CoreError::Gone(MSG_FILE_GONE.to_string()))
    } else {
        AppError::InternalError(err.to_string())
    }
}

/// `attachment` disposition with an ASCII fallback name and, when needed,
/// an RFC 5987 encoded UTF-8 name.
fn content_disposition(filename: &str) -> String {
    let fallback: String = filename
        .chars()
        .map(|c| {
            if (c.is_ascii_graphic() && c != '"' && c != '\\') || c == ' ' {
                c
            } else {
                '_'
            }
        })
        .collect();

    if fallback == filename {
        return format!("attachment; filename=\"{filename}\"");
    }

    let mut encoded = String::with_capacity(filename.len() * 3);
    for byte in filename.bytes() {
        if byte.is_ascii_alphanumeric() || b"-._~".contains(&byte) {
            encoded.push(byte as char);
        } else {
            encoded.push_str(&format!("%{byte:02X}"));
        }
    }
    format!("attachment; filename=\"{fallback}\"; filename*=UTF-8''{encoded}")
}
