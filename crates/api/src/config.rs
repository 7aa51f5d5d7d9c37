use std::path::PathBuf;
use std::str::FromStr;

use chrono_tz::Tz;
use reelfetch_core::command::ToolCommand;
use reelfetch_core::schedule::DailyTime;

pub const DEFAULT_TIMEZONE: Tz = chrono_tz::America::Sao_Paulo;

/// Startup configuration error. Fatal: the server refuses to start.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{var} must be {expected}, got {value:?}")]
    Invalid {
        var: &'static str,
        value: String,
        expected: &'static str,
    },
}

/// Server configuration loaded from environment variables.
///
/// All fields have defaults suitable for running locally next to a `yt-dlp`
/// on `PATH`.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `8085`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// Timeout for producing a response, in seconds. Streamed bodies (SSE,
    /// file downloads) are not cut off once headers are sent.
    pub request_timeout_secs: u64,
    /// Shared working directory for all extractions.
    pub download_dir: PathBuf,
    /// Where an uploaded `cookies.txt` is stored and looked up.
    pub cookies_dir: PathBuf,
    /// How to launch the extraction tool.
    pub tool: ToolCommand,
    pub timezone: Tz,
    pub cleanup_time: DailyTime,
    pub cleanup_enabled: bool,
    /// Entries younger than this survive a cleanup sweep.
    pub cleanup_min_age_secs: u64,
    pub max_concurrent_jobs: usize,
    pub max_queued_jobs: usize,
    /// How long a finished job stays queryable.
    pub job_ttl_secs: u64,
    pub eviction_interval_secs: u64,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                  | Default                 |
    /// |--------------------------|-------------------------|
    /// | `HOST`                   | `0.0.0.0`               |
    /// | `PORT`                   | `8085`                  |
    /// | `CORS_ORIGINS`           | `http://localhost:8085` |
    /// | `REQUEST_TIMEOUT_SECS`   | `30`                    |
    /// | `DOWNLOAD_DIR`           | `downloads`             |
    /// | `COOKIES_DIR`            | `cookies`               |
    /// | `YTDLP_BIN`              | `yt-dlp`                |
    /// | `TZ`                     | `America/Sao_Paulo`     |
    /// | `CLEANUP_TIME`           | `00:01`                 |
    /// | `CLEANUP_ENABLED`        | `true`                  |
    /// | `CLEANUP_MIN_AGE_SECS`   | `21600`                 |
    /// | `MAX_CONCURRENT_JOBS`    | `4`                     |
    /// | `MAX_QUEUED_JOBS`        | `64`                    |
    /// | `JOB_TTL_SECS`           | `3600`                  |
    /// | `EVICTION_INTERVAL_SECS` | `60`                    |
    ///
    /// An unknown `TZ` or malformed `CLEANUP_TIME` falls back to its default
    /// with a warning; malformed numbers are errors.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let host = var("HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port = parse_var(&var, "PORT", 8085u16, "a valid port number")?;

        let cors_origins: Vec<String> = var("CORS_ORIGINS")
            .unwrap_or_else(|| "http://localhost:8085".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs =
            parse_var(&var, "REQUEST_TIMEOUT_SECS", 30u64, "a whole number of seconds")?;

        let download_dir = PathBuf::from(var("DOWNLOAD_DIR").unwrap_or_else(|| "downloads".into()));
        let cookies_dir = PathBuf::from(var("COOKIES_DIR").unwrap_or_else(|| "cookies".into()));
        let tool = var("YTDLP_BIN")
            .and_then(|line| ToolCommand::parse(&line))
            .unwrap_or_default();

        let timezone = match var("TZ") {
            None => DEFAULT_TIMEZONE,
            Some(name) => name.trim().parse::<Tz>().unwrap_or_else(|_| {
                tracing::warn!(tz = %name, "Unknown timezone, using UTC");
                chrono_tz::UTC
            }),
        };

        let cleanup_time = match var("CLEANUP_TIME") {
            None => DailyTime::default(),
            Some(raw) => raw.parse().unwrap_or_else(|_| {
                let fallback = DailyTime::default();
                tracing::warn!(value = %raw, %fallback, "Malformed CLEANUP_TIME, using default");
                fallback
            }),
        };

        let cleanup_enabled = var("CLEANUP_ENABLED").map_or(true, |v| is_truthy(&v));
        let cleanup_min_age_secs =
            parse_var(&var, "CLEANUP_MIN_AGE_SECS", 21_600u64, "a whole number of seconds")?;

        let max_concurrent_jobs = parse_var(&var, "MAX_CONCURRENT_JOBS", 4usize, "a positive integer")?;
        let max_queued_jobs = parse_var(&var, "MAX_QUEUED_JOBS", 64usize, "a positive integer")?;
        if max_concurrent_jobs == 0 {
            return Err(invalid("MAX_CONCURRENT_JOBS", "0", "a positive integer"));
        }
        if max_queued_jobs == 0 {
            return Err(invalid("MAX_QUEUED_JOBS", "0", "a positive integer"));
        }

        let job_ttl_secs = parse_var(&var, "JOB_TTL_SECS", 3600u64, "a whole number of seconds")?;
        let eviction_interval_secs =
            parse_var(&var, "EVICTION_INTERVAL_SECS", 60u64, "a whole number of seconds")?;
        if eviction_interval_secs == 0 {
            return Err(invalid("EVICTION_INTERVAL_SECS", "0", "at least 1"));
        }

        Ok(Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            download_dir,
            cookies_dir,
            tool,
            timezone,
            cleanup_time,
            cleanup_enabled,
            cleanup_min_age_secs,
            max_concurrent_jobs,
            max_queued_jobs,
            job_ttl_secs,
            eviction_interval_secs,
        })
    }
}

fn parse_var<T, F>(var: &F, name: &'static str, default: T, expected: &'static str) -> Result<T, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match var(name) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| invalid(name, &raw, expected)),
    }
}

fn invalid(var: &'static str, value: &str, expected: &'static str) -> ConfigError {
    ConfigError::Invalid {
        var,
        value: value.to_string(),
        expected,
    }
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
