use std::env;
use std::str::FromStr;
use std::time::Duration;

use dotenv::dotenv;

use crate::error::AppError;

pub const DEFAULT_FAL_BASE: &str = "https://fal.run";
pub const DEFAULT_FAL_REST: &str = "https://rest.alpha.fal.ai";
pub const DEFAULT_FAL_RUN: &str = "https://fal.run";
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;
pub const DEFAULT_MAX_UPLOAD_MB: usize = 50;

/// Process-wide, read-only settings. Built once at startup and shared behind an `Arc`.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub host: String,
    fal_key: Option<String>,
    pub fal_base_url: String,
    pub fal_rest_url: String,
    /// Synchronous model host used by the edit helper. Independent of the forwarder base,
    /// so pointing `/fal/*` at the queue host never turns edits into queue tickets.
    pub fal_run_url: String,
    pub timeout: Duration,
    pub max_upload_bytes: usize,
}

impl AppConfig {
    pub fn new() -> Result<Self, AppError> {
        dotenv().ok();

        let max_upload_mb: usize = parse_var("MAX_UPLOAD_MB", DEFAULT_MAX_UPLOAD_MB)?;
        let max_upload_bytes = max_upload_mb.checked_mul(1024 * 1024).ok_or_else(|| {
            AppError::InvalidConfig(format!("MAX_UPLOAD_MB is too large: {max_upload_mb}"))
        })?;

        Ok(Self {
            port: parse_var("PORT", 5000)?,
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            fal_key: env::var("FAL_KEY").ok().filter(|k| !k.is_empty()),
            fal_base_url: normalize_base(
                &env::var("FAL_BASE_URL").unwrap_or_else(|_| DEFAULT_FAL_BASE.to_string()),
            ),
            fal_rest_url: normalize_base(
                &env::var("FAL_REST_URL").unwrap_or_else(|_| DEFAULT_FAL_REST.to_string()),
            ),
            fal_run_url: normalize_base(
                &env::var("FAL_RUN_URL").unwrap_or_else(|_| DEFAULT_FAL_RUN.to_string()),
            ),
            timeout: Duration::from_secs(parse_var("FAL_TIMEOUT_SECS", DEFAULT_TIMEOUT_SECS)?),
            max_upload_bytes,
        })
    }

    /// Configuration pointing every fal endpoint at `base_url`, without touching the environment.
    pub fn for_base_url(base_url: &str, fal_key: Option<&str>) -> Self {
        let base = normalize_base(base_url);
        Self {
            port: 0,
            host: "127.0.0.1".to_string(),
            fal_key: fal_key.map(str::to_string),
            fal_rest_url: base.clone(),
            fal_run_url: base.clone(),
            fal_base_url: base,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_MB * 1024 * 1024,
        }
    }

    pub fn with_run_url(mut self, run_url: &str) -> Self {
        self.fal_run_url = normalize_base(run_url);
        self
    }

    /// The fal secret. Absence is only an error once a request actually needs it.
    pub fn fal_key(&self) -> Result<&str, AppError> {
        self.fal_key.as_deref().ok_or(AppError::MissingFalKey)
    }

    /// Value for the outbound `Authorization` header.
    pub fn authorization(&self) -> Result<String, AppError> {
        Ok(format!("Key {}", self.fal_key()?))
    }

    /// `<base>/<path>` with redundant slashes on both sides removed.
    pub fn fal_url(&self, path: &str) -> String {
        format!("{}/{}", self.fal_base_url, path.trim_start_matches('/'))
    }

    /// Synchronous endpoint for `model_id`, always on the run host.
    pub fn fal_run_endpoint(&self, model_id: &str) -> String {
        format!("{}/{}", self.fal_run_url, model_id.trim_matches('/'))
    }
}

pub struct TelemetryConfig {
    pub debug_mode: bool,
    pub prometheus_enabled: bool,
    pub json_logs: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            debug_mode: flag("DEBUG_METRICS"),
            prometheus_enabled: flag("ENABLE_PROMETHEUS"),
            json_logs: env::var("LOG_FORMAT").map(|v| v == "json").unwrap_or(false),
        }
    }
}

fn normalize_base(raw: &str) -> String {
    raw.trim().trim_end_matches('/').to_string()
}

fn flag(name: &str) -> bool {
    env::var(name)
        .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(false)
}

fn parse_var<T: FromStr>(name: &str, default: T) -> Result<T, AppError> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| AppError::InvalidConfig(format!("{name} must be a number, got {raw:?}"))),
        Err(_) => Ok(default),
    }
}
