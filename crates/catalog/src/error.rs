//! CLI error types with miette diagnostics.
//!
//! Maps config, cache and fetch failures into user-facing errors with
//! actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use catalog_config::ConfigError;
use catalog_core::CacheError;

use crate::http::FetchError;

/// Process exit codes.
pub mod exit_code {
    pub const SUCCESS: i32 = 0;
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const NOT_FOUND: i32 = 4;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────

    #[error("Could not connect to {url}")]
    #[diagnostic(
        code(catalog::connection_failed),
        help("Check that the host is reachable.\nReason: {reason}")
    )]
    ConnectionFailed { url: String, reason: String },

    #[error("Request to {url} timed out after {seconds}s")]
    #[diagnostic(
        code(catalog::timeout),
        help("Increase the timeout with --timeout or [fetch] timeout_secs.")
    )]
    Timeout { url: String, seconds: u64 },

    // ── Objects ──────────────────────────────────────────────────────

    #[error("Object '{url}' not found (HTTP {status})")]
    #[diagnostic(code(catalog::not_found))]
    NotFound { url: String, status: u16 },

    #[error("Request to {url} failed with HTTP {status}")]
    #[diagnostic(code(catalog::http_status))]
    HttpStatus { url: String, status: u16 },

    #[error("Request to {url} failed: {message}")]
    #[diagnostic(code(catalog::request_failed))]
    Request { url: String, message: String },

    #[error("Could not build HTTP client: {message}")]
    #[diagnostic(code(catalog::client))]
    Client { message: String },

    // ── Cache ────────────────────────────────────────────────────────

    #[error(transparent)]
    #[diagnostic(code(catalog::cache))]
    Cache(#[from] CacheError),

    // ── Validation ───────────────────────────────────────────────────

    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(catalog::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────

    #[error("Configuration file already exists at {path}")]
    #[diagnostic(
        code(catalog::config_exists),
        help("Use --force to overwrite it, or edit it directly.")
    )]
    ConfigExists { path: String },

    #[error(transparent)]
    #[diagnostic(
        code(catalog::config),
        help("Check the config file (catalog config path) and CATALOG_* variables.")
    )]
    Config(#[from] ConfigError),

    // ── IO / Serialization ────────────────────────────────────────────

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Could not serialize output: {0}")]
    #[diagnostic(code(catalog::serialize))]
    Serialize(String),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } => exit_code::CONNECTION,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::NotFound { .. } => exit_code::NOT_FOUND,
            Self::Validation { .. } | Self::ConfigExists { .. } => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }
}

// ── FetchError → CliError mapping ────────────────────────────────────

impl From<FetchError> for CliError {
    fn from(err: FetchError) -> Self {
        match err {
            FetchError::Status { url, status } if status == 404 || status == 410 => {
                CliError::NotFound { url, status }
            }
            FetchError::Status { url, status } => CliError::HttpStatus { url, status },
            FetchError::Timeout { url, seconds } => CliError::Timeout { url, seconds },
            FetchError::Connect { url, message } => CliError::ConnectionFailed {
                url,
                reason: message,
            },
            FetchError::Request { url, message } => CliError::Request { url, message },
        }
    }
}
