//! Error types for the binary
//!
//! [`CliError`] covers startup and is rendered with miette before exiting
//! with a code from [`crate::exit_codes`]. [`ApiError`] covers request
//! handling and turns into an HTTP response.

use axum::extract::multipart::MultipartError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use hrp_repo::{RepoError, error_chain};
use miette::Diagnostic;
use thiserror::Error;

use crate::exit_codes;

/// Startup error with exit code information
#[derive(Error, Debug, Diagnostic)]
pub enum CliError {
    /// Missing or conflicting options
    #[error("{message}")]
    #[diagnostic(code(hrp::cli::usage))]
    Usage {
        message: String,
        #[help]
        help: Option<String>,
    },

    /// Backend configuration rejected before connecting
    #[error("{message}")]
    #[diagnostic(code(hrp::cli::config))]
    Config {
        message: String,
        #[help]
        help: Option<String>,
    },

    /// Backend construction or initialization failed
    #[error("{message}")]
    #[diagnostic(code(hrp::cli::storage))]
    Storage { message: String },

    #[error("IO error: {message}")]
    #[diagnostic(code(hrp::cli::io))]
    Io { message: String },

    #[error("Internal error: {message}")]
    #[diagnostic(code(hrp::cli::internal))]
    Internal { message: String },
}

impl CliError {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Usage { .. } => exit_codes::USAGE_ERROR,
            CliError::Config { .. } => exit_codes::CONFIG_ERROR,
            CliError::Storage { .. } => exit_codes::STORAGE_ERROR,
            CliError::Io { .. } => exit_codes::IO_ERROR,
            CliError::Internal { .. } => exit_codes::ERROR,
        }
    }

    pub fn usage(message: impl Into<String>, help: impl Into<String>) -> Self {
        Self::Usage {
            message: message.into(),
            help: Some(help.into()),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        CliError::Io {
            message: err.to_string(),
        }
    }
}

impl From<RepoError> for CliError {
    fn from(err: RepoError) -> Self {
        if err.is_config() {
            return CliError::Config {
                help: config_help(&err),
                message: err.to_string(),
            };
        }
        match err {
            RepoError::Io(e) => e.into(),
            other => CliError::Storage {
                message: error_chain(&other),
            },
        }
    }
}

/// Point at the option that fixes a configuration error
fn config_help(err: &RepoError) -> Option<String> {
    let flag = match err {
        RepoError::MissingConfig { section, field } => match (*section, *field) {
            ("s3", "bucket") => "--s3-bucket (HRP_S3_BUCKET)",
            ("s3", "region") => "--s3-region (HRP_S3_REGION)",
            ("s3", "local sync path") => "--s3-local-sync-path (HRP_S3_LOCAL_SYNC_PATH)",
            ("filesystem", "path") => "--fs-path (HRP_FS_PATH)",
            _ => return None,
        },
        RepoError::UnknownBackend { .. } => {
            return Some("supported backends are 's3' and 'filesystem'".to_string());
        }
        _ => return None,
    };
    Some(format!("set {}", flag))
}

/// Result type for startup
pub type Result<T> = std::result::Result<T, CliError>;

/// Request failure, rendered as a plain-text response
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("missing '{0}' param")]
    MissingField(&'static str),

    #[error("invalid multipart body: {0}")]
    Multipart(#[from] MultipartError),

    #[error(transparent)]
    Backend(#[from] RepoError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::MissingField(_) => StatusCode::NOT_FOUND,
            ApiError::Multipart(e) => e.status(),
            ApiError::Backend(e) if e.is_not_found() => StatusCode::NOT_FOUND,
            ApiError::Backend(e) if e.is_invalid_name() => StatusCode::BAD_REQUEST,
            ApiError::Backend(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), error = %error_chain(&self), "request failed");
        } else {
            tracing::debug!(status = status.as_u16(), error = %self, "request rejected");
        }
        (status, self.to_string()).into_response()
    }
}
