//! Error types for repository operations

use thiserror::Error;

/// Repository operation errors
#[derive(Debug, Error)]
pub enum RepoError {
    // ============ Configuration Errors ============
    #[error("invalid {section} config: {field} missing")]
    MissingConfig {
        section: &'static str,
        field: &'static str,
    },

    #[error("unrecognized storage backend: {name}")]
    UnknownBackend { name: String },

    // ============ Lookup Errors ============
    #[error("chart not found: {name}")]
    ChartNotFound { name: String },

    #[error("index not found at {location}")]
    IndexNotFound { location: String },

    #[error("{0}")]
    InvalidChartName(#[source] hrp_core::CoreError),

    // ============ Remote Errors ============
    #[error("object store {operation} failed for '{key}': {source}")]
    Remote {
        operation: &'static str,
        key: String,
        #[source]
        source: object_store::Error,
    },

    #[error("failed to create object store client: {source}")]
    Connect {
        #[source]
        source: object_store::Error,
    },

    #[error("index generated but publishing to '{key}' failed: {source}")]
    IndexPublish {
        key: String,
        #[source]
        source: object_store::Error,
    },

    // ============ External Tools ============
    #[error("{tool} failed: {message}")]
    ExternalTool { tool: String, message: String },

    // ============ Lifecycle ============
    #[error("failed to initialize backend: {source}")]
    Initialize {
        #[source]
        source: Box<RepoError>,
    },

    // ============ IO Errors ============
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("{0}")]
    Core(hrp_core::CoreError),
}

/// Result type for repository operations
pub type Result<T> = std::result::Result<T, RepoError>;

impl RepoError {
    /// Whether the requested chart or index does not exist
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::ChartNotFound { .. } | Self::IndexNotFound { .. } => true,
            Self::Initialize { source } => source.is_not_found(),
            _ => false,
        }
    }

    /// Whether this error comes from invalid or missing configuration
    pub fn is_config(&self) -> bool {
        matches!(self, Self::MissingConfig { .. } | Self::UnknownBackend { .. })
    }

    /// Whether the caller supplied an unusable chart name
    pub fn is_invalid_name(&self) -> bool {
        matches!(self, Self::InvalidChartName(_))
    }

    pub(crate) fn missing(section: &'static str, field: &'static str) -> Self {
        Self::MissingConfig { section, field }
    }

    /// Map an object store error, turning a missing key into `not_found`
    pub(crate) fn from_object_store(
        err: object_store::Error,
        operation: &'static str,
        key: &str,
        not_found: impl FnOnce() -> RepoError,
    ) -> Self {
        match err {
            object_store::Error::NotFound { .. } => not_found(),
            source => Self::remote(source, operation, key),
        }
    }

    /// Wrap an object store error, logging its cause chain
    pub(crate) fn remote(source: object_store::Error, operation: &'static str, key: &str) -> Self {
        let err = RepoError::Remote {
            operation,
            key: key.to_string(),
            source,
        };
        log_error_chain(&err);
        err
    }
}

impl From<hrp_core::CoreError> for RepoError {
    fn from(e: hrp_core::CoreError) -> Self {
        match e {
            e @ hrp_core::CoreError::InvalidChartName { .. } => RepoError::InvalidChartName(e),
            hrp_core::CoreError::Io(io) => RepoError::Io(io),
            other => RepoError::Core(other),
        }
    }
}

impl From<serde_yaml::Error> for RepoError {
    fn from(e: serde_yaml::Error) -> Self {
        RepoError::Serialization(e.to_string())
    }
}

/// Render an error and every underlying cause on one line
///
/// Causes whose message is already part of the rendered text are skipped.
pub fn error_chain(err: &(dyn std::error::Error + 'static)) -> String {
    let mut rendered = err.to_string();
    let mut current = err.source();
    while let Some(cause) = current {
        let message = cause.to_string();
        if !rendered.contains(&message) {
            rendered.push_str(": ");
            rendered.push_str(&message);
        }
        current = cause.source();
    }
    rendered
}

/// Log an error with its full cause chain
pub(crate) fn log_error_chain(err: &(dyn std::error::Error + 'static)) {
    tracing::error!(error = %error_chain(err), "storage operation failed");
}
