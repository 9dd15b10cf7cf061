//! Storage backends
//!
//! A backend owns one repository location: the chart archives and the
//! `index.yaml` derived from them. Every write ends in a full reindex, and
//! reindexing is serialized per backend instance.

mod filesystem;
mod s3;

pub use filesystem::FilesystemBackend;
pub use s3::ObjectStoreBackend;

use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;

use crate::builder::{HelmIndexBuilder, IndexBuilder, NativeIndexBuilder};
use crate::config::{AppConfig, BackendKind, IndexerKind};
use crate::error::{RepoError, Result};

/// Chart storage with a derived repository index
#[async_trait]
pub trait ChartBackend: Send + Sync {
    /// Short backend name for logs
    fn name(&self) -> &'static str;

    /// Startup self-check. Runs a full reindex so that the published index
    /// matches whatever charts are already stored.
    async fn initialize(&self) -> Result<()> {
        tracing::info!(backend = self.name(), "initializing backend");
        self.reindex().await
    }

    /// The current `index.yaml`, verbatim
    async fn get_index(&self) -> Result<Bytes>;

    /// Raw bytes of a stored chart archive
    async fn get_chart(&self, name: &str) -> Result<Bytes>;

    /// Store a chart archive, then reindex.
    ///
    /// If the reindex fails the archive stays stored and the error is
    /// returned; the next successful reindex picks it up.
    async fn put_chart(&self, filename: &str, content: Bytes) -> Result<()>;

    /// Regenerate and republish `index.yaml` from the full chart set
    async fn reindex(&self) -> Result<()>;
}

/// Construct the configured backend without touching storage
pub fn create_backend(config: &AppConfig) -> Result<Arc<dyn ChartBackend>> {
    match config.backend_kind()? {
        BackendKind::S3 => Ok(Arc::new(ObjectStoreBackend::new(config)?)),
        BackendKind::Filesystem => Ok(Arc::new(FilesystemBackend::new(config)?)),
    }
}

/// Construct and initialize the configured backend
///
/// Initialization failures are wrapped in [`RepoError::Initialize`];
/// configuration errors are returned as-is.
pub async fn open_backend(config: &AppConfig) -> Result<Arc<dyn ChartBackend>> {
    let backend = create_backend(config)?;
    backend
        .initialize()
        .await
        .map_err(|e| RepoError::Initialize {
            source: Box::new(e),
        })?;
    tracing::info!(backend = backend.name(), "backend ready");
    Ok(backend)
}

pub(crate) fn index_builder(config: &AppConfig) -> Arc<dyn IndexBuilder> {
    match config.indexer {
        IndexerKind::Helm => Arc::new(HelmIndexBuilder::new(config.debug)),
        IndexerKind::Native => Arc::new(NativeIndexBuilder::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FilesystemConfig;
    use crate::testing::chart_archive;
    use tempfile::TempDir;

    fn filesystem_config(root: &std::path::Path) -> AppConfig {
        AppConfig {
            backend: "filesystem".to_string(),
            base_url: "http://localhost:1323".to_string(),
            indexer: IndexerKind::Native,
            filesystem: FilesystemConfig {
                path: root.to_path_buf(),
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_unknown_backend() {
        let config = AppConfig {
            backend: "ftp".to_string(),
            ..Default::default()
        };
        let err = create_backend(&config).err().unwrap();
        assert!(matches!(err, RepoError::UnknownBackend { ref name } if name == "ftp"));
    }

    #[test]
    fn test_missing_bucket_fails_before_connecting() {
        let mut config = AppConfig {
            backend: "s3".to_string(),
            ..Default::default()
        };
        config.s3.region = "us-east-1".to_string();
        let err = create_backend(&config).err().unwrap();
        assert_eq!(err.to_string(), "invalid s3 config: bucket missing");
    }

    #[test]
    fn test_missing_region_named() {
        let mut config = AppConfig {
            backend: "s3".to_string(),
            ..Default::default()
        };
        config.s3.bucket = "b".to_string();
        let err = create_backend(&config).err().unwrap();
        assert!(err.is_config());
        assert!(err.to_string().contains("region"));
    }

    #[test]
    fn test_missing_filesystem_path() {
        let config = AppConfig {
            backend: "filesystem".to_string(),
            ..Default::default()
        };
        let err = create_backend(&config).err().unwrap();
        assert_eq!(err.to_string(), "invalid filesystem config: path missing");
    }

    #[tokio::test]
    async fn test_open_backend_indexes_existing_charts() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("app-1.0.0.tgz"), chart_archive("app", "1.0.0")).unwrap();

        let backend = open_backend(&filesystem_config(temp.path())).await.unwrap();
        let index = crate::RepositoryIndex::from_bytes(&backend.get_index().await.unwrap()).unwrap();
        assert!(index.references("app-1.0.0.tgz"));
    }

    #[tokio::test]
    async fn test_open_backend_wraps_initialize_failure() {
        let temp = TempDir::new().unwrap();
        let mut config = filesystem_config(temp.path());
        // a regular file cannot serve as the repository root
        let file = temp.path().join("not-a-dir");
        std::fs::write(&file, b"x").unwrap();
        config.filesystem.path = file;

        let err = open_backend(&config).await.err().unwrap();
        assert!(matches!(err, RepoError::Initialize { .. }));
        assert!(err.to_string().starts_with("failed to initialize backend"));
    }
}
