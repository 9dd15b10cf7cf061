//! Local directory backend

use async_trait::async_trait;
use bytes::Bytes;
use hrp_core::ChartName;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;

use super::{ChartBackend, index_builder};
use crate::builder::IndexBuilder;
use crate::config::AppConfig;
use crate::error::{RepoError, Result};

/// Charts and `index.yaml` kept directly inside a root directory
pub struct FilesystemBackend {
    root: PathBuf,
    base_url: String,
    indexer: Arc<dyn IndexBuilder>,
    reindex_lock: Mutex<()>,
}

impl FilesystemBackend {
    pub fn new(config: &AppConfig) -> Result<Self> {
        config.filesystem.validate()?;
        tracing::debug!(root = %config.filesystem.path.display(), "configured filesystem backend");
        Ok(Self::with_indexer(
            config.filesystem.path.clone(),
            &config.base_url,
            index_builder(config),
        ))
    }

    pub fn with_indexer(
        root: impl Into<PathBuf>,
        base_url: impl Into<String>,
        indexer: Arc<dyn IndexBuilder>,
    ) -> Self {
        Self {
            root: root.into(),
            base_url: base_url.into(),
            indexer,
            reindex_lock: Mutex::new(()),
        }
    }
}

/// Write via a sibling temp file so a partial chart is never visible
///
/// Every write gets its own uniquely named temp file, so concurrent uploads
/// of the same chart never share one. The last rename wins.
async fn write_atomic(path: &Path, content: Bytes) -> Result<()> {
    let dir = path.parent().unwrap_or(Path::new(".")).to_path_buf();
    let path = path.to_path_buf();

    tokio::task::spawn_blocking(move || {
        let mut temp = tempfile::Builder::new()
            .prefix(".hrp-")
            .suffix(".part")
            .tempfile_in(&dir)?;
        temp.write_all(&content)?;
        temp.persist(&path).map_err(|e| e.error)?;
        Ok(())
    })
    .await
    .map_err(|e| RepoError::Io(std::io::Error::other(e)))?
}

#[async_trait]
impl ChartBackend for FilesystemBackend {
    fn name(&self) -> &'static str {
        "filesystem"
    }

    async fn get_index(&self) -> Result<Bytes> {
        self.indexer.read_index(&self.root).await
    }

    async fn get_chart(&self, name: &str) -> Result<Bytes> {
        let name = ChartName::parse(name)?;
        let path = self.root.join(name.as_str());
        match tokio::fs::read(&path).await {
            Ok(data) => Ok(Bytes::from(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(RepoError::ChartNotFound {
                name: name.to_string(),
            }),
            Err(e) => {
                tracing::error!(path = %path.display(), error = %e, "failed to read chart");
                Err(e.into())
            }
        }
    }

    async fn put_chart(&self, filename: &str, content: Bytes) -> Result<()> {
        let name = ChartName::parse_for_write(filename)?;
        tokio::fs::create_dir_all(&self.root).await?;
        let path = self.root.join(name.as_str());

        let size = content.len();
        write_atomic(&path, content).await?;
        tracing::info!(chart = %name, path = %path.display(), bytes = size, "stored chart");

        self.reindex().await
    }

    async fn reindex(&self) -> Result<()> {
        let _guard = self.reindex_lock.lock().await;
        let started = Instant::now();
        tracing::info!(root = %self.root.display(), "reindexing");

        tokio::fs::create_dir_all(&self.root).await?;
        self.indexer.generate_index(&self.base_url, &self.root).await?;

        tracing::info!(
            root = %self.root.display(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "reindex complete"
        );
        Ok(())
    }
}
