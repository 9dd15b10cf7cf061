//! Object store (S3) backend

use async_trait::async_trait;
use bytes::Bytes;
use hrp_core::{ChartName, INDEX_FILENAME};
use object_store::aws::AmazonS3Builder;
use object_store::path::Path as ObjectPath;
use object_store::{ObjectStore, PutPayload};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;

use super::{ChartBackend, index_builder};
use crate::builder::IndexBuilder;
use crate::config::{AppConfig, SyncMode};
use crate::error::{RepoError, Result, log_error_chain};
use crate::sync::{AwsCliSync, ObjectSync, RemoteLocation, StoreMirror};

/// Charts stored under a bucket prefix, indexed through a local mirror
///
/// Reindexing mirrors the prefix into `local_sync_path`, builds the index
/// there and uploads it back as `prefix/index.yaml`. Only one reindex runs
/// at a time per backend.
pub struct ObjectStoreBackend {
    store: Arc<dyn ObjectStore>,
    location: RemoteLocation,
    local_sync_path: PathBuf,
    base_url: String,
    sync: Arc<dyn ObjectSync>,
    indexer: Arc<dyn IndexBuilder>,
    reindex_lock: Mutex<()>,
}

impl ObjectStoreBackend {
    /// Build an S3 client from `config.s3`
    ///
    /// Required fields are checked before the client is created. Credentials
    /// come from the usual `AWS_*` environment variables.
    pub fn new(config: &AppConfig) -> Result<Self> {
        let s3 = &config.s3;
        s3.validate()?;

        let mut builder = AmazonS3Builder::from_env()
            .with_bucket_name(&s3.bucket)
            .with_region(&s3.region);
        if let Some(endpoint) = s3.endpoint.as_deref().filter(|e| !e.is_empty()) {
            builder = builder
                .with_endpoint(endpoint)
                .with_allow_http(endpoint.starts_with("http://"));
        }
        let store: Arc<dyn ObjectStore> = Arc::new(
            builder
                .build()
                .map_err(|source| RepoError::Connect { source })?,
        );

        let sync: Arc<dyn ObjectSync> = match config.sync {
            SyncMode::AwsCli => Arc::new(AwsCliSync::new(config.debug)),
            SyncMode::Native => Arc::new(StoreMirror::new(store.clone())),
        };

        let location = RemoteLocation::new(&s3.bucket, s3.normalized_prefix());
        tracing::debug!(
            location = %location,
            region = %s3.region,
            local_sync_path = %s3.local_sync_path.display(),
            "configured object store backend"
        );

        Ok(Self::with_store(
            store,
            location,
            s3.local_sync_path.clone(),
            &config.base_url,
            sync,
            index_builder(config),
        ))
    }

    /// Assemble a backend from already constructed parts
    pub fn with_store(
        store: Arc<dyn ObjectStore>,
        location: RemoteLocation,
        local_sync_path: impl Into<PathBuf>,
        base_url: impl Into<String>,
        sync: Arc<dyn ObjectSync>,
        indexer: Arc<dyn IndexBuilder>,
    ) -> Self {
        Self {
            store,
            location,
            local_sync_path: local_sync_path.into(),
            base_url: base_url.into(),
            sync,
            indexer,
            reindex_lock: Mutex::new(()),
        }
    }

    pub fn location(&self) -> &RemoteLocation {
        &self.location
    }

    fn index_key(&self) -> ObjectPath {
        self.location.key(INDEX_FILENAME)
    }

    async fn publish_index(&self, index: Bytes) -> Result<()> {
        let key = self.index_key();
        // PutPayload shares the buffer, so the client can retry the upload
        self.store
            .put(&key, PutPayload::from(index))
            .await
            .map_err(|source| {
                let err = RepoError::IndexPublish {
                    key: key.to_string(),
                    source,
                };
                log_error_chain(&err);
                err
            })?;
        Ok(())
    }
}

#[async_trait]
impl ChartBackend for ObjectStoreBackend {
    fn name(&self) -> &'static str {
        "s3"
    }

    async fn get_index(&self) -> Result<Bytes> {
        let key = self.index_key();
        let result = self.store.get(&key).await.map_err(|e| {
            RepoError::from_object_store(e, "get", key.as_ref(), || RepoError::IndexNotFound {
                location: format!("s3://{}/{}", self.location.bucket, key),
            })
        })?;
        result
            .bytes()
            .await
            .map_err(|e| RepoError::remote(e, "read", key.as_ref()))
    }

    async fn get_chart(&self, name: &str) -> Result<Bytes> {
        let name = ChartName::parse(name)?;
        let key = self.location.key(name.as_str());
        let result = self.store.get(&key).await.map_err(|e| {
            RepoError::from_object_store(e, "get", key.as_ref(), || RepoError::ChartNotFound {
                name: name.to_string(),
            })
        })?;
        result
            .bytes()
            .await
            .map_err(|e| RepoError::remote(e, "read", key.as_ref()))
    }

    async fn put_chart(&self, filename: &str, content: Bytes) -> Result<()> {
        let name = ChartName::parse_for_write(filename)?;
        let key = self.location.key(name.as_str());
        let size = content.len();

        self.store
            .put(&key, PutPayload::from(content))
            .await
            .map_err(|e| RepoError::remote(e, "put", key.as_ref()))?;
        tracing::info!(chart = %name, key = %key, bytes = size, "stored chart");

        self.reindex().await
    }

    async fn reindex(&self) -> Result<()> {
        let _guard = self.reindex_lock.lock().await;
        let started = Instant::now();
        tracing::info!(location = %self.location, "reindexing");

        tokio::fs::create_dir_all(&self.local_sync_path).await?;
        self.sync.sync(&self.location, &self.local_sync_path).await?;
        self.indexer
            .generate_index(&self.base_url, &self.local_sync_path)
            .await?;
        let index = self.indexer.read_index(&self.local_sync_path).await?;
        let size = index.len();
        self.publish_index(index).await?;

        tracing::info!(
            location = %self.location,
            bytes = size,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "reindex complete"
        );
        Ok(())
    }
}
