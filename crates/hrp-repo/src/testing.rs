//! Shared test fixtures

use async_trait::async_trait;
use bytes::Bytes;
use flate2::Compression;
use flate2::write::GzEncoder;
use futures::stream::BoxStream;
use object_store::path::Path as ObjectPath;
use object_store::{
    GetOptions, GetResult, ListResult, MultipartUpload, ObjectMeta, ObjectStore, PutMultipartOptions,
    PutOptions, PutPayload, PutResult,
};
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::builder::IndexBuilder;
use crate::error::{RepoError, Result};
use crate::sync::{ObjectSync, RemoteLocation};

/// Gzipped chart archive containing `<name>/Chart.yaml`
pub(crate) fn chart_archive(name: &str, version: &str) -> Vec<u8> {
    let chart_yaml = format!(
        "apiVersion: v2\nname: {}\nversion: {}\ndescription: test chart\n",
        name, version
    );
    let values = b"replicaCount: 1\n";

    let mut tar = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));
    for (path, data) in [
        (format!("{}/Chart.yaml", name), chart_yaml.as_bytes()),
        (format!("{}/values.yaml", name), &values[..]),
    ] {
        let mut header = tar::Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        tar.append_data(&mut header, path, data).unwrap();
    }
    tar.into_inner().unwrap().finish().unwrap()
}

/// Sync client that always fails
pub(crate) struct FailingSync;

#[async_trait]
impl ObjectSync for FailingSync {
    async fn sync(&self, _source: &RemoteLocation, _target: &Path) -> Result<()> {
        Err(RepoError::ExternalTool {
            tool: "aws".to_string(),
            message: "exit status: 1: could not connect to endpoint".to_string(),
        })
    }
}

/// Index builder whose generation always fails
pub(crate) struct FailingIndexBuilder;

#[async_trait]
impl IndexBuilder for FailingIndexBuilder {
    async fn generate_index(&self, _base_url: &str, _dir: &Path) -> Result<()> {
        Err(RepoError::ExternalTool {
            tool: "helm".to_string(),
            message: "exit status: 1: chart metadata is missing".to_string(),
        })
    }
}

/// Object store that refuses writes to one key and delegates everything else
#[derive(Debug)]
pub(crate) struct RejectingStore {
    inner: Arc<dyn ObjectStore>,
    rejected: ObjectPath,
}

impl RejectingStore {
    pub(crate) fn new(inner: Arc<dyn ObjectStore>, rejected: &str) -> Self {
        Self {
            inner,
            rejected: ObjectPath::from(rejected),
        }
    }
}

impl fmt::Display for RejectingStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RejectingStore({}, {})", self.inner, self.rejected)
    }
}

#[async_trait]
impl ObjectStore for RejectingStore {
    async fn put_opts(
        &self,
        location: &ObjectPath,
        payload: PutPayload,
        opts: PutOptions,
    ) -> object_store::Result<PutResult> {
        if *location == self.rejected {
            return Err(object_store::Error::Generic {
                store: "RejectingStore",
                source: "access denied".into(),
            });
        }
        self.inner.put_opts(location, payload, opts).await
    }

    async fn put_multipart_opts(
        &self,
        location: &ObjectPath,
        opts: PutMultipartOptions,
    ) -> object_store::Result<Box<dyn MultipartUpload>> {
        self.inner.put_multipart_opts(location, opts).await
    }

    async fn get_opts(
        &self,
        location: &ObjectPath,
        options: GetOptions,
    ) -> object_store::Result<GetResult> {
        self.inner.get_opts(location, options).await
    }

    async fn delete(&self, location: &ObjectPath) -> object_store::Result<()> {
        self.inner.delete(location).await
    }

    fn list(&self, prefix: Option<&ObjectPath>) -> BoxStream<'static, object_store::Result<ObjectMeta>> {
        self.inner.list(prefix)
    }

    async fn list_with_delimiter(
        &self,
        prefix: Option<&ObjectPath>,
    ) -> object_store::Result<ListResult> {
        self.inner.list_with_delimiter(prefix).await
    }

    async fn copy(&self, from: &ObjectPath, to: &ObjectPath) -> object_store::Result<()> {
        self.inner.copy(from, to).await
    }

    async fn copy_if_not_exists(
        &self,
        from: &ObjectPath,
        to: &ObjectPath,
    ) -> object_store::Result<()> {
        self.inner.copy_if_not_exists(from, to).await
    }
}

/// Index builder wrapper recording how many generations overlap
pub(crate) struct ConcurrencyTracker<B> {
    inner: B,
    active: AtomicUsize,
    max_active: AtomicUsize,
    runs: AtomicUsize,
}

impl<B> ConcurrencyTracker<B> {
    pub(crate) fn new(inner: B) -> Self {
        Self {
            inner,
            active: AtomicUsize::new(0),
            max_active: AtomicUsize::new(0),
            runs: AtomicUsize::new(0),
        }
    }

    pub(crate) fn max_active(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }

    pub(crate) fn runs(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl<B: IndexBuilder> IndexBuilder for ConcurrencyTracker<B> {
    async fn generate_index(&self, base_url: &str, dir: &Path) -> Result<()> {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now, Ordering::SeqCst);
        // widen the window so overlapping runs would be observed
        tokio::time::sleep(Duration::from_millis(20)).await;
        let result = self.inner.generate_index(base_url, dir).await;
        self.active.fetch_sub(1, Ordering::SeqCst);
        self.runs.fetch_add(1, Ordering::SeqCst);
        result
    }

    async fn read_index(&self, dir: &Path) -> Result<Bytes> {
        self.inner.read_index(dir).await
    }
}
