//! Object store mirroring
//!
//! Reindexing needs the remote prefix as a local directory. A sync client
//! makes `target` an exact, deletion-aware copy of the remote prefix: new
//! and changed objects are downloaded, files with no remote counterpart are
//! removed.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use object_store::ObjectStore;
use object_store::path::Path as ObjectPath;
use std::collections::HashSet;
use std::ffi::OsString;
use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use walkdir::WalkDir;

use crate::error::{RepoError, Result};
use crate::process::run_tool;

/// A bucket prefix in the remote store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteLocation {
    pub bucket: String,
    /// Prefix without surrounding slashes; empty is the bucket root
    pub prefix: String,
}

impl RemoteLocation {
    pub fn new(bucket: impl Into<String>, prefix: impl AsRef<str>) -> Self {
        Self {
            bucket: bucket.into(),
            prefix: prefix.as_ref().trim_matches('/').to_string(),
        }
    }

    /// `s3://bucket/prefix` form understood by the AWS CLI
    pub fn uri(&self) -> String {
        if self.prefix.is_empty() {
            format!("s3://{}", self.bucket)
        } else {
            format!("s3://{}/{}", self.bucket, self.prefix)
        }
    }

    /// Object key of `name` under the prefix
    pub fn key(&self, name: &str) -> ObjectPath {
        if self.prefix.is_empty() {
            ObjectPath::from(name)
        } else {
            ObjectPath::from(format!("{}/{}", self.prefix, name))
        }
    }

    pub fn prefix_path(&self) -> ObjectPath {
        ObjectPath::from(self.prefix.as_str())
    }
}

impl fmt::Display for RemoteLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.uri())
    }
}

/// One-way mirror of a remote prefix into a local directory
#[async_trait]
pub trait ObjectSync: Send + Sync {
    async fn sync(&self, source: &RemoteLocation, target: &Path) -> Result<()>;
}

/// Mirrors with `aws s3 sync --delete`
#[derive(Debug, Clone, Default)]
pub struct AwsCliSync {
    debug: bool,
}

impl AwsCliSync {
    pub fn new(debug: bool) -> Self {
        Self { debug }
    }

    /// `aws s3 sync --delete s3://<bucket>/<prefix> <target>`
    fn args(source: &RemoteLocation, target: &Path) -> Vec<OsString> {
        vec![
            "s3".into(),
            "sync".into(),
            "--delete".into(),
            source.uri().into(),
            target.as_os_str().to_owned(),
        ]
    }
}

#[async_trait]
impl ObjectSync for AwsCliSync {
    async fn sync(&self, source: &RemoteLocation, target: &Path) -> Result<()> {
        run_tool("aws", Self::args(source, target), self.debug).await.inspect_err(|_| {
            tracing::error!(source = %source, target = %target.display(), "failed s3 sync");
        })
    }
}

/// Mirrors through the object store API
///
/// Objects are skipped when the local copy has the same size and is not
/// older than the remote object, matching the AWS CLI's change detection.
#[derive(Clone)]
pub struct StoreMirror {
    store: Arc<dyn ObjectStore>,
}

impl StoreMirror {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    async fn download(&self, key: &ObjectPath, local: &Path) -> Result<()> {
        let data = self
            .store
            .get(key)
            .await
            .map_err(|e| remote_error(e, "get", key))?
            .bytes()
            .await
            .map_err(|e| remote_error(e, "read", key))?;

        if let Some(parent) = local.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let temp = temp_path(local);
        tokio::fs::write(&temp, &data).await?;
        if let Err(e) = tokio::fs::rename(&temp, local).await {
            let _ = tokio::fs::remove_file(&temp).await;
            return Err(e.into());
        }
        Ok(())
    }
}

#[async_trait]
impl ObjectSync for StoreMirror {
    async fn sync(&self, source: &RemoteLocation, target: &Path) -> Result<()> {
        tokio::fs::create_dir_all(target).await?;

        let prefix = source.prefix_path();
        let listing: Vec<_> = self
            .store
            .list(Some(&prefix))
            .try_collect()
            .await
            .map_err(|e| remote_error(e, "list", &prefix))?;

        let mut wanted = HashSet::new();
        let mut downloaded = 0usize;

        for meta in listing {
            let Some(relative) = relative_key(&prefix, &meta.location) else {
                tracing::warn!(key = %meta.location, "skipping object with unusable key");
                continue;
            };
            let local = target.join(&relative);

            if !is_current(&local, meta.size, meta.last_modified).await {
                self.download(&meta.location, &local).await?;
                downloaded += 1;
            }
            wanted.insert(relative);
        }

        let objects = wanted.len();
        let root = target.to_path_buf();
        let removed = tokio::task::spawn_blocking(move || remove_extraneous(&root, &wanted))
            .await
            .map_err(|e| RepoError::Io(std::io::Error::other(e)))??;

        tracing::debug!(
            source = %source,
            target = %target.display(),
            objects,
            downloaded,
            removed,
            "mirrored remote prefix"
        );
        Ok(())
    }
}

fn remote_error(source: object_store::Error, operation: &'static str, key: &ObjectPath) -> RepoError {
    RepoError::remote(source, operation, key.as_ref())
}

/// Key relative to the prefix as a safe local path
fn relative_key(prefix: &ObjectPath, key: &ObjectPath) -> Option<PathBuf> {
    let parts: Vec<String> = match key.prefix_match(prefix) {
        Some(parts) => parts.map(|p| p.as_ref().to_string()).collect(),
        None => return None,
    };
    if parts.is_empty() {
        return None;
    }

    let relative: PathBuf = parts.iter().collect();
    let safe = relative
        .components()
        .all(|c| matches!(c, Component::Normal(_)));
    safe.then_some(relative)
}

async fn is_current(local: &Path, size: u64, remote_modified: DateTime<Utc>) -> bool {
    let Ok(meta) = tokio::fs::metadata(local).await else {
        return false;
    };
    if !meta.is_file() || meta.len() != size {
        return false;
    }
    match meta.modified() {
        Ok(modified) => DateTime::<Utc>::from(modified) >= remote_modified,
        Err(_) => false,
    }
}

/// Delete local files that no longer exist remotely
fn remove_extraneous(target: &Path, wanted: &HashSet<PathBuf>) -> Result<usize> {
    let mut removed = 0;
    for entry in WalkDir::new(target).min_depth(1) {
        let entry = entry.map_err(|e| {
            RepoError::Io(std::io::Error::other(format!(
                "walking {}: {}",
                target.display(),
                e
            )))
        })?;
        if entry.file_type().is_dir() {
            continue;
        }
        let relative = entry.path().strip_prefix(target).unwrap_or(entry.path());
        if !wanted.contains(relative) {
            std::fs::remove_file(entry.path())?;
            removed += 1;
        }
    }
    Ok(removed)
}

fn temp_path(local: &Path) -> PathBuf {
    let mut name = OsString::from(".");
    name.push(local.file_name().unwrap_or_default());
    name.push(".part");
    local.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use object_store::PutPayload;
    use object_store::memory::InMemory;
    use tempfile::TempDir;

    async fn put(store: &InMemory, key: &str, data: &'static [u8]) {
        store
            .put(&ObjectPath::from(key), PutPayload::from_static(data))
            .await
            .unwrap();
    }

    #[test]
    fn test_location_uri_and_keys() {
        let loc = RemoteLocation::new("b", "/charts/");
        assert_eq!(loc.uri(), "s3://b/charts");
        assert_eq!(loc.key("app.tgz").as_ref(), "charts/app.tgz");

        let root = RemoteLocation::new("b", "");
        assert_eq!(root.uri(), "s3://b");
        assert_eq!(root.key("index.yaml").as_ref(), "index.yaml");
    }

    #[test]
    fn test_aws_command_line() {
        let args = AwsCliSync::args(&RemoteLocation::new("b", "charts/"), Path::new("/tmp/hrp"));
        assert_eq!(
            args,
            ["s3", "sync", "--delete", "s3://b/charts", "/tmp/hrp"]
                .map(OsString::from)
                .to_vec()
        );
    }

    #[tokio::test]
    async fn test_mirror_downloads_prefix_only() {
        let store = Arc::new(InMemory::new());
        put(&store, "charts/a-1.0.0.tgz", b"a").await;
        put(&store, "charts/nested/b-1.0.0.tgz", b"bb").await;
        put(&store, "other/c-1.0.0.tgz", b"c").await;

        let temp = TempDir::new().unwrap();
        let mirror = StoreMirror::new(store.clone());
        mirror
            .sync(&RemoteLocation::new("b", "charts"), temp.path())
            .await
            .unwrap();

        assert_eq!(std::fs::read(temp.path().join("a-1.0.0.tgz")).unwrap(), b"a");
        assert_eq!(
            std::fs::read(temp.path().join("nested").join("b-1.0.0.tgz")).unwrap(),
            b"bb"
        );
        assert!(!temp.path().join("c-1.0.0.tgz").exists());
    }

    #[tokio::test]
    async fn test_mirror_deletes_extraneous_files() {
        let store = Arc::new(InMemory::new());
        put(&store, "charts/keep.tgz", b"keep").await;

        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("stale.tgz"), b"stale").unwrap();
        std::fs::write(temp.path().join("index.yaml"), b"old").unwrap();

        StoreMirror::new(store.clone())
            .sync(&RemoteLocation::new("b", "charts"), temp.path())
            .await
            .unwrap();

        assert!(temp.path().join("keep.tgz").exists());
        assert!(!temp.path().join("stale.tgz").exists());
        assert!(!temp.path().join("index.yaml").exists());
    }

    #[tokio::test]
    async fn test_mirror_replaces_changed_objects() {
        let store = Arc::new(InMemory::new());
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("app.tgz"), b"old contents").unwrap();

        // remote object is newer than the local file
        put(&store, "charts/app.tgz", b"new").await;
        StoreMirror::new(store.clone())
            .sync(&RemoteLocation::new("b", "charts"), temp.path())
            .await
            .unwrap();

        assert_eq!(std::fs::read(temp.path().join("app.tgz")).unwrap(), b"new");
    }

    #[tokio::test]
    async fn test_mirror_empty_prefix_creates_target() {
        let store = Arc::new(InMemory::new());
        let temp = TempDir::new().unwrap();
        let target = temp.path().join("scratch");

        StoreMirror::new(store)
            .sync(&RemoteLocation::new("b", "charts"), &target)
            .await
            .unwrap();

        assert!(target.is_dir());
        assert_eq!(std::fs::read_dir(&target).unwrap().count(), 0);
    }
}
