//! Index generation
//!
//! An index builder turns a directory of chart archives into an
//! `index.yaml` inside that same directory. The builder is stateless: it
//! only ever sees a directory snapshot, which is why reindexing is always a
//! full rebuild.

use async_trait::async_trait;
use bytes::Bytes;
use hrp_core::{INDEX_FILENAME, archive};
use std::collections::HashMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::error::{RepoError, Result};
use crate::index::{ChartEntry, RepositoryIndex};
use crate::process::run_tool;

/// Builds and reads the index document for a local chart directory
#[async_trait]
pub trait IndexBuilder: Send + Sync {
    /// (Re)generate `index.yaml` in `dir`, pointing chart URLs at `base_url`
    async fn generate_index(&self, base_url: &str, dir: &Path) -> Result<()>;

    /// Read the generated index fully into memory
    async fn read_index(&self, dir: &Path) -> Result<Bytes> {
        let path = dir.join(INDEX_FILENAME);
        match tokio::fs::read(&path).await {
            Ok(data) => Ok(Bytes::from(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(RepoError::IndexNotFound {
                location: path.display().to_string(),
            }),
            Err(e) => {
                tracing::error!(path = %path.display(), error = %e, "failed to read index file");
                Err(e.into())
            }
        }
    }
}

/// Generates the index with `helm repo index`
#[derive(Debug, Clone, Default)]
pub struct HelmIndexBuilder {
    debug: bool,
}

impl HelmIndexBuilder {
    pub fn new(debug: bool) -> Self {
        Self { debug }
    }

    /// `helm repo index --url=<base_url> <dir>`
    fn args(base_url: &str, dir: &Path) -> Vec<OsString> {
        vec![
            "repo".into(),
            "index".into(),
            format!("--url={}", base_url).into(),
            dir.as_os_str().to_owned(),
        ]
    }
}

#[async_trait]
impl IndexBuilder for HelmIndexBuilder {
    async fn generate_index(&self, base_url: &str, dir: &Path) -> Result<()> {
        run_tool("helm", Self::args(base_url, dir), self.debug).await
    }
}

/// Generates a Helm-compatible index in-process
///
/// Archives that cannot be read are skipped with a warning, so one corrupt
/// upload does not block indexing of the rest of the repository. Creation
/// timestamps of unchanged archives are carried over from the previous
/// index, keeping repeated rebuilds stable.
#[derive(Debug, Clone, Default)]
pub struct NativeIndexBuilder;

impl NativeIndexBuilder {
    pub fn new() -> Self {
        Self
    }

    fn build(base_url: &str, dir: &Path) -> Result<RepositoryIndex> {
        let previous = Self::previous_timestamps(dir);
        let mut index = RepositoryIndex::default();

        for entry in WalkDir::new(dir).follow_links(false).sort_by_file_name() {
            let entry = entry.map_err(|e| {
                RepoError::Io(std::io::Error::other(format!(
                    "walking {}: {}",
                    dir.display(),
                    e
                )))
            })?;
            let path = entry.path();
            if !entry.file_type().is_file() || !archive::is_chart_archive(path) {
                continue;
            }

            let relative = relative_url_path(dir, path);
            let data = std::fs::read(path)?;
            let metadata = match archive::read_chart_metadata(&data) {
                Ok(metadata) => metadata,
                Err(e) => {
                    tracing::warn!(chart = %relative, error = %e, "skipping unreadable chart archive");
                    continue;
                }
            };

            let digest = archive::digest(&data);
            let mut chart = ChartEntry::new(metadata, base_url, &relative, digest);
            if let Some(created) = chart.digest.as_ref().and_then(|d| previous.get(d)) {
                chart.created = Some(*created);
            }
            index.add_entry(chart);
        }

        index.sort_entries();
        Ok(index)
    }

    /// Creation timestamps of the existing index, keyed by digest
    fn previous_timestamps(dir: &Path) -> HashMap<String, chrono::DateTime<chrono::Utc>> {
        let Ok(data) = std::fs::read(dir.join(INDEX_FILENAME)) else {
            return HashMap::new();
        };
        let Ok(index) = RepositoryIndex::from_bytes(&data) else {
            return HashMap::new();
        };

        index
            .entries
            .into_values()
            .flatten()
            .filter_map(|e| Some((e.digest?, e.created?)))
            .collect()
    }

    /// Write `index.yaml` via a temp file and rename so readers never see a partial file
    fn write_atomic(dir: &Path, content: &str) -> Result<PathBuf> {
        let target = dir.join(INDEX_FILENAME);
        let temp = dir.join(format!(".{}.{}.tmp", INDEX_FILENAME, std::process::id()));
        std::fs::write(&temp, content)?;
        if let Err(e) = std::fs::rename(&temp, &target) {
            let _ = std::fs::remove_file(&temp);
            return Err(e.into());
        }
        Ok(target)
    }
}

#[async_trait]
impl IndexBuilder for NativeIndexBuilder {
    async fn generate_index(&self, base_url: &str, dir: &Path) -> Result<()> {
        let base_url = base_url.to_string();
        let dir = dir.to_path_buf();

        tokio::task::spawn_blocking(move || {
            let index = Self::build(&base_url, &dir)?;
            let path = Self::write_atomic(&dir, &index.to_yaml()?)?;
            tracing::debug!(path = %path.display(), charts = index.len(), "wrote index");
            Ok(())
        })
        .await
        .map_err(|e| RepoError::Io(std::io::Error::other(e)))?
    }
}

/// Archive path relative to the index directory, with `/` separators
fn relative_url_path(dir: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(dir).unwrap_or(path);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
