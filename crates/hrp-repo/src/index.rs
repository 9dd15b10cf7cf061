//! Repository index types
//!
//! Helm-compatible `index.yaml` model. The native index builder produces it;
//! everything else only ever treats the index as opaque bytes, apart from
//! inspecting which archives a published index references.

use chrono::{DateTime, Utc};
use hrp_core::{ChartMetadata, parse_version};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::error::{RepoError, Result};

/// Repository index (Helm-compatible)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepositoryIndex {
    /// API version
    #[serde(default = "default_api_version")]
    pub api_version: String,

    /// Charts indexed by name, newest version first
    #[serde(default)]
    pub entries: BTreeMap<String, Vec<ChartEntry>>,

    /// When this index was generated
    #[serde(default = "Utc::now")]
    pub generated: DateTime<Utc>,
}

fn default_api_version() -> String {
    "v1".to_string()
}

impl Default for RepositoryIndex {
    fn default() -> Self {
        Self {
            api_version: default_api_version(),
            entries: BTreeMap::new(),
            generated: Utc::now(),
        }
    }
}

impl RepositoryIndex {
    /// Parse index from YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(|e| RepoError::Serialization(e.to_string()))
    }

    /// Parse index from bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let yaml = std::str::from_utf8(bytes)
            .map_err(|e| RepoError::Serialization(format!("Invalid UTF-8: {}", e)))?;
        Self::from_yaml(yaml)
    }

    /// Serialize to YAML
    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Get all versions of a chart
    pub fn get(&self, name: &str) -> Option<&Vec<ChartEntry>> {
        self.entries.get(name)
    }

    /// Get a specific version of a chart
    pub fn get_version(&self, name: &str, version: &str) -> Option<&ChartEntry> {
        self.entries
            .get(name)?
            .iter()
            .find(|e| e.metadata.version == version)
    }

    /// Get the latest (highest semver) version of a chart
    pub fn get_latest(&self, name: &str) -> Option<&ChartEntry> {
        self.entries
            .get(name)
            .and_then(|versions| versions.iter().max_by(|a, b| compare_versions(a, b)))
    }

    /// Add an entry to the index
    pub fn add_entry(&mut self, entry: ChartEntry) {
        self.entries
            .entry(entry.metadata.name.clone())
            .or_default()
            .push(entry);
    }

    /// Order every chart's versions newest first, as Helm does
    pub fn sort_entries(&mut self) {
        for versions in self.entries.values_mut() {
            versions.sort_by(|a, b| compare_versions(b, a));
        }
    }

    /// Total number of chart versions
    pub fn len(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether any entry's download URL ends with the given archive filename
    pub fn references(&self, filename: &str) -> bool {
        self.entries.values().flatten().any(|entry| {
            entry
                .urls
                .iter()
                .any(|url| url.rsplit('/').next() == Some(filename))
        })
    }
}

/// Semver ordering, falling back to string comparison for unparseable versions
fn compare_versions(a: &ChartEntry, b: &ChartEntry) -> Ordering {
    match (a.metadata.parsed_version(), b.metadata.parsed_version()) {
        (Some(va), Some(vb)) => va.cmp(&vb),
        (Some(_), None) => Ordering::Greater,
        (None, Some(_)) => Ordering::Less,
        (None, None) => a.metadata.version.cmp(&b.metadata.version),
    }
}

/// Chart version entry in the index
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartEntry {
    /// Chart.yaml contents
    #[serde(flatten)]
    pub metadata: ChartMetadata,

    /// URLs to download the chart archive
    #[serde(default)]
    pub urls: Vec<String>,

    /// Creation timestamp
    #[serde(default)]
    pub created: Option<DateTime<Utc>>,

    /// SHA256 digest of the archive
    #[serde(default)]
    pub digest: Option<String>,
}

impl ChartEntry {
    /// Build an entry for an archive served at `base_url/filename`
    pub fn new(metadata: ChartMetadata, base_url: &str, filename: &str, digest: String) -> Self {
        Self {
            metadata,
            urls: vec![chart_url(base_url, filename)],
            created: Some(Utc::now()),
            digest: Some(digest),
        }
    }

    /// Get the primary download URL
    pub fn download_url(&self) -> Option<&str> {
        self.urls.first().map(|s| s.as_str())
    }

    /// Parse version as semver
    pub fn parsed_version(&self) -> Option<semver::Version> {
        parse_version(&self.metadata.version)
    }
}

/// Join a base URL and a relative archive path; an empty base yields a relative URL
pub fn chart_url(base_url: &str, filename: &str) -> String {
    let base = base_url.trim_end_matches('/');
    if base.is_empty() {
        filename.to_string()
    } else {
        format!("{}/{}", base, filename)
    }
}
