//! Backend configuration
//!
//! Configuration is assembled by the binary from flags, environment and an
//! optional YAML file, then handed to the backend factory. Required fields
//! are checked here so that construction fails before any network activity.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::{RepoError, Result};

/// Application-wide configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AppConfig {
    /// Storage backend name (`s3` or `filesystem`)
    pub backend: String,

    /// Base URL charts are served from; written into every index entry
    pub base_url: String,

    /// Verbose logging and external tool output
    pub debug: bool,

    /// How the object store prefix is mirrored locally
    pub sync: SyncMode,

    /// How `index.yaml` is generated
    pub indexer: IndexerKind,

    pub s3: S3Config,

    pub filesystem: FilesystemConfig,
}

impl AppConfig {
    /// Load configuration from a YAML file
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Resolve the configured backend kind
    pub fn backend_kind(&self) -> Result<BackendKind> {
        self.backend.parse()
    }
}

/// Object store (S3) backend settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct S3Config {
    pub bucket: String,

    /// Key prefix charts are stored under
    pub prefix: String,

    pub region: String,

    /// Custom endpoint for S3-compatible stores (MinIO, R2, ...)
    pub endpoint: Option<String>,

    /// Scratch directory the prefix is mirrored into when reindexing
    pub local_sync_path: PathBuf,
}

impl Default for S3Config {
    fn default() -> Self {
        Self {
            bucket: String::new(),
            prefix: "charts/".to_string(),
            region: String::new(),
            endpoint: None,
            local_sync_path: PathBuf::from("/tmp/hrp"),
        }
    }
}

impl S3Config {
    /// Check required fields, naming the first one missing
    pub fn validate(&self) -> Result<()> {
        if self.region.trim().is_empty() {
            return Err(RepoError::missing("s3", "region"));
        }
        if self.bucket.trim().is_empty() {
            return Err(RepoError::missing("s3", "bucket"));
        }
        if self.local_sync_path.as_os_str().is_empty() {
            return Err(RepoError::missing("s3", "local sync path"));
        }
        Ok(())
    }

    /// Prefix without surrounding slashes; empty means the bucket root
    pub fn normalized_prefix(&self) -> String {
        self.prefix.trim_matches('/').to_string()
    }
}

/// Filesystem backend settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FilesystemConfig {
    /// Repository root; charts and `index.yaml` live directly inside it
    pub path: PathBuf,
}

impl FilesystemConfig {
    pub fn validate(&self) -> Result<()> {
        if self.path.as_os_str().is_empty() {
            return Err(RepoError::missing("filesystem", "path"));
        }
        Ok(())
    }
}

/// Storage backend variants
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    S3,
    Filesystem,
}

impl FromStr for BackendKind {
    type Err = RepoError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "s3" => Ok(BackendKind::S3),
            "filesystem" | "fs" => Ok(BackendKind::Filesystem),
            other => Err(RepoError::UnknownBackend {
                name: other.to_string(),
            }),
        }
    }
}

/// Object store mirroring strategy
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SyncMode {
    /// Shell out to `aws s3 sync --delete`
    #[default]
    AwsCli,
    /// Mirror through the object store client
    Native,
}

/// Index generation strategy
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IndexerKind {
    /// Shell out to `helm repo index`
    #[default]
    Helm,
    /// Build the index in-process from the chart archives
    Native,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s3_config() -> S3Config {
        S3Config {
            bucket: "bucket-test".to_string(),
            prefix: "prefix".to_string(),
            region: "us-east-1".to_string(),
            endpoint: None,
            local_sync_path: PathBuf::from("/tmp/hrp"),
        }
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.s3.prefix, "charts/");
        assert_eq!(config.s3.local_sync_path, PathBuf::from("/tmp/hrp"));
        assert_eq!(config.sync, SyncMode::AwsCli);
        assert_eq!(config.indexer, IndexerKind::Helm);
    }

    #[test]
    fn test_s3_validate() {
        assert!(s3_config().validate().is_ok());

        let mut missing_bucket = s3_config();
        missing_bucket.bucket.clear();
        let err = missing_bucket.validate().unwrap_err();
        assert!(err.to_string().contains("bucket missing"));

        let mut missing_region = s3_config();
        missing_region.region.clear();
        let err = missing_region.validate().unwrap_err();
        assert!(err.to_string().contains("region missing"));

        let mut missing_path = s3_config();
        missing_path.local_sync_path = PathBuf::new();
        let err = missing_path.validate().unwrap_err();
        assert!(err.to_string().contains("local sync path missing"));
    }

    #[test]
    fn test_filesystem_validate() {
        let err = FilesystemConfig::default().validate().unwrap_err();
        assert_eq!(err.to_string(), "invalid filesystem config: path missing");
    }

    #[test]
    fn test_normalized_prefix() {
        let mut config = s3_config();
        config.prefix = "/charts/stable/".to_string();
        assert_eq!(config.normalized_prefix(), "charts/stable");
        config.prefix = "/".to_string();
        assert_eq!(config.normalized_prefix(), "");
    }

    #[test]
    fn test_backend_kind() {
        assert_eq!("s3".parse::<BackendKind>().unwrap(), BackendKind::S3);
        assert_eq!(
            "filesystem".parse::<BackendKind>().unwrap(),
            BackendKind::Filesystem
        );
        let err = "".parse::<BackendKind>().unwrap_err();
        assert_eq!(err.to_string(), "unrecognized storage backend: ");
    }

    #[test]
    fn test_load_from_yaml() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("hrp.yaml");
        std::fs::write(
            &path,
            r#"
backend: s3
baseUrl: https://charts.example.com
sync: native
s3:
  bucket: my-bucket
  region: eu-west-1
"#,
        )
        .unwrap();

        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.backend_kind().unwrap(), BackendKind::S3);
        assert_eq!(config.base_url, "https://charts.example.com");
        assert_eq!(config.sync, SyncMode::Native);
        assert_eq!(config.s3.bucket, "my-bucket");
        // unspecified fields keep their defaults
        assert_eq!(config.s3.prefix, "charts/");
        assert!(config.s3.validate().is_ok());
    }
}
