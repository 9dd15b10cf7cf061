//! Chart storage for hrp
//!
//! This crate holds the storage side of the chart repository:
//!
//! - **Backends**: object store (S3 and compatible) and local filesystem,
//!   behind the [`ChartBackend`] trait
//! - **Reindexing**: mirror the stored charts locally, rebuild `index.yaml`,
//!   publish it back, one reindex at a time per backend
//! - **Index builders**: `helm repo index` or the in-process
//!   [`NativeIndexBuilder`]
//! - **Sync clients**: `aws s3 sync` or the in-process [`StoreMirror`]
//!
//! ## Example
//!
//! ```rust,no_run
//! use bytes::Bytes;
//! use hrp_repo::{AppConfig, open_backend};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut config = AppConfig::default();
//! config.backend = "filesystem".to_string();
//! config.base_url = "https://charts.example.com".to_string();
//! config.filesystem.path = "/srv/charts".into();
//!
//! let backend = open_backend(&config).await?;
//! backend.put_chart("app-1.0.0.tgz", Bytes::from(std::fs::read("app-1.0.0.tgz")?)).await?;
//! let index = backend.get_index().await?;
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod builder;
pub mod config;
pub mod error;
pub mod index;
mod process;
pub mod sync;

#[cfg(test)]
pub(crate) mod testing;

pub use backend::{ChartBackend, FilesystemBackend, ObjectStoreBackend, create_backend, open_backend};
pub use builder::{HelmIndexBuilder, IndexBuilder, NativeIndexBuilder};
pub use config::{AppConfig, BackendKind, FilesystemConfig, IndexerKind, S3Config, SyncMode};
pub use error::{RepoError, Result, error_chain};
pub use index::{ChartEntry, RepositoryIndex};
pub use sync::{AwsCliSync, ObjectSync, RemoteLocation, StoreMirror};
