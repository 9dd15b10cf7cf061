//! Merge of config file, environment and flags into an [`AppConfig`]

use hrp_repo::{AppConfig, IndexerKind, SyncMode};

use crate::error::{CliError, Result};
use crate::{Cli, IndexerArg, SyncArg};

/// Build the effective configuration
///
/// Values set on the command line (or through their `HRP_*` variables)
/// replace the ones from `--config`. The backend and base URL must end up
/// set one way or the other.
pub fn resolve(cli: &Cli) -> Result<AppConfig> {
    let mut config = match &cli.config {
        Some(path) => AppConfig::load_from(path).map_err(|e| CliError::Usage {
            message: format!("failed to load config file {}: {}", path.display(), e),
            help: None,
        })?,
        None => AppConfig::default(),
    };

    if let Some(backend) = &cli.backend {
        config.backend = backend.clone();
    }
    if let Some(base_url) = &cli.base_url {
        config.base_url = base_url.clone();
    }
    config.debug |= cli.debug;

    if let Some(bucket) = &cli.s3_bucket {
        config.s3.bucket = bucket.clone();
    }
    if let Some(prefix) = &cli.s3_prefix {
        config.s3.prefix = prefix.clone();
    }
    if let Some(region) = &cli.s3_region {
        config.s3.region = region.clone();
    }
    if let Some(endpoint) = &cli.s3_endpoint {
        config.s3.endpoint = Some(endpoint.clone());
    }
    if let Some(path) = &cli.s3_local_sync_path {
        config.s3.local_sync_path = path.clone();
    }
    if let Some(path) = &cli.fs_path {
        config.filesystem.path = path.clone();
    }

    if let Some(sync) = cli.sync {
        config.sync = match sync {
            SyncArg::AwsCli => SyncMode::AwsCli,
            SyncArg::Native => SyncMode::Native,
        };
    }
    if let Some(indexer) = cli.indexer {
        config.indexer = match indexer {
            IndexerArg::Helm => IndexerKind::Helm,
            IndexerArg::Native => IndexerKind::Native,
        };
    }

    if config.backend.trim().is_empty() {
        return Err(CliError::usage(
            "no storage backend selected",
            "pass --backend s3|filesystem or set HRP_BACKEND",
        ));
    }
    if config.base_url.trim().is_empty() {
        return Err(CliError::usage(
            "no base URL configured",
            "pass --base-url or set HRP_BASE_URL",
        ));
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::path::PathBuf;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("hrp").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_flags_only() {
        let cli = parse(&[
            "--backend",
            "s3",
            "--base-url",
            "https://charts.example.com",
            "--s3-bucket",
            "b",
            "--s3-prefix",
            "charts",
            "--s3-region",
            "us-east-1",
            "--sync",
            "native",
            "--indexer",
            "native",
        ]);
        let config = resolve(&cli).unwrap();

        assert_eq!(config.backend, "s3");
        assert_eq!(config.s3.bucket, "b");
        assert_eq!(config.s3.prefix, "charts");
        assert_eq!(config.s3.local_sync_path, PathBuf::from("/tmp/hrp"));
        assert_eq!(config.sync, SyncMode::Native);
        assert_eq!(config.indexer, IndexerKind::Native);
        assert!(!config.debug);
    }

    #[test]
    fn test_flags_override_file() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("hrp.yaml");
        std::fs::write(
            &path,
            "backend: s3\nbaseUrl: https://old.example.com\ns3:\n  bucket: file-bucket\n  region: eu-west-1\n",
        )
        .unwrap();

        let cli = parse(&[
            "--config",
            path.to_str().unwrap(),
            "--base-url",
            "https://new.example.com",
            "--debug",
        ]);
        let config = resolve(&cli).unwrap();

        assert_eq!(config.base_url, "https://new.example.com");
        assert_eq!(config.s3.bucket, "file-bucket");
        assert_eq!(config.s3.region, "eu-west-1");
        assert!(config.debug);
    }

    #[test]
    fn test_backend_required() {
        let cli = parse(&["--base-url", "http://localhost:1323"]);
        let err = resolve(&cli).unwrap_err();
        assert_eq!(err.exit_code(), crate::exit_codes::USAGE_ERROR);
        assert!(err.to_string().contains("backend"));
    }

    #[test]
    fn test_base_url_required() {
        let cli = parse(&["--backend", "filesystem", "--fs-path", "/srv/charts"]);
        let err = resolve(&cli).unwrap_err();
        assert!(err.to_string().contains("base URL"));
    }

    #[test]
    fn test_unknown_backend_rejected_by_parser() {
        let result = Cli::try_parse_from(["hrp", "--backend", "gcs", "--base-url", "x"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_missing_config_file() {
        let cli = parse(&["--config", "/nonexistent/hrp.yaml"]);
        let err = resolve(&cli).unwrap_err();
        assert!(err.to_string().contains("failed to load config file"));
    }
}
