//! hrp - Helm chart repository proxy

use clap::{Parser, ValueEnum};
use std::net::SocketAddr;
use std::path::PathBuf;

mod config;
mod error;
mod exit_codes;
mod handlers;
mod logging;
mod server;

use logging::LogFormat;

#[derive(Parser, Debug)]
#[command(name = "hrp")]
#[command(version)]
#[command(about = "Helm chart repository proxy backed by S3 or a local directory", long_about = None)]
pub(crate) struct Cli {
    /// Storage backend
    #[arg(long, env = "HRP_BACKEND", value_parser = ["s3", "filesystem"])]
    backend: Option<String>,

    /// Base URL written into every index entry
    #[arg(long, env = "HRP_BASE_URL")]
    base_url: Option<String>,

    /// Verbose logging, request tracing and external tool output
    #[arg(long, env = "HRP_DEBUG")]
    debug: bool,

    /// Bucket holding the charts
    #[arg(long, env = "HRP_S3_BUCKET")]
    s3_bucket: Option<String>,

    /// Key prefix charts are stored under [default: charts/]
    #[arg(long, env = "HRP_S3_PREFIX")]
    s3_prefix: Option<String>,

    #[arg(long, env = "HRP_S3_REGION")]
    s3_region: Option<String>,

    /// Endpoint of an S3-compatible store
    #[arg(long, env = "HRP_S3_ENDPOINT")]
    s3_endpoint: Option<String>,

    /// Scratch directory the bucket prefix is mirrored into [default: /tmp/hrp]
    #[arg(long, env = "HRP_S3_LOCAL_SYNC_PATH")]
    s3_local_sync_path: Option<PathBuf>,

    /// Repository root for the filesystem backend
    #[arg(long, env = "HRP_FS_PATH")]
    fs_path: Option<PathBuf>,

    /// Address to listen on
    #[arg(long, env = "HRP_LISTEN", default_value = "0.0.0.0:1323")]
    listen: SocketAddr,

    /// How the bucket prefix is mirrored before reindexing
    #[arg(long, env = "HRP_SYNC", value_enum)]
    sync: Option<SyncArg>,

    /// How index.yaml is generated
    #[arg(long, env = "HRP_INDEXER", value_enum)]
    indexer: Option<IndexerArg>,

    /// Largest accepted upload body in bytes
    #[arg(long, env = "HRP_MAX_UPLOAD_BYTES", default_value_t = server::DEFAULT_MAX_UPLOAD_BYTES)]
    max_upload_bytes: usize,

    /// Log output format [default: LOG_FORMAT or human]
    #[arg(long, env = "HRP_LOG_FORMAT", value_enum)]
    log_format: Option<LogFormat>,

    /// YAML config file; flags and environment override its values
    #[arg(short, long, env = "HRP_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum SyncArg {
    /// `aws s3 sync --delete`
    AwsCli,
    /// Built-in object store mirror
    Native,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum IndexerArg {
    /// `helm repo index`
    Helm,
    /// Built-in index builder
    Native,
}

fn main() {
    miette::set_panic_hook();

    let cli = Cli::parse();

    if let Err(err) = run(cli) {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}

fn run(cli: Cli) -> error::Result<()> {
    let config = config::resolve(&cli)?;
    logging::init(LogFormat::resolve(cli.log_format), config.debug);

    let settings = server::ServerSettings {
        listen: cli.listen,
        max_upload_bytes: cli.max_upload_bytes,
        trace_requests: config.debug,
    };

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| error::CliError::internal(format!("failed to start runtime: {}", e)))?;

    runtime.block_on(async {
        let backend = hrp_repo::open_backend(&config).await?;
        server::serve(backend, settings).await
    })
}
