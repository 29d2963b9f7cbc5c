//! CLI entrypoint: parse configuration, build the bucket client and the
//! cache/directory components, and mount the filesystem.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Error};
use clap::Parser;
use fuser::MountOption;
use log::info;

use bucketfs::bucket::{CachedBucket, HttpBucketClient};
use bucketfs::buildcfg::DEFAULT_CONFIG_FILENAME;
use bucketfs::cache::{EvictionWorker, OpenFileTable};
use bucketfs::config::{Config, ConfigOverrides};
use bucketfs::filesystem::FilesystemFacade;

/// The base URL bucketfs talks to for its generic list/range-GET bucket
/// protocol (see `bucket::http`). Not exposed as a CLI flag: a mount talks
/// to one bucket endpoint for its whole lifetime, so it is fixed here
/// rather than flag-controlled.
const DEFAULT_BUCKET_BASE_URL: &str = "https://api.example-bucket-storage.invalid";

#[derive(Debug, Parser)]
#[command(name = "bucketfs", version, about = "Mount a remote object-storage bucket as a read-only FUSE filesystem")]
struct Cli {
    /// Directory to mount the bucket onto.
    mountpoint: PathBuf,

    #[arg(long = "account_id")]
    account_id: Option<String>,

    #[arg(long = "application_key")]
    application_key: Option<String>,

    #[arg(long = "bucket_id")]
    bucket_id: Option<String>,

    #[arg(long = "config_filename", default_value = DEFAULT_CONFIG_FILENAME)]
    config_filename: PathBuf,

    #[arg(long = "cache_timeout")]
    cache_timeout: Option<u64>,

    /// Let other users access the mount (passed through to the kernel as
    /// the `allow_other` mount option).
    #[arg(long = "allow_other", default_value_t = false)]
    allow_other: bool,

    #[arg(long = "debug", default_value_t = false)]
    debug: bool,
}

fn init_logging(debug: bool) {
    let default_filter = if debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter)).init();
}

fn main() -> Result<(), Error> {
    let cli = Cli::parse();
    init_logging(cli.debug);

    let config = Config::load(&cli.config_filename)
        .with_context(|| format!("loading config file {:?}", cli.config_filename))?;

    let resolved = config.merge_overrides(ConfigOverrides {
        account_id: cli.account_id,
        application_key: cli.application_key,
        bucket_id: cli.bucket_id,
        cache_timeout: cli.cache_timeout,
    })?;

    info!(
        "mounting bucket '{}' at {:?} (cache_timeout={}s)",
        resolved.bucket_id, cli.mountpoint, resolved.cache_timeout
    );

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("building the Tokio runtime")?;

    let client = HttpBucketClient::new(
        DEFAULT_BUCKET_BASE_URL.to_string(),
        resolved.bucket_id.clone(),
        resolved.account_id.clone(),
        resolved.application_key.clone(),
    )?;

    let bucket = Arc::new(CachedBucket::new(
        Arc::new(client),
        Duration::from_secs(resolved.cache_timeout),
    ));
    let open_files = Arc::new(OpenFileTable::new());

    let handle = runtime.handle().clone();
    let eviction_worker = runtime.block_on(async { EvictionWorker::spawn(open_files.clone()) });

    let filesystem = FilesystemFacade::new(bucket, open_files, handle, eviction_worker);

    let mut options = vec![MountOption::RO, MountOption::FSName("bucketfs".to_string())];
    if cli.allow_other {
        options.push(MountOption::AllowOther);
    }

    fuser::mount2(filesystem, &cli.mountpoint, &options).context("fuse mount failed")?;

    info!("unmounted cleanly");
    Ok(())
}
