//! Exports configuration data from the build system

/// Default name of the YAML configuration file, relative to the current
/// directory unless overridden by `--config-filename`.
pub const DEFAULT_CONFIG_FILENAME: &str = "config.yaml";

/// Default listing cache TTL, in seconds, when `cacheTimeout` is not set.
pub const DEFAULT_CACHE_TIMEOUT: u64 = 120;

/// User agent sent with outgoing bucket HTTP requests.
pub const USER_AGENT: &str = concat!("bucketfs/", env!("CARGO_PKG_VERSION"));
