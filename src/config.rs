//! Load and merge the bucket-mount configuration.
//!
//! Configuration is sourced from a YAML file and may be overridden by CLI
//! flags; CLI flags always win. There is a single, flat config struct here
//! rather than a directory of named sections: a bucket mount has exactly
//! one bucket to talk to, not a set of entities to manage.

use anyhow::{bail, format_err, Error};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::buildcfg::DEFAULT_CACHE_TIMEOUT;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub account_id: Option<String>,
    #[serde(default)]
    pub application_key: Option<String>,
    #[serde(default)]
    pub bucket_id: Option<String>,
    #[serde(default)]
    pub cache_timeout: Option<u64>,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, Error> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path)
            .map_err(|err| format_err!("unable to read config file {:?} - {}", path, err))?;

        serde_yaml::from_str(&raw)
            .map_err(|err| format_err!("unable to parse config file {:?} - {}", path, err))
    }

    /// Apply CLI overrides (`Some` always wins) and check required fields.
    pub fn merge_overrides(mut self, overrides: ConfigOverrides) -> Result<ResolvedConfig, Error> {
        if let Some(account_id) = overrides.account_id {
            self.account_id = Some(account_id);
        }
        if let Some(application_key) = overrides.application_key {
            self.application_key = Some(application_key);
        }
        if let Some(bucket_id) = overrides.bucket_id {
            self.bucket_id = Some(bucket_id);
        }
        if let Some(cache_timeout) = overrides.cache_timeout {
            self.cache_timeout = Some(cache_timeout);
        }

        let account_id = self.account_id.ok_or_else(|| format_err!("missing account_id"))?;
        let application_key = self
            .application_key
            .ok_or_else(|| format_err!("missing application_key"))?;
        let bucket_id = self.bucket_id.ok_or_else(|| format_err!("missing bucket_id"))?;
        let cache_timeout = self.cache_timeout.unwrap_or(DEFAULT_CACHE_TIMEOUT);

        if cache_timeout == 0 {
            bail!("cache_timeout must be greater than zero");
        }

        Ok(ResolvedConfig {
            account_id,
            application_key,
            bucket_id,
            cache_timeout,
        })
    }
}

/// CLI-supplied overrides; `None` means "use whatever the config file says".
#[derive(Debug, Default)]
pub struct ConfigOverrides {
    pub account_id: Option<String>,
    pub application_key: Option<String>,
    pub bucket_id: Option<String>,
    pub cache_timeout: Option<u64>,
}

/// Fully resolved configuration, ready to build a bucket client from.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub account_id: String,
    pub application_key: String,
    pub bucket_id: String,
    pub cache_timeout: u64,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn missing_file_yields_default() {
        let cfg = Config::load(Path::new("/nonexistent/config.yaml")).unwrap();
        assert!(cfg.account_id.is_none());
    }

    #[test]
    fn loads_from_an_actual_yaml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(
            &path,
            "account_id: file-account\napplication_key: file-key\nbucket_id: file-bucket\ncache_timeout: 90\n",
        )
        .unwrap();

        let cfg = Config::load(&path).unwrap();
        let resolved = cfg.merge_overrides(ConfigOverrides::default()).unwrap();

        assert_eq!(resolved.account_id, "file-account");
        assert_eq!(resolved.cache_timeout, 90);
    }

    #[test]
    fn cli_overrides_win() {
        let cfg = Config {
            account_id: Some("file-account".into()),
            application_key: Some("file-key".into()),
            bucket_id: Some("file-bucket".into()),
            cache_timeout: Some(60),
        };

        let resolved = cfg
            .merge_overrides(ConfigOverrides {
                account_id: Some("cli-account".into()),
                ..Default::default()
            })
            .unwrap();

        assert_eq!(resolved.account_id, "cli-account");
        assert_eq!(resolved.application_key, "file-key");
        assert_eq!(resolved.cache_timeout, 60);
    }

    #[test]
    fn missing_required_field_fails() {
        let err = Config::default()
            .merge_overrides(ConfigOverrides::default())
            .unwrap_err();
        assert!(err.to_string().contains("account_id"));
    }
}
