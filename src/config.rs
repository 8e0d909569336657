use std::{
    collections::HashMap,
    num::NonZeroUsize,
    path::{Path, PathBuf},
};

use config::{Config, ConfigError, Environment, File, FileFormat};
use serde::Deserialize;

pub const CONFIG_FILE_NAME: &str = "vendor-verify.toml";

pub struct VendorVerifyConfig {
    pub cache_dir: Option<PathBuf>,
    pub jobs: Option<NonZeroUsize>,
}

impl VendorVerifyConfig {
    /// Reads `vendor-verify.toml` from the working directory, if present, and
    /// `VENDOR_VERIFY_*` environment variables on top of it.
    pub fn load() -> anyhow::Result<Self> {
        let raw_config = RawConfig::load(Some(Path::new(CONFIG_FILE_NAME)), None)?;

        let jobs = match raw_config.worker.jobs {
            Some(jobs) => Some(
                NonZeroUsize::new(jobs)
                    .ok_or_else(|| anyhow::anyhow!("worker.jobs must be at least 1"))?,
            ),
            None => None,
        };

        Ok(Self {
            cache_dir: raw_config.cache.dir,
            jobs,
        })
    }
}

#[derive(Default, Debug, Deserialize, PartialEq, Eq)]
struct RawConfig {
    #[serde(default)]
    cache: CacheConfig,
    #[serde(default)]
    worker: WorkerConfig,
}

#[derive(Default, Debug, Deserialize, PartialEq, Eq)]
struct CacheConfig {
    dir: Option<PathBuf>,
}

#[derive(Default, Debug, Deserialize, PartialEq, Eq)]
struct WorkerConfig {
    jobs: Option<usize>,
}

impl RawConfig {
    fn load(
        file: Option<&Path>,
        env: Option<HashMap<String, String>>,
    ) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();
        if let Some(file) = file {
            builder = builder.add_source(
                File::from(file)
                    .format(FileFormat::Toml)
                    .required(false),
            );
        }
        builder
            .add_source(
                Environment::with_prefix("VENDOR_VERIFY")
                    .separator("_")
                    .try_parsing(true)
                    .source(env),
            )
            .build()?
            .try_deserialize()
    }
}
