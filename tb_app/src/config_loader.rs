use std::path::Path;

use config::Config;
use config::File;
use serde::Deserialize;
use tb_ratelimit::BucketConfig;

use crate::driver::Workload;
use crate::error::Result;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ThrottleConfigFile {
    pub bucket: BucketConfig,
    #[serde(default)]
    pub workload: Workload,
}

pub fn load_throttle_config<P: AsRef<Path>>(path: P) -> Result<ThrottleConfigFile> {
    let config = Config::builder().add_source(File::from(path.as_ref())).build()?;

    Ok(config.try_deserialize()?)
}

/// Load throttle config with fallback to default
pub fn load_throttle_config_or_default(path: &str) -> ThrottleConfigFile {
    match load_throttle_config(path) {
        Ok(config) => {
            tracing::info!("Loaded throttle config from {path}");
            config
        }
        Err(err) => {
            tracing::warn!("Failed to load throttle config from {}: {}. Using defaults.", path, err);
            ThrottleConfigFile::default()
        }
    }
}
