use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Result;
use figment::providers::{Env, Format, Toml};
use figment::Figment;
use serde::Deserialize;

use crate::instances::DEFAULT_INSTANCE;

pub static CONFIG_FILE: &str = "yt2inv.toml";
pub static ENV_PREFIX: &str = "YT2INV_";
pub static DIRECTORY_URL: &str = "https://api.invidious.io/instances.json";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_instance")]
    pub default_instance: String,
    #[serde(default = "default_directory_url")]
    pub directory_url: String,
    #[serde(default = "default_timeout_ms")]
    pub health_timeout_ms: u64,
    #[serde(default = "default_timeout_ms")]
    pub directory_timeout_ms: u64,
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
    #[serde(default)]
    pub debug: bool,
}

fn default_instance() -> String {
    DEFAULT_INSTANCE.into()
}

fn default_directory_url() -> String {
    DIRECTORY_URL.into()
}

fn default_timeout_ms() -> u64 {
    5000
}

fn default_cache_ttl_secs() -> u64 {
    15 * 60
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_instance: default_instance(),
            directory_url: default_directory_url(),
            health_timeout_ms: default_timeout_ms(),
            directory_timeout_ms: default_timeout_ms(),
            cache_ttl_secs: default_cache_ttl_secs(),
            data_dir: None,
            debug: false,
        }
    }
}

impl Config {
    pub fn get_config(path: Option<&Path>) -> Result<Self> {
        let path = path.unwrap_or_else(|| Path::new(CONFIG_FILE));
        Ok(Self::figment(path).extract()?)
    }

    fn figment(path: &Path) -> Figment {
        Figment::new()
            .merge(Toml::file(path))
            .merge(Env::prefixed(ENV_PREFIX))
    }

    pub fn health_timeout(&self) -> Duration {
        Duration::from_millis(self.health_timeout_ms)
    }

    pub fn directory_timeout(&self) -> Duration {
        Duration::from_millis(self.directory_timeout_ms)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    /// Where the preference and cache files live
    pub fn data_dir(&self) -> PathBuf {
        if let Some(dir) = &self.data_dir {
            return dir.clone();
        }
        dirs::data_dir()
            .map(|d| d.join("yt2inv"))
            .unwrap_or_else(|| PathBuf::from(".yt2inv"))
    }
}
