use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde_json::{Map, Value};

pub static PREFERRED_INSTANCE: &str = "preferredInstance";
pub static PREFERRED_INSTANCE_NAME: &str = "preferredInstanceName";
pub static INSTANCES_CACHE: &str = "instancesCache";
pub static INSTANCES_CACHE_TIMESTAMP: &str = "instancesCacheTimestamp";

/// Storage namespaces, small user settings vs. the local instance cache
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Area {
    Sync,
    Local,
}

impl Area {
    fn file_name(self) -> &'static str {
        match self {
            Self::Sync => "sync.json",
            Self::Local => "local.json",
        }
    }
}

/// Key-value storage for preferences and cached data
pub trait Store {
    async fn get(&self, area: Area, key: &str) -> Result<Option<Value>>;

    /// Write all entries at once, replacing previous values of the same keys
    async fn set(&self, area: Area, entries: Vec<(&str, Value)>) -> Result<()>;
}

/// Stores each area as a JSON object in its own file
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, area: Area) -> PathBuf {
        self.dir.join(area.file_name())
    }

    async fn read_area(&self, area: Area) -> Result<Map<String, Value>> {
        let path = self.path(area);
        let text = match tokio::fs::read_to_string(&path).await {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Map::new()),
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read {}", path.display()))
            }
        };
        serde_json::from_str(&text).with_context(|| format!("Failed to parse {}", path.display()))
    }
}

impl Store for JsonFileStore {
    async fn get(&self, area: Area, key: &str) -> Result<Option<Value>> {
        Ok(self.read_area(area).await?.remove(key))
    }

    async fn set(&self, area: Area, entries: Vec<(&str, Value)>) -> Result<()> {
        // A corrupt file is replaced rather than blocking every future write
        let mut map = match self.read_area(area).await {
            Ok(map) => map,
            Err(e) => {
                log::warn!("Discarding unreadable {:?} store: {e:#}", area);
                Map::new()
            }
        };
        for (key, value) in entries {
            map.insert(key.to_owned(), value);
        }

        tokio::fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("Failed to create {}", self.dir.display()))?;
        let path = self.path(area);
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, serde_json::to_vec_pretty(&map)?)
            .await
            .with_context(|| format!("Failed to write {}", tmp.display()))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .with_context(|| format!("Failed to replace {}", path.display()))?;
        Ok(())
    }
}
