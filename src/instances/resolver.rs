use std::time::Duration;

use anyhow::Result;
use serde_json::{json, Value};
use time::OffsetDateTime;

use super::api::InstanceApi;
use super::directory::healthy_instances;
use super::{fallback_instances, name_from_url, InstanceRecord};
use crate::config::Config;
use crate::error::Yt2InvError;
use crate::store::{
    Area, Store, INSTANCES_CACHE, INSTANCES_CACHE_TIMESTAMP, PREFERRED_INSTANCE,
    PREFERRED_INSTANCE_NAME,
};

/// Ranked instances as last downloaded from the directory
#[derive(Debug, Clone, PartialEq)]
pub struct InstanceCache {
    pub instances: Vec<InstanceRecord>,
    pub fetched_at_ms: i64,
}

impl InstanceCache {
    pub fn age(&self, now_ms: i64) -> Duration {
        Duration::from_millis(now_ms.saturating_sub(self.fetched_at_ms).max(0) as u64)
    }

    fn is_fresh(&self, now_ms: i64, ttl: Duration) -> bool {
        now_ms.saturating_sub(self.fetched_at_ms) < ttl.as_millis() as i64
    }
}

pub fn now_ms() -> i64 {
    (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64
}

/// Decides which instance a video should be redirected to
pub struct Resolver<S, A> {
    store: S,
    api: A,
    default_instance: String,
    health_timeout: Duration,
    directory_timeout: Duration,
    cache_ttl: Duration,
}

impl<S: Store, A: InstanceApi> Resolver<S, A> {
    pub fn new(store: S, api: A, config: &Config) -> Self {
        Self {
            store,
            api,
            default_instance: config.default_instance.clone(),
            health_timeout: config.health_timeout(),
            directory_timeout: config.directory_timeout(),
            cache_ttl: config.cache_ttl(),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    #[cfg(test)]
    pub fn api(&self) -> &A {
        &self.api
    }

    pub fn health_timeout(&self) -> Duration {
        self.health_timeout
    }

    pub async fn preferred_instance(&self) -> String {
        match self.stored_string(PREFERRED_INSTANCE).await {
            Some(url) if !url.is_empty() => url,
            _ => self.default_instance.clone(),
        }
    }

    pub async fn preferred_instance_name(&self) -> String {
        match self.stored_string(PREFERRED_INSTANCE_NAME).await {
            Some(name) if !name.is_empty() => name,
            _ => name_from_url(&self.preferred_instance().await),
        }
    }

    async fn stored_string(&self, key: &str) -> Option<String> {
        match self.store.get(Area::Sync, key).await {
            Ok(Some(Value::String(s))) => Some(s),
            Ok(_) => None,
            Err(e) => {
                log::debug!("Error reading {key}: {e:#}");
                None
            }
        }
    }

    pub async fn save_preferred_instance(&self, url: &str, name: &str) {
        let entries = vec![
            (PREFERRED_INSTANCE, json!(url)),
            (PREFERRED_INSTANCE_NAME, json!(name)),
        ];
        match self.store.set(Area::Sync, entries).await {
            Ok(()) => log::info!("Preferred instance set to {name} ({url})"),
            Err(e) => log::warn!("Error saving preferred instance: {e:#}"),
        }
    }

    /// Probe an instance, giving up once `timeout` has passed
    pub async fn check_instance_health(&self, url: &str, timeout: Duration) -> bool {
        // Dropping the probe future on timeout aborts the request
        match tokio::time::timeout(timeout, self.api.probe(url, timeout)).await {
            Ok(Ok(healthy)) => healthy,
            Ok(Err(e)) => {
                log::debug!("Health probe of {url} failed: {e:#}");
                false
            }
            Err(_) => {
                log::debug!("{url}: {}", Yt2InvError::ProbeTimeout);
                false
            }
        }
    }

    pub async fn cached_instances(&self) -> Option<InstanceCache> {
        let instances = match self.store.get(Area::Local, INSTANCES_CACHE).await {
            Ok(Some(v)) => v,
            Ok(None) => return None,
            Err(e) => {
                log::debug!("Error reading instance cache: {e:#}");
                return None;
            }
        };
        let timestamp = match self.store.get(Area::Local, INSTANCES_CACHE_TIMESTAMP).await {
            Ok(Some(v)) => v,
            _ => return None,
        };

        let fetched_at_ms = timestamp
            .as_i64()
            .or_else(|| timestamp.as_f64().map(|ts| ts as i64))?;
        match serde_json::from_value::<Vec<InstanceRecord>>(instances) {
            Ok(instances) => Some(InstanceCache {
                instances,
                fetched_at_ms,
            }),
            Err(e) => {
                log::debug!("Ignoring malformed instance cache: {e}");
                None
            }
        }
    }

    /// Healthy instances, from the cache while it is fresh, else from the directory
    pub async fn fetch_healthy_instances(&self) -> Vec<InstanceRecord> {
        if let Some(cache) = self.cached_instances().await {
            if cache.is_fresh(now_ms(), self.cache_ttl) {
                log::debug!("Using {} cached instances", cache.instances.len());
                return cache.instances;
            }
        }

        match self.refresh_instances().await {
            Ok(instances) => instances,
            Err(e) => {
                log::debug!("Error fetching instances: {e:#}");
                fallback_instances()
            }
        }
    }

    async fn refresh_instances(&self) -> Result<Vec<InstanceRecord>> {
        let entries = tokio::time::timeout(
            self.directory_timeout,
            self.api.directory(self.directory_timeout),
        )
        .await
        .map_err(|_| Yt2InvError::DirectoryTimeout)??;

        let healthy = healthy_instances(entries);
        log::debug!("Directory listed {} healthy instances", healthy.len());

        let entries = vec![
            (INSTANCES_CACHE, serde_json::to_value(&healthy)?),
            (INSTANCES_CACHE_TIMESTAMP, json!(now_ms())),
        ];
        if let Err(e) = self.store.set(Area::Local, entries).await {
            log::warn!("Error saving instance cache: {e:#}");
        }
        Ok(healthy)
    }
}
