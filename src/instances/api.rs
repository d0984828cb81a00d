use std::time::Duration;

use anyhow::{Context, Result};
use once_cell::sync::Lazy;

use super::directory::{parse_directory, DirectoryEntry};

/// Path probed to check if an instance is alive
pub static STATS_PATH: &str = "/api/v1/stats";

pub static CLIENT: Lazy<reqwest::Client> = Lazy::new(|| {
    reqwest::Client::builder()
        .use_rustls_tls()
        .user_agent(concat!("yt2inv/", env!("CARGO_PKG_VERSION")))
        .build()
        .unwrap()
});

/// Network access needed to pick an instance
pub trait InstanceApi {
    /// Send a HEAD request to the instance stats endpoint, true if it answered with success
    async fn probe(&self, instance_url: &str, timeout: Duration) -> Result<bool>;

    /// Download the public instance listing
    async fn directory(&self, timeout: Duration) -> Result<Vec<DirectoryEntry>>;
}

pub struct InvidiousApi {
    client: reqwest::Client,
    directory_url: String,
}

impl InvidiousApi {
    pub fn new(directory_url: impl Into<String>) -> Self {
        Self::with_client(CLIENT.clone(), directory_url)
    }

    pub fn with_client(client: reqwest::Client, directory_url: impl Into<String>) -> Self {
        Self {
            client,
            directory_url: directory_url.into(),
        }
    }
}

impl InstanceApi for InvidiousApi {
    async fn probe(&self, instance_url: &str, timeout: Duration) -> Result<bool> {
        let url = format!("{instance_url}{STATS_PATH}");
        let response = self.client.head(&url).timeout(timeout).send().await?;
        log::debug!("{url} answered {}", response.status());
        Ok(response.status().is_success())
    }

    async fn directory(&self, timeout: Duration) -> Result<Vec<DirectoryEntry>> {
        let body = self
            .client
            .get(&self.directory_url)
            .timeout(timeout)
            .send()
            .await
            .context("Failed to send directory request")?
            .error_for_status()
            .context("Directory request failed")?
            .text()
            .await
            .context("Failed to read directory response")?;
        parse_directory(&body).context("Failed to parse directory response")
    }
}

#[cfg(test)]
pub mod fake {
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use anyhow::{anyhow, Result};

    use super::InstanceApi;
    use crate::instances::directory::{parse_directory, DirectoryEntry};

    /// Scripted network, counting the calls made
    #[derive(Default)]
    pub struct FakeApi {
        healthy: Vec<String>,
        listing: Mutex<Option<String>>,
        hang: bool,
        pub probes: AtomicUsize,
        pub directory_calls: AtomicUsize,
        pub dropped: Arc<AtomicBool>,
    }

    struct DropFlag(Arc<AtomicBool>);

    impl Drop for DropFlag {
        fn drop(&mut self) {
            self.0.store(true, Ordering::SeqCst);
        }
    }

    impl FakeApi {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_healthy(mut self, url: &str) -> Self {
            self.healthy.push(url.to_owned());
            self
        }

        pub fn with_listing(self, body: &str) -> Self {
            self.set_listing(body);
            self
        }

        /// Requests never complete
        pub fn hanging(mut self) -> Self {
            self.hang = true;
            self
        }

        pub fn set_listing(&self, body: &str) {
            *self.listing.lock().unwrap() = Some(body.to_owned());
        }

        pub fn probe_count(&self) -> usize {
            self.probes.load(Ordering::SeqCst)
        }

        pub fn directory_count(&self) -> usize {
            self.directory_calls.load(Ordering::SeqCst)
        }

        async fn maybe_hang(&self) {
            if self.hang {
                let _flag = DropFlag(self.dropped.clone());
                std::future::pending::<()>().await;
            }
        }
    }

    impl InstanceApi for FakeApi {
        async fn probe(&self, instance_url: &str, _timeout: Duration) -> Result<bool> {
            self.probes.fetch_add(1, Ordering::SeqCst);
            self.maybe_hang().await;
            Ok(self.healthy.iter().any(|h| h == instance_url))
        }

        async fn directory(&self, _timeout: Duration) -> Result<Vec<DirectoryEntry>> {
            self.directory_calls.fetch_add(1, Ordering::SeqCst);
            self.maybe_hang().await;
            let listing = self.listing.lock().unwrap().clone();
            match listing {
                Some(body) => Ok(parse_directory(&body)?),
                None => Err(anyhow!("network unreachable")),
            }
        }
    }

    /// Directory body with one healthy https instance per domain
    pub fn listing(domains: &[(&str, f64)]) -> String {
        let entries: Vec<String> = domains
            .iter()
            .map(|(domain, uptime)| {
                format!(
                    r#"["{domain}",{{"type":"https","uri":"https://{domain}","flag":"🇩🇪","monitor":{{"down":false,"uptime":{uptime}}}}}]"#
                )
            })
            .collect();
        format!("[{}]", entries.join(","))
    }
}
