use futures::{stream, StreamExt};

use super::api::InstanceApi;
use super::resolver::Resolver;
use super::{build_redirect_url, InstanceRecord};
use crate::error::Yt2InvError;
use crate::store::Store;

/// Number of candidate instances probed at once
const PROBE_CONCURRENCY: usize = 8;

#[derive(Debug, Clone, PartialEq)]
pub enum Selection {
    /// The preferred instance is up
    Redirect(String),
    /// The preferred instance is down, the user has to pick another one
    Choose {
        preferred: String,
        candidates: Vec<InstanceRecord>,
    },
}

impl<S: Store, A: InstanceApi> Resolver<S, A> {
    /// Redirect to the preferred instance if it is healthy, otherwise offer alternatives
    pub async fn select(&self, video_id: &str) -> Result<Selection, Yt2InvError> {
        let preferred = self.preferred_instance().await;
        if self
            .check_instance_health(&preferred, self.health_timeout())
            .await
        {
            return Ok(Selection::Redirect(build_redirect_url(video_id, &preferred)));
        }

        log::info!("Preferred instance {preferred} is not responding");
        let candidates = self.fetch_healthy_instances().await;
        if candidates.is_empty() {
            return Err(Yt2InvError::NoAlternatives);
        }
        Ok(Selection::Choose {
            preferred,
            candidates,
        })
    }

    /// Redirect to an instance picked by the user, saving it as preferred if asked to
    pub async fn confirm(&self, video_id: &str, choice: &InstanceRecord, remember: bool) -> String {
        if remember {
            self.save_preferred_instance(&choice.url, &choice.name).await;
        }
        build_redirect_url(video_id, &choice.url)
    }

    /// Probe every candidate, keeping their order
    pub async fn probe_candidates(
        &self,
        candidates: Vec<InstanceRecord>,
    ) -> Vec<(InstanceRecord, bool)> {
        stream::iter(candidates)
            .map(|candidate| async move {
                let healthy = self
                    .check_instance_health(&candidate.url, self.health_timeout())
                    .await;
                (candidate, healthy)
            })
            .buffered(PROBE_CONCURRENCY)
            .collect()
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::instances::api::fake::{listing, FakeApi};
    use crate::store::memory::MemoryStore;
    use crate::store::{Area, PREFERRED_INSTANCE};

    fn resolver(api: FakeApi) -> Resolver<MemoryStore, FakeApi> {
        Resolver::new(MemoryStore::default(), api, &Config::default())
    }

    #[tokio::test]
    async fn healthy_preferred_redirects() {
        let api = FakeApi::new()
            .with_healthy("https://yewtu.be")
            .with_listing(&listing(&[("a.example", 99.0)]));
        let r = resolver(api);

        let selection = r.select("dQw4w9WgXcQ").await.unwrap();
        assert_eq!(
            selection,
            Selection::Redirect("https://yewtu.be/watch?v=dQw4w9WgXcQ".into())
        );
        assert_eq!(r.api().probe_count(), 1);
        assert_eq!(r.api().directory_count(), 0);
    }

    #[tokio::test]
    async fn unhealthy_preferred_offers_candidates() {
        let api = FakeApi::new().with_listing(&listing(&[("a.example", 99.0), ("b.example", 97.0)]));
        let r = resolver(api);

        let Selection::Choose {
            preferred,
            candidates,
        } = r.select("dQw4w9WgXcQ").await.unwrap()
        else {
            panic!("expected a choice");
        };
        assert_eq!(preferred, "https://yewtu.be");
        assert_eq!(candidates.len(), 2);
        assert_eq!(r.api().directory_count(), 1);

        // Not remembered without confirmation
        assert!(r.store().snapshot(Area::Sync).is_empty());

        let url = r.confirm("dQw4w9WgXcQ", &candidates[1], false).await;
        assert_eq!(url, "https://b.example/watch?v=dQw4w9WgXcQ");
        assert!(r.store().snapshot(Area::Sync).is_empty());
        assert_eq!(r.preferred_instance().await, "https://yewtu.be");
    }

    #[tokio::test]
    async fn confirmed_choice_is_remembered() {
        let api = FakeApi::new().with_listing(&listing(&[("a.example", 99.0)]));
        let r = resolver(api);

        let Selection::Choose { candidates, .. } = r.select("abc").await.unwrap() else {
            panic!("expected a choice");
        };
        let url = r.confirm("abc", &candidates[0], true).await;
        assert_eq!(url, "https://a.example/watch?v=abc");
        assert_eq!(
            r.store().snapshot(Area::Sync)[PREFERRED_INSTANCE],
            "https://a.example"
        );
        assert_eq!(r.preferred_instance_name().await, "a.example");
    }

    #[tokio::test]
    async fn unreachable_directory_offers_fallback() {
        let r = resolver(FakeApi::new());
        let Selection::Choose { candidates, .. } = r.select("abc").await.unwrap() else {
            panic!("expected a choice");
        };
        assert_eq!(candidates.len(), 5);
    }

    #[tokio::test]
    async fn no_alternatives() {
        // Every listed instance is filtered out
        let api = FakeApi::new().with_listing(&listing(&[("slow.example", 50.0)]));
        let r = resolver(api);
        assert_eq!(r.select("abc").await, Err(Yt2InvError::NoAlternatives));
    }

    #[tokio::test]
    async fn probe_candidates_keeps_order() {
        let api = FakeApi::new().with_healthy("https://b.example");
        let r = resolver(api);
        let candidates = vec![
            InstanceRecord {
                url: "https://a.example".into(),
                name: "a.example".into(),
                flag: "unknown".into(),
                uptime_percent: None,
            },
            InstanceRecord {
                url: "https://b.example".into(),
                name: "b.example".into(),
                flag: "unknown".into(),
                uptime_percent: None,
            },
        ];
        let results = r.probe_candidates(candidates).await;
        let status: Vec<_> = results.iter().map(|(c, ok)| (c.name.as_str(), *ok)).collect();
        assert_eq!(status, vec![("a.example", false), ("b.example", true)]);
        assert_eq!(r.api().probe_count(), 2);
    }
}
