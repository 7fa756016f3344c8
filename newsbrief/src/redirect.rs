use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::cache::RedirectCache;
use crate::error::NewsResult;
use crate::sanitize::{domain_of, host_matches};

/// Outcome of resolving one aggregator link. A failed resolution is
/// recorded with `final_url == original_url`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RedirectRecord {
    pub original_url: String,
    pub final_url: String,
    pub resolved_at: i64,
}

/// Follows a URL's redirect chain and reports where it ends.
#[async_trait]
pub trait LinkFollower: Send + Sync {
    async fn follow(&self, url: &str) -> NewsResult<String>;
}

/// GET with redirects enabled; the terminal response URL is the answer.
pub struct HttpLinkFollower {
    client: Client,
}

impl HttpLinkFollower {
    pub fn new(timeout: Duration, user_agent: &str) -> NewsResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(user_agent.to_string())
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl LinkFollower for HttpLinkFollower {
    async fn follow(&self, url: &str) -> NewsResult<String> {
        let response = self.client.get(url).send().await?;
        Ok(response.url().to_string())
    }
}

/// Maps aggregator-wrapped links to publisher URLs, remembering answers
/// (including failures) for the cache's TTL.
pub struct RedirectResolver {
    follower: Arc<dyn LinkFollower>,
    cache: Arc<RedirectCache>,
    aggregator_hosts: Vec<String>,
}

impl RedirectResolver {
    pub fn new(follower: Arc<dyn LinkFollower>, cache: Arc<RedirectCache>, aggregator_hosts: Vec<String>) -> Self {
        Self {
            follower,
            cache,
            aggregator_hosts,
        }
    }

    pub fn is_aggregator(&self, url: &str) -> bool {
        host_matches(&domain_of(url), &self.aggregator_hosts)
    }

    pub async fn resolve(&self, url: &str) -> String {
        if !self.is_aggregator(url) {
            return url.to_string();
        }

        let key = url.to_string();
        if let Some(entry) = self.cache.get(&key) {
            return entry.value.final_url;
        }

        let final_url = match self.follower.follow(url).await {
            Ok(final_url) if !final_url.is_empty() => final_url,
            Ok(_) => url.to_string(),
            Err(e) => {
                warn!(url = %url, error = %e, "redirect resolution failed, keeping original link");
                url.to_string()
            }
        };
        debug!(from = %url, to = %final_url, "resolved redirect");

        let now = self.cache.now();
        let record = RedirectRecord {
            original_url: key.clone(),
            final_url: final_url.clone(),
            resolved_at: now,
        };
        self.cache.put(key, record, now);
        final_url
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ManualClock;
    use crate::error::NewsError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Fixed(AtomicUsize);

    #[async_trait]
    impl LinkFollower for Fixed {
        async fn follow(&self, _url: &str) -> NewsResult<String> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok("https://reuters.com/x".to_string())
        }
    }

    struct Unreachable;

    #[async_trait]
    impl LinkFollower for Unreachable {
        async fn follow(&self, url: &str) -> NewsResult<String> {
            Err(NewsError::Status {
                status: 503,
                url: url.to_string(),
            })
        }
    }

    fn resolver(follower: Arc<dyn LinkFollower>) -> RedirectResolver {
        let clock = Arc::new(ManualClock::new(0));
        let cache = Arc::new(RedirectCache::new("redirect", 86_400, clock));
        RedirectResolver::new(follower, cache, vec!["news.google.com".to_string()])
    }

    #[tokio::test]
    async fn non_aggregator_links_pass_through() {
        let follower = Arc::new(Fixed(AtomicUsize::new(0)));
        let r = resolver(follower.clone());
        assert_eq!(r.resolve("https://www.ft.com/a").await, "https://www.ft.com/a");
        assert_eq!(follower.0.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn failures_are_cached_as_identity() {
        let r = resolver(Arc::new(Unreachable));
        let url = "https://news.google.com/rss/articles/zzz";
        assert_eq!(r.resolve(url).await, url);

        let record = r.cache.get(&url.to_string()).expect("failure recorded").value;
        assert_eq!(record.final_url, url);
        assert_eq!(record.original_url, url);
    }
}
