//! Bounded fan-out/join for per-request network work.
//!
//! Each batch spawns its tasks onto a `JoinSet`, gates them with a semaphore
//! sized to the worker count and merges results back by original index. A task
//! that fails, times out or panics only loses its own slot.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::error::{NewsError, NewsResult};
use crate::model::{ArticleText, NewsItem};
use crate::redirect::RedirectResolver;
use crate::scraping::ArticleExpander;

#[derive(Debug, Clone)]
pub struct ConcurrencyCoordinator {
    workers: usize,
    task_timeout: Duration,
}

impl ConcurrencyCoordinator {
    pub fn new(workers: usize, task_timeout: Duration) -> Self {
        Self {
            workers: workers.max(1),
            task_timeout,
        }
    }

    /// Run `tasks` with at most `workers` in flight and return the successful
    /// outputs keyed by their index. The timeout starts once a task holds a permit.
    pub async fn join_indexed<T, Fut>(&self, label: &'static str, tasks: Vec<(usize, Fut)>) -> BTreeMap<usize, T>
    where
        T: Send + 'static,
        Fut: Future<Output = NewsResult<T>> + Send + 'static,
    {
        let mut out = BTreeMap::new();
        if tasks.is_empty() {
            return out;
        }

        let semaphore = Arc::new(Semaphore::new(self.workers));
        let mut set = JoinSet::new();
        for (idx, fut) in tasks {
            let semaphore = semaphore.clone();
            let limit = self.task_timeout;
            set.spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok();
                let outcome = match tokio::time::timeout(limit, fut).await {
                    Ok(result) => result,
                    Err(_) => Err(NewsError::Timeout(limit)),
                };
                (idx, outcome)
            });
        }

        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((idx, Ok(value))) => {
                    out.insert(idx, value);
                }
                Ok((idx, Err(e))) => warn!(task = label, index = idx, error = %e, "task failed, slot left unchanged"),
                Err(e) => warn!(task = label, error = %e, "task aborted"),
            }
        }
        debug!(task = label, completed = out.len(), "fan-out joined");
        out
    }

    /// Resolve aggregator links among the first `limit` items in place.
    pub async fn resolve_links(&self, items: &mut [NewsItem], resolver: &Arc<RedirectResolver>, limit: usize) {
        let tasks: Vec<_> = items
            .iter()
            .enumerate()
            .take(limit)
            .filter_map(|(idx, item)| {
                let link = item.link.clone().filter(|l| resolver.is_aggregator(l))?;
                let resolver = resolver.clone();
                Some((idx, async move { Ok(resolver.resolve(&link).await) }))
            })
            .collect();

        let resolved = self.join_indexed("resolve", tasks).await;
        for (idx, final_url) in resolved {
            if let Some(item) = items.get_mut(idx) {
                item.rewrite_link(final_url);
            }
        }
    }

    /// Full text for up to `max_pages` leading items with links, in item order.
    /// Pages that come back empty are skipped.
    pub async fn expand_articles(
        &self,
        items: &[NewsItem],
        expander: Arc<dyn ArticleExpander>,
        max_pages: usize,
    ) -> Vec<ArticleText> {
        let tasks: Vec<_> = items
            .iter()
            .filter(|item| item.has_link())
            .take(max_pages)
            .enumerate()
            .filter_map(|(idx, item)| {
                let link = item.link.clone()?;
                let expander = expander.clone();
                let title = item.title.clone();
                let domain = item.domain.clone();
                Some((idx, async move {
                    let text = expander.expand(&link).await;
                    Ok(ArticleText { title, domain, text })
                }))
            })
            .collect();

        self.join_indexed("expand", tasks)
            .await
            .into_values()
            .filter(|article| !article.text.trim().is_empty())
            .collect()
    }
}
