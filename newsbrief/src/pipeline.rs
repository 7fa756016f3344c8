//! Query, focus and topic pipelines plus cached summaries.

use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use common::Config;

use crate::cache::{Clock, QueryCache, QueryKey, RedirectCache, SummaryCache, SystemClock, TopicCache};
use crate::company::{lookup_company, with_ticker, SecFilings};
use crate::fanout::ConcurrencyCoordinator;
use crate::filter::{dedupe, sort_by_recency, RelevanceFilter};
use crate::ingestion::FeedFetcher;
use crate::llm::brief::{BriefGenerator, BriefRequest};
use crate::llm::summarizer::{fingerprint, ExtractiveSummarizer};
use crate::model::{BriefSummary, FilterMode, GeneratorKind, NewsItem, SummaryMode, SummaryRecord};
use crate::redirect::{HttpLinkFollower, LinkFollower, RedirectResolver};
use crate::scraping::{ArticleExpander, ReadabilityExpander};

/// Reply for a summary request with a blank query.
pub const NO_SUMMARY: &str = "No summary.";

/// Keyword bucket appended to finance queries; multi-word terms are quoted.
pub fn build_finance_query(query: &str, keywords: &[String]) -> String {
    let bucket = keywords
        .iter()
        .take(16)
        .map(|k| if k.contains(' ') { format!("\"{k}\"") } else { k.clone() })
        .collect::<Vec<_>>()
        .join(" OR ");
    format!("{query} ({bucket})")
}

/// Fill the search URL template with a form-encoded query and the recency window.
pub fn build_search_url(template: &str, query: &str, days: u32) -> String {
    let encoded: String = url::form_urlencoded::byte_serialize(query.as_bytes()).collect();
    template.replace("{query}", &encoded).replace("{days}", &days.to_string())
}

/// Time allowed for one focus tag. A search is a probe, a GET and a redirect
/// hop, each capped by the fetch timeout; the general fallback can double that.
pub fn focus_task_budget(config: &Config) -> Duration {
    let hops = if config.fetch.probe { 3 } else { 2 };
    let search = config.fetch.timeout_seconds * hops;
    Duration::from_secs((search * 2).max(config.pipeline.task_timeout_seconds))
}

pub struct NewsPipeline {
    config: Config,
    fetcher: FeedFetcher,
    sec: Option<SecFilings>,
    resolver: Arc<RedirectResolver>,
    filter: RelevanceFilter,
    coordinator: ConcurrencyCoordinator,
    focus_coordinator: ConcurrencyCoordinator,
    query_cache: Arc<QueryCache>,
    redirect_cache: Arc<RedirectCache>,
    summary_cache: Arc<SummaryCache>,
    topic_cache: Arc<TopicCache>,
    summarizer: ExtractiveSummarizer,
    expander: Arc<dyn ArticleExpander>,
    generator: Option<Arc<dyn BriefGenerator>>,
}

impl NewsPipeline {
    pub fn from_config(config: Config) -> anyhow::Result<Self> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Build every component from `config`, stamping cache entries with `clock`.
    pub fn with_clock(config: Config, clock: Arc<dyn Clock>) -> anyhow::Result<Self> {
        let fetch = &config.fetch;
        let timeout = Duration::from_secs(fetch.timeout_seconds);

        let fetcher = FeedFetcher::new(fetch)?;
        let sec = if config.sec.enabled {
            Some(SecFilings::new(&config.sec, fetch)?)
        } else {
            None
        };
        let follower: Arc<dyn LinkFollower> = Arc::new(HttpLinkFollower::new(timeout, &fetch.user_agent)?);
        let expander: Arc<dyn ArticleExpander> = Arc::new(ReadabilityExpander::new(timeout, &fetch.user_agent)?);

        let ttl = &config.cache;
        let query_cache = Arc::new(QueryCache::new("query", ttl.query_ttl_seconds, clock.clone()));
        let redirect_cache = Arc::new(RedirectCache::new("redirect", ttl.redirect_ttl_seconds, clock.clone()));
        let summary_cache = Arc::new(SummaryCache::new("summary", ttl.summary_ttl_seconds, clock.clone()));
        let topic_cache = Arc::new(TopicCache::new("topic", ttl.topic_ttl_seconds, clock));

        let resolver = Arc::new(RedirectResolver::new(
            follower,
            redirect_cache.clone(),
            fetch.aggregator_hosts.clone(),
        ));
        let coordinator = ConcurrencyCoordinator::new(
            config.pipeline.workers,
            Duration::from_secs(config.pipeline.task_timeout_seconds),
        );
        let focus_coordinator = ConcurrencyCoordinator::new(config.pipeline.workers, focus_task_budget(&config));

        Ok(Self {
            filter: RelevanceFilter::from_config(&config.domains),
            fetcher,
            sec,
            resolver,
            coordinator,
            focus_coordinator,
            query_cache,
            redirect_cache,
            summary_cache,
            topic_cache,
            summarizer: ExtractiveSummarizer::default(),
            expander,
            generator: None,
            config,
        })
    }

    /// Replace how aggregator links are followed; the redirect cache is kept.
    pub fn with_link_follower(mut self, follower: Arc<dyn LinkFollower>) -> Self {
        self.resolver = Arc::new(RedirectResolver::new(
            follower,
            self.redirect_cache.clone(),
            self.config.fetch.aggregator_hosts.clone(),
        ));
        self
    }

    pub fn with_expander(mut self, expander: Arc<dyn ArticleExpander>) -> Self {
        self.expander = expander;
        self
    }

    pub fn with_generator(mut self, generator: Arc<dyn BriefGenerator>) -> Self {
        self.generator = Some(generator);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn redirect_cache(&self) -> &RedirectCache {
        &self.redirect_cache
    }

    pub fn search_url(&self, query: &str, mode: FilterMode) -> String {
        let q = match mode {
            FilterMode::Finance => {
                let company = lookup_company(query, &self.config.companies);
                build_finance_query(&with_ticker(query, company.as_ref()), &self.config.domains.finance_keywords)
            }
            FilterMode::General => query.to_string(),
        };
        build_search_url(&self.config.fetch.search_url, &q, self.config.fetch.query_days)
    }

    /// Filtered, deduplicated, newest-first results for `query`, cached per
    /// (mode, normalized query).
    pub async fn search(&self, query: &str, mode: FilterMode) -> Vec<NewsItem> {
        let query = query.trim();
        if query.is_empty() {
            return Vec::new();
        }

        let key = QueryKey::new(mode, query);
        if let Some(entry) = self.query_cache.get(&key) {
            return entry.value;
        }

        let url = self.search_url(query, mode);
        let (mut raw, filings) = tokio::join!(self.fetcher.fetch(&url), self.company_filings(query, mode));
        self.coordinator
            .resolve_links(&mut raw, &self.resolver, self.config.pipeline.resolve_limit)
            .await;

        // filings bypass domain tiers and are deduped against the news items
        let mut chosen = self.filter.filter(&raw, mode);
        let filing_count = filings.len();
        chosen.extend(filings);
        let mut chosen = dedupe(chosen);
        sort_by_recency(&mut chosen);
        chosen.truncate(self.config.pipeline.max_results);

        info!(
            query = %query,
            mode = ?mode,
            raw = raw.len(),
            filings = filing_count,
            kept = chosen.len(),
            "search complete"
        );
        self.query_cache.put_now(key, chosen.clone());
        chosen
    }

    /// EDGAR filings for a finance query naming a company with a known CIK.
    async fn company_filings(&self, query: &str, mode: FilterMode) -> Vec<NewsItem> {
        let Some(sec) = self.sec.as_ref().filter(|_| mode.is_finance()) else {
            return Vec::new();
        };
        match lookup_company(query, &self.config.companies).and_then(|c| c.cik) {
            Some(cik) => sec.fetch(&cik).await,
            None => Vec::new(),
        }
    }

    /// Finance results, or general results when finance filtering leaves nothing.
    pub async fn search_with_fallback(&self, query: &str, mode: FilterMode) -> Vec<NewsItem> {
        let items = self.search(query, mode).await;
        if items.is_empty() && mode.is_finance() {
            return self.search(query, FilterMode::General).await;
        }
        items
    }

    /// Results for several tags at once, in tag order. Blank tags are dropped.
    pub async fn focus(self: &Arc<Self>, tags: &[String], mode: FilterMode) -> Vec<(String, Vec<NewsItem>)> {
        let tags: Vec<String> = tags
            .iter()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .take(self.config.pipeline.max_focus_tags)
            .collect();
        let per_tag = self.config.pipeline.focus_items_per_tag;

        let tasks: Vec<_> = tags
            .iter()
            .cloned()
            .enumerate()
            .map(|(idx, tag)| {
                let this = self.clone();
                (idx, async move {
                    let mut items = this.search_with_fallback(&tag, mode).await;
                    items.truncate(per_tag);
                    Ok(items)
                })
            })
            .collect();

        let mut results = self.focus_coordinator.join_indexed("focus", tasks).await;
        tags.into_iter()
            .enumerate()
            .map(|(idx, tag)| (tag, results.remove(&idx).unwrap_or_default()))
            .collect()
    }

    /// Latest items across a topic's configured feeds, cached per topic.
    pub async fn topic_news(&self, topic: &str) -> Vec<NewsItem> {
        if let Some(entry) = self.topic_cache.get(&topic.to_string()) {
            return entry.value;
        }
        self.refresh_topic(topic).await
    }

    /// Refetch a topic regardless of cache state.
    pub async fn refresh_topic(&self, topic: &str) -> Vec<NewsItem> {
        let feeds = self.config.topic_feeds(topic);
        if feeds.is_empty() {
            warn!(topic = %topic, "unknown topic or no feeds configured");
            return Vec::new();
        }

        let tasks: Vec<_> = feeds
            .iter()
            .cloned()
            .enumerate()
            .map(|(idx, url)| {
                let fetcher = self.fetcher.clone();
                (idx, async move { Ok(fetcher.fetch(&url).await) })
            })
            .collect();

        // concatenated in feed order so dedupe keeps the earlier feed's copy
        let fetched = self.coordinator.join_indexed("topic", tasks).await;
        let mut items = dedupe(fetched.into_values().flatten().collect());
        sort_by_recency(&mut items);
        items.truncate(self.config.pipeline.max_items_per_topic);

        info!(topic = %topic, feeds = feeds.len(), kept = items.len(), "topic refreshed");
        self.topic_cache.put_now(topic.to_string(), items.clone());
        items
    }

    /// Markdown brief for `query`, cached by content fingerprint.
    ///
    /// The external generator is used only for [`SummaryMode::Llm`] and when one
    /// is configured; any generator failure falls back to the extractive summary.
    pub async fn summarize(&self, query: &str, mode: FilterMode, summary_mode: SummaryMode) -> BriefSummary {
        let query = query.trim();
        if query.is_empty() {
            return BriefSummary {
                markdown: NO_SUMMARY.to_string(),
                cached: true,
                generator: GeneratorKind::Extractive,
            };
        }

        let items = self.search_with_fallback(query, mode).await;
        let key = fingerprint(query, mode, &items, summary_mode);
        if let Some(entry) = self.summary_cache.get(&key) {
            return BriefSummary {
                markdown: entry.value.markdown,
                cached: true,
                generator: entry.value.generator,
            };
        }

        let external = match (&self.generator, summary_mode) {
            (Some(generator), SummaryMode::Llm) => self.generate_external(generator.as_ref(), query, mode, &items).await,
            _ => None,
        };
        let (markdown, generator) = match external {
            Some(md) => (md, GeneratorKind::External),
            None => (self.summarizer.summarize(&items), GeneratorKind::Extractive),
        };

        let now = self.summary_cache.now();
        let record = SummaryRecord {
            fingerprint: key.clone(),
            markdown: markdown.clone(),
            timestamp: now,
            generator,
        };
        self.summary_cache.put(key, record, now);
        BriefSummary {
            markdown,
            cached: false,
            generator,
        }
    }

    async fn generate_external(
        &self,
        generator: &dyn BriefGenerator,
        query: &str,
        mode: FilterMode,
        items: &[NewsItem],
    ) -> Option<String> {
        let full_texts = self
            .coordinator
            .expand_articles(items, self.expander.clone(), self.config.pipeline.pages_for_llm)
            .await;
        let request = BriefRequest {
            query,
            mode,
            items,
            full_texts: &full_texts,
        };
        match generator.generate(request).await {
            Ok(markdown) => Some(markdown),
            Err(e) => {
                warn!(query = %query, error = %e, "external summary failed, using extractive summary");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finance_query_quotes_multi_word_keywords() {
        let keywords: Vec<String> = ["earnings", "free cash flow", "FCF"].iter().map(|s| s.to_string()).collect();
        assert_eq!(
            build_finance_query("Nvidia", &keywords),
            "Nvidia (earnings OR \"free cash flow\" OR FCF)"
        );
    }

    #[test]
    fn finance_query_uses_first_sixteen_keywords() {
        let keywords = common::DomainConfig::default().finance_keywords;
        let q = build_finance_query("x", &keywords);
        assert!(q.contains("\"price target\""));
        assert!(q.contains("rating"));
        assert!(!q.contains("acquisition"));
        assert_eq!(q.matches(" OR ").count(), 15);
    }

    #[test]
    fn focus_budget_covers_search_and_fallback() {
        let mut cfg = Config::default();
        assert_eq!(focus_task_budget(&cfg), Duration::from_secs(48));

        cfg.fetch.probe = false;
        cfg.fetch.timeout_seconds = 2;
        assert_eq!(focus_task_budget(&cfg), Duration::from_secs(20));
    }

    #[test]
    fn search_url_is_form_encoded() {
        let url = build_search_url(&common::FetchConfig::default().search_url, "AT&T \"free cash\"", 7);
        assert_eq!(
            url,
            "https://news.google.com/rss/search?q=AT%26T+%22free+cash%22+when:7d&hl=en-US&gl=US&ceid=US:en"
        );
    }
}
