use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::sanitize::domain_of;

/// One news entry as produced by the feed fetcher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsItem {
    pub title: String,
    pub link: Option<String>,
    pub summary: String,
    /// Lower-cased host of `link`, empty when there is no link
    pub domain: String,
    pub source: String,
    /// `None` means the date is unknown; such items sort last
    pub published_at: Option<DateTime<Utc>>,
}

impl NewsItem {
    pub fn new(title: impl Into<String>, link: Option<String>) -> Self {
        let domain = link.as_deref().map(domain_of).unwrap_or_default();
        Self {
            title: title.into(),
            link,
            summary: String::new(),
            domain,
            source: String::new(),
            published_at: None,
        }
    }

    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = summary.into();
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    pub fn with_published_at(mut self, published_at: Option<DateTime<Utc>>) -> Self {
        self.published_at = published_at;
        self
    }

    /// Link when present, otherwise the title.
    pub fn dedup_key(&self) -> &str {
        match self.link.as_deref() {
            Some(link) if !link.is_empty() => link,
            _ => &self.title,
        }
    }

    pub fn has_link(&self) -> bool {
        self.link.as_deref().is_some_and(|l| !l.is_empty())
    }

    /// Replace the link after redirect resolution, keeping `domain` in sync.
    pub fn rewrite_link(&mut self, final_url: String) {
        self.domain = domain_of(&final_url);
        self.link = Some(final_url);
    }
}

/// Relevance filtering mode for a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterMode {
    Finance,
    General,
}

impl FilterMode {
    pub fn cache_prefix(self) -> &'static str {
        match self {
            FilterMode::Finance => "fin",
            FilterMode::General => "gen",
        }
    }

    pub fn is_finance(self) -> bool {
        matches!(self, FilterMode::Finance)
    }
}

/// Requested summary generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SummaryMode {
    Extractive,
    Llm,
}

impl SummaryMode {
    pub fn as_str(self) -> &'static str {
        match self {
            SummaryMode::Extractive => "extractive",
            SummaryMode::Llm => "llm",
        }
    }
}

/// Which generator actually produced a summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GeneratorKind {
    Extractive,
    External,
}

/// Cached summary, keyed by its content fingerprint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryRecord {
    pub fingerprint: String,
    pub markdown: String,
    pub timestamp: i64,
    pub generator: GeneratorKind,
}

/// Summary handed back to callers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BriefSummary {
    pub markdown: String,
    pub cached: bool,
    pub generator: GeneratorKind,
}

/// Cleaned full text of one expanded article.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArticleText {
    pub title: String,
    pub domain: String,
    pub text: String,
}
