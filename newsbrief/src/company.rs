//! Company lookup for finance queries and SEC EDGAR filings.

use std::collections::BTreeMap;
use tracing::debug;

use common::{CompanyConfig, FetchConfig, SecConfig};

use crate::ingestion::{FeedFetcher, NO_TITLE};
use crate::model::NewsItem;

const SEC_DOMAIN: &str = "sec.gov";
const SEC_SOURCE: &str = "SEC EDGAR";
const FILING_TITLE: &str = "SEC filing";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompanyInfo {
    pub ticker: String,
    pub cik: Option<String>,
}

/// Match `query` against configured company names, then against tickers.
pub fn lookup_company(query: &str, companies: &BTreeMap<String, CompanyConfig>) -> Option<CompanyInfo> {
    let key = query.trim().to_lowercase();
    if key.is_empty() {
        return None;
    }
    let found = companies
        .iter()
        .find(|(name, _)| name.trim().to_lowercase() == key)
        .map(|(_, company)| company)
        .or_else(|| companies.values().find(|c| c.ticker.eq_ignore_ascii_case(&key)))?;

    Some(CompanyInfo {
        ticker: found.ticker.trim().to_uppercase(),
        cik: found.cik.as_deref().map(str::trim).filter(|c| !c.is_empty()).map(str::to_string),
    })
}

/// `(query OR TICKER)` when the ticker says something the query doesn't.
pub fn with_ticker(query: &str, company: Option<&CompanyInfo>) -> String {
    let query = query.trim();
    match company {
        Some(c) if !c.ticker.is_empty() && !c.ticker.eq_ignore_ascii_case(query) => {
            format!("({} OR {})", query, c.ticker)
        }
        _ => query.to_string(),
    }
}

/// EDGAR Atom client. Uses its own User-Agent since EDGAR rejects anonymous ones.
pub struct SecFilings {
    fetcher: FeedFetcher,
    filings_url: String,
}

impl SecFilings {
    pub fn new(sec: &SecConfig, fetch: &FetchConfig) -> anyhow::Result<Self> {
        let cfg = FetchConfig {
            user_agent: sec.user_agent.clone(),
            entry_cap: sec.entry_cap,
            aggregator_hosts: Vec::new(),
            ..fetch.clone()
        };
        Ok(Self {
            fetcher: FeedFetcher::new(&cfg)?,
            filings_url: sec.filings_url.clone(),
        })
    }

    pub fn filings_url(&self, cik: &str) -> String {
        self.filings_url.replace("{cik}", cik.trim())
    }

    /// Recent filings for `cik`. Empty on any failure.
    pub async fn fetch(&self, cik: &str) -> Vec<NewsItem> {
        let items: Vec<NewsItem> = self
            .fetcher
            .fetch(&self.filings_url(cik))
            .await
            .into_iter()
            .map(label_filing)
            .collect();
        debug!(cik = %cik, filings = items.len(), "SEC filings");
        items
    }
}

fn label_filing(mut item: NewsItem) -> NewsItem {
    if item.title == NO_TITLE {
        item.title = FILING_TITLE.to_string();
    }
    item.domain = SEC_DOMAIN.to_string();
    item.source = SEC_SOURCE.to_string();
    item
}
