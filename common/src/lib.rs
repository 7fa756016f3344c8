/*!
common/src/lib.rs

Shared configuration types for newsbrief.

This file provides:
- Config data structures (deserialized from TOML)
- An async loader that merges an override file over the defaults file
*/

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Fetching configuration (feed/search requests, probes, aggregator detection)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Timeout applied to every outbound request
    pub timeout_seconds: u64,
    /// Descriptive User-Agent sent to feed providers
    pub user_agent: String,
    /// Maximum number of entries kept from a single feed
    pub entry_cap: usize,
    /// Recency window appended to search queries ("when:<days>d")
    pub query_days: u32,
    /// Search feed URL with `{query}` and `{days}` placeholders
    pub search_url: String,
    /// Hosts whose links wrap the real publisher URL
    pub aggregator_hosts: Vec<String>,
    /// Issue a best-effort HEAD request before each feed GET
    pub probe: bool,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: 8,
            user_agent: "PersonalizedNews/1.0 (+https://example.com)".to_string(),
            entry_cap: 25,
            query_days: 7,
            search_url: "https://news.google.com/rss/search?q={query}+when:{days}d&hl=en-US&gl=US&ceid=US:en"
                .to_string(),
            aggregator_hosts: vec!["news.google.com".to_string()],
            probe: true,
        }
    }
}

/// Pipeline sizing: result caps, fan-out width and per-task limits
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub max_results: usize,
    /// Number of leading items whose aggregator links get resolved (K)
    pub resolve_limit: usize,
    /// Worker pool size for fan-out batches (W)
    pub workers: usize,
    pub task_timeout_seconds: u64,
    /// Articles expanded to full text before calling the external generator
    pub pages_for_llm: usize,
    pub max_focus_tags: usize,
    pub focus_items_per_tag: usize,
    pub max_items_per_topic: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_results: 25,
            resolve_limit: 6,
            workers: 6,
            task_timeout_seconds: 20,
            pages_for_llm: 3,
            max_focus_tags: 10,
            focus_items_per_tag: 6,
            max_items_per_topic: 10,
        }
    }
}

/// Time-to-live for each cache kind, in seconds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub query_ttl_seconds: i64,
    pub redirect_ttl_seconds: i64,
    pub summary_ttl_seconds: i64,
    pub topic_ttl_seconds: i64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            query_ttl_seconds: 600,
            redirect_ttl_seconds: 86_400,
            summary_ttl_seconds: 1_800,
            topic_ttl_seconds: 3_600,
        }
    }
}

/// Domain allowlists and finance query terms
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DomainConfig {
    pub finance: Vec<String>,
    pub trusted: Vec<String>,
    pub exclude: Vec<String>,
    pub finance_keywords: Vec<String>,
    /// Minimum survivors for the finance tiers before the cascade loosens
    pub finance_tier_minimums: Vec<usize>,
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|s| s.to_string()).collect()
}

impl Default for DomainConfig {
    fn default() -> Self {
        Self {
            finance: strings(&[
                "reuters.com",
                "bloomberg.com",
                "wsj.com",
                "ft.com",
                "cnbc.com",
                "marketwatch.com",
                "businesswire.com",
                "prnewswire.com",
                "sec.gov",
                "ir.aboutamazon.com",
                "ir.microsoft.com",
                "ir.apple.com",
            ]),
            trusted: strings(&[
                "apnews.com",
                "bbc.co.uk",
                "bbc.com",
                "nytimes.com",
                "washingtonpost.com",
                "theguardian.com",
                "arstechnica.com",
                "theverge.com",
                "techcrunch.com",
            ]),
            exclude: strings(&[
                "investopedia.com",
                "ibtimes.com",
                "thestreet.com",
                "fool.com",
                "investors.com",
            ]),
            finance_keywords: strings(&[
                "earnings",
                "revenue",
                "guidance",
                "outlook",
                "forecast",
                "margin",
                "EBIT",
                "EBITDA",
                "free cash flow",
                "FCF",
                "buyback",
                "dividend",
                "downgrade",
                "upgrade",
                "price target",
                "rating",
                "M&A",
                "acquisition",
                "merger",
                "antitrust",
            ]),
            finance_tier_minimums: vec![6, 3],
        }
    }
}

/// Ticker and SEC CIK for a company known by name or ticker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanyConfig {
    pub ticker: String,
    #[serde(default)]
    pub cik: Option<String>,
}

/// SEC EDGAR filings merged into finance searches for companies with a CIK
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SecConfig {
    pub enabled: bool,
    /// EDGAR asks for a descriptive User-Agent with contact details
    pub user_agent: String,
    /// Atom filings URL with a `{cik}` placeholder
    pub filings_url: String,
    pub entry_cap: usize,
}

impl Default for SecConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            user_agent: "newsbrief/1.0 (contact@example.com)".to_string(),
            filings_url: "https://www.sec.gov/cgi-bin/browse-edgar?action=getcompany&CIK={cik}&type=&owner=exclude&count=40&output=atom"
                .to_string(),
            entry_cap: 25,
        }
    }
}

/// Remote LLM config (used if `llm.adapter = "remote"`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteLlmConfig {
    pub api_url: Option<String>,
    pub api_key_env: Option<String>,
    pub model: Option<String>,
    pub timeout_seconds: Option<u64>,
    pub max_tokens: Option<usize>,
}

/// LLM top-level config
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    pub adapter: Option<String>, // "remote", "none"
    pub remote: Option<RemoteLlmConfig>,
}

/// Top-level application configuration (deserialized from config.toml)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub domains: DomainConfig,
    /// Topic name -> feed URLs
    #[serde(default)]
    pub topics: BTreeMap<String, Vec<String>>,
    /// Lower-cased company name or ticker -> ticker/CIK
    #[serde(default)]
    pub companies: BTreeMap<String, CompanyConfig>,
    #[serde(default)]
    pub sec: SecConfig,
    pub llm: Option<LlmConfig>,
}

impl Config {
    /// Load configuration with an optional default file and an optional override file.
    /// If both are present, they are merged (override takes precedence).
    pub async fn load_with_defaults(default_path: Option<&Path>, override_path: Option<&Path>) -> Result<Self> {
        let mut config_value = toml::Value::Table(toml::map::Map::new());

        for path in [default_path, override_path].into_iter().flatten() {
            if !path.exists() {
                continue;
            }
            let data = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read config: {}", path.display()))?;
            let val: toml::Value = toml::from_str(&data)
                .with_context(|| format!("Failed to parse configuration: {}", path.display()))?;
            merge_toml(&mut config_value, val);
        }

        let cfg: Config = config_value.try_into().context("Failed to parse merged configuration")?;
        Ok(cfg)
    }

    /// Feed URLs configured for a topic; empty for unknown topics.
    pub fn topic_feeds(&self, topic: &str) -> &[String] {
        self.topics.get(topic).map(Vec::as_slice).unwrap_or(&[])
    }
}

fn merge_toml(a: &mut toml::Value, b: toml::Value) {
    match (a, b) {
        (toml::Value::Table(a_map), toml::Value::Table(b_map)) => {
            for (k, v) in b_map {
                if let Some(a_val) = a_map.get_mut(&k) {
                    merge_toml(a_val, v);
                } else {
                    a_map.insert(k, v);
                }
            }
        }
        (a_val, b_val) => *a_val = b_val,
    }
}
