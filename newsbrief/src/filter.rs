//! Domain-allowlist relevance filtering, deduplication and recency ordering.

use std::collections::HashSet;
use tracing::debug;

use common::DomainConfig;

use crate::model::{FilterMode, NewsItem};
use crate::sanitize::host_matches;

/// Allowlists/excludelist matched on the item's domain, subdomains included.
#[derive(Debug, Clone, Default)]
pub struct DomainLists {
    pub finance: Vec<String>,
    pub trusted: Vec<String>,
    pub exclude: Vec<String>,
}

impl DomainLists {
    pub fn is_finance(&self, domain: &str) -> bool {
        host_matches(domain, &self.finance)
    }

    pub fn is_trusted(&self, domain: &str) -> bool {
        host_matches(domain, &self.trusted)
    }

    pub fn is_excluded(&self, domain: &str) -> bool {
        host_matches(domain, &self.exclude)
    }
}

/// Predicate of one filter tier. Every rule requires a non-empty link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DomainRule {
    /// Finance domain and not excluded
    Finance,
    /// Finance or trusted domain and not excluded
    FinanceOrTrusted,
    /// Any domain that is not excluded
    AnyNotExcluded,
    /// Trusted or finance domain
    TrustedOrFinance,
}

impl DomainRule {
    fn accepts(self, lists: &DomainLists, item: &NewsItem) -> bool {
        if !item.has_link() {
            return false;
        }
        let d = item.domain.as_str();
        match self {
            DomainRule::Finance => lists.is_finance(d) && !lists.is_excluded(d),
            DomainRule::FinanceOrTrusted => (lists.is_finance(d) || lists.is_trusted(d)) && !lists.is_excluded(d),
            DomainRule::AnyNotExcluded => !lists.is_excluded(d),
            DomainRule::TrustedOrFinance => lists.is_trusted(d) || lists.is_finance(d),
        }
    }
}

/// One cascade step: the tier's survivors are kept when there are at least
/// `min_survivors` of them, otherwise the next tier is tried.
#[derive(Debug, Clone, Copy)]
pub struct Tier {
    pub rule: DomainRule,
    pub min_survivors: usize,
}

pub struct RelevanceFilter {
    lists: DomainLists,
    finance_tiers: Vec<Tier>,
    general_tiers: Vec<Tier>,
}

impl RelevanceFilter {
    pub fn new(lists: DomainLists, finance_minimums: &[usize]) -> Self {
        let minimum = |i: usize, default: usize| finance_minimums.get(i).copied().unwrap_or(default);
        Self {
            lists,
            finance_tiers: vec![
                Tier { rule: DomainRule::Finance, min_survivors: minimum(0, 6) },
                Tier { rule: DomainRule::FinanceOrTrusted, min_survivors: minimum(1, 3) },
                Tier { rule: DomainRule::AnyNotExcluded, min_survivors: 0 },
            ],
            general_tiers: vec![Tier { rule: DomainRule::TrustedOrFinance, min_survivors: 0 }],
        }
    }

    pub fn from_config(cfg: &DomainConfig) -> Self {
        let lists = DomainLists {
            finance: cfg.finance.clone(),
            trusted: cfg.trusted.clone(),
            exclude: cfg.exclude.clone(),
        };
        Self::new(lists, &cfg.finance_tier_minimums)
    }

    pub fn tiers(&self, mode: FilterMode) -> &[Tier] {
        match mode {
            FilterMode::Finance => &self.finance_tiers,
            FilterMode::General => &self.general_tiers,
        }
    }

    /// Cascade through the mode's tiers, keeping input order.
    pub fn filter(&self, items: &[NewsItem], mode: FilterMode) -> Vec<NewsItem> {
        let mut chosen = Vec::new();
        for (level, tier) in self.tiers(mode).iter().enumerate() {
            chosen = items
                .iter()
                .filter(|item| tier.rule.accepts(&self.lists, item))
                .cloned()
                .collect();
            if chosen.len() >= tier.min_survivors {
                debug!(tier = level + 1, kept = chosen.len(), "filter tier satisfied");
                break;
            }
            debug!(tier = level + 1, kept = chosen.len(), needed = tier.min_survivors, "filter tier short, loosening");
        }
        chosen
    }
}

/// Drop items whose key (link, else title) was already seen. First occurrence wins.
pub fn dedupe(items: Vec<NewsItem>) -> Vec<NewsItem> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert(item.dedup_key().to_string()))
        .collect()
}

/// Newest first, unknown dates last; equal keys keep their order.
pub fn sort_by_recency(items: &mut [NewsItem]) {
    items.sort_by(|a, b| match (a.published_at, b.published_at) {
        (Some(x), Some(y)) => y.cmp(&x),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn item(title: &str, link: &str) -> NewsItem {
        let link = if link.is_empty() { None } else { Some(link.to_string()) };
        NewsItem::new(title, link)
    }

    fn filter() -> RelevanceFilter {
        RelevanceFilter::from_config(&DomainConfig::default())
    }

    #[test]
    fn dedupe_keeps_first_occurrence() {
        let items = vec![
            item("a", "https://reuters.com/1").with_source("first"),
            item("b", "https://reuters.com/2"),
            item("c", "https://reuters.com/1").with_source("second"),
            item("same title", ""),
            item("same title", ""),
        ];
        let out = dedupe(items);
        assert_eq!(out.len(), 3);
        assert_eq!(out[0].source, "first");
        assert_eq!(out[1].title, "b");
        assert_eq!(out[2].title, "same title");

        let keys: HashSet<_> = out.iter().map(|i| i.dedup_key().to_string()).collect();
        assert_eq!(keys.len(), out.len());
    }

    #[test]
    fn recency_sort_puts_unknown_last_and_is_stable() {
        let t = |h| Some(Utc.with_ymd_and_hms(2024, 11, 19, h, 0, 0).unwrap());
        let mut items = vec![
            item("unknown-1", "").with_published_at(None),
            item("old", "").with_published_at(t(8)),
            item("new", "").with_published_at(t(12)),
            item("unknown-2", "").with_published_at(None),
            item("tie-a", "").with_published_at(t(10)),
            item("tie-b", "").with_published_at(t(10)),
        ];
        sort_by_recency(&mut items);
        let titles: Vec<_> = items.iter().map(|i| i.title.as_str()).collect();
        assert_eq!(titles, ["new", "tie-a", "tie-b", "old", "unknown-1", "unknown-2"]);
    }

    #[test]
    fn finance_tier_one_when_enough_finance_domains() {
        let mut items: Vec<NewsItem> = (0..6)
            .map(|i| item(&format!("r{i}"), &format!("https://www.reuters.com/{i}")))
            .collect();
        items.push(item("verge", "https://www.theverge.com/x"));

        let out = filter().filter(&items, FilterMode::Finance);
        assert_eq!(out.len(), 6);
        assert!(out.iter().all(|i| i.domain.ends_with("reuters.com")));
    }

    #[test]
    fn finance_falls_through_to_tier_three() {
        let items = vec![
            item("blog", "https://someblog.example/post"),
            item("opinion", "https://www.fool.com/take"),
            item("nolink", ""),
        ];
        let out = filter().filter(&items, FilterMode::Finance);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].title, "blog");
    }

    #[test]
    fn finance_never_empty_with_linked_non_excluded_item() {
        let items = vec![item("only", "https://unknown.example/x")];
        assert!(!filter().filter(&items, FilterMode::Finance).is_empty());
    }

    #[test]
    fn general_mode_single_tier() {
        let items = vec![
            item("ap", "https://apnews.com/a"),
            item("cnbc", "https://www.cnbc.com/b"),
            item("blog", "https://someblog.example/c"),
        ];
        let out = filter().filter(&items, FilterMode::General);
        let titles: Vec<_> = out.iter().map(|i| i.title.as_str()).collect();
        assert_eq!(titles, ["ap", "cnbc"]);
    }

    #[test]
    fn excluded_domains_never_pass_finance_tiers() {
        let lists = DomainLists {
            finance: vec!["fool.com".into()],
            trusted: vec![],
            exclude: vec!["fool.com".into()],
        };
        let f = RelevanceFilter::new(lists, &[1, 1]);
        let items = vec![item("fool", "https://www.fool.com/x")];
        assert!(f.filter(&items, FilterMode::Finance).is_empty());
    }
}
