//! Extractive summarizer and summary fingerprints.

use sha2::{Digest, Sha256};
use std::collections::HashMap;

use crate::model::{FilterMode, NewsItem, SummaryMode};
use crate::sanitize::strip_html;

const STOP_WORDS: &[&str] = &[
    "a", "about", "above", "after", "again", "against", "all", "am", "an", "and", "any", "are", "as", "at",
    "be", "because", "been", "before", "being", "below", "between", "both", "but", "by", "could", "did",
    "do", "does", "doing", "down", "during", "each", "few", "for", "from", "further", "had", "has", "have",
    "having", "he", "her", "here", "hers", "herself", "him", "himself", "his", "how", "i", "if", "in",
    "into", "is", "it", "its", "itself", "just", "me", "more", "most", "my", "myself", "no", "nor", "not",
    "of", "off", "on", "once", "only", "or", "other", "our", "ours", "ourselves", "out", "over", "own",
    "same", "she", "should", "so", "some", "such", "than", "that", "the", "their", "theirs", "them",
    "themselves", "then", "there", "these", "they", "this", "those", "through", "to", "too", "under",
    "until", "up", "very", "was", "we", "were", "what", "when", "where", "which", "while", "who", "whom",
    "why", "with", "you", "your", "yours", "yourself", "yourselves",
];

/// Deterministic frequency-based summarizer over item titles and blurbs.
#[derive(Debug, Clone)]
pub struct ExtractiveSummarizer {
    pub max_bullets: usize,
    pub context_items: usize,
    pub link_items: usize,
}

impl Default for ExtractiveSummarizer {
    fn default() -> Self {
        Self {
            max_bullets: 8,
            context_items: 10,
            link_items: 5,
        }
    }
}

impl ExtractiveSummarizer {
    /// Markdown brief for `items`. Never fails; no items gives the headers alone.
    pub fn summarize(&self, items: &[NewsItem]) -> String {
        let texts: Vec<String> = items
            .iter()
            .take(self.context_items)
            .map(|it| format!("{}. {}", it.title, it.summary))
            .collect();
        let bullets = self.bullets(&texts);

        let mut md = vec!["### What's new".to_string()];
        md.extend(bullets.iter().take(3).map(|b| format!("- {b}")));
        if bullets.len() > 3 {
            md.push(String::new());
            md.push("### Key drivers & numbers".to_string());
            md.extend(bullets.iter().skip(3).take(5).map(|b| format!("- {b}")));
        }
        md.push(String::new());
        md.push("### Notable links".to_string());
        for it in items.iter().take(self.link_items) {
            let title = match it.title.trim() {
                "" => "(link)",
                t => t,
            };
            md.push(format!(
                "- [{}]({}) — {}",
                title,
                it.link.as_deref().unwrap_or_default(),
                it.domain
            ));
        }
        md.join("\n").trim().to_string()
    }

    /// Highest-scoring sentences, returned in document order.
    pub fn bullets(&self, texts: &[String]) -> Vec<String> {
        let text = texts
            .iter()
            .filter(|t| !t.is_empty())
            .map(|t| strip_html(t))
            .collect::<Vec<_>>()
            .join(" ");
        if text.trim().is_empty() {
            return Vec::new();
        }

        let mut freq: HashMap<String, usize> = HashMap::new();
        for w in tokens(&text).into_iter().filter(|w| w.len() > 2 && !STOP_WORDS.contains(&w.as_str())) {
            *freq.entry(w).or_default() += 1;
        }
        if freq.is_empty() {
            return Vec::new();
        }

        let mut scored: Vec<(usize, f64, &str)> = split_sentences(&text)
            .into_iter()
            .enumerate()
            .filter_map(|(idx, s)| {
                let words = tokens(s);
                if words.is_empty() {
                    return None;
                }
                let hits: usize = words.iter().map(|w| freq.get(w).copied().unwrap_or(0)).sum();
                Some((idx, hits as f64 / words.len().max(8) as f64, s))
            })
            .collect();

        // stable: equal scores keep document order
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(self.max_bullets);
        scored.sort_by_key(|(idx, _, _)| *idx);
        scored.into_iter().map(|(_, _, s)| s.to_string()).collect()
    }
}

/// Lower-cased runs of ASCII letters and apostrophes.
fn tokens(s: &str) -> Vec<String> {
    s.to_lowercase()
        .split(|c: char| !(c.is_ascii_lowercase() || c == '\''))
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Split after `.`, `!` or `?` when followed by whitespace.
fn split_sentences(text: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut start = 0;
    let mut prev = None;
    let mut chars = text.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        if c.is_whitespace() && matches!(prev, Some('.' | '!' | '?')) {
            out.push(&text[start..i]);
            let mut end = i + c.len_utf8();
            while let Some(&(j, d)) = chars.peek() {
                if !d.is_whitespace() {
                    break;
                }
                end = j + d.len_utf8();
                chars.next();
            }
            start = end;
        }
        prev = Some(c);
    }
    out.push(&text[start..]);
    out.into_iter().map(str::trim).filter(|s| !s.is_empty()).collect()
}

/// Content-stable summary cache key: mode prefix, lower-cased query, the top
/// eight items' titles (80 chars) and domains, and the requested generator.
pub fn fingerprint(query: &str, mode: FilterMode, items: &[NewsItem], summary_mode: SummaryMode) -> String {
    let top = items
        .iter()
        .take(8)
        .map(|it| format!("{}{}", it.title.chars().take(80).collect::<String>(), it.domain))
        .collect::<Vec<_>>()
        .join("|");

    let mut hasher = Sha256::new();
    hasher.update(mode.cache_prefix().as_bytes());
    hasher.update(b":");
    hasher.update(query.to_lowercase().as_bytes());
    hasher.update(top.as_bytes());
    hasher.update(summary_mode.as_str().as_bytes());
    hex::encode(hasher.finalize())
}
