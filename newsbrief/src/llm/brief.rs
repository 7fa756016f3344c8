//! Markdown briefs from an external text generator.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

use super::{strip_code_fence, LlmProvider, LlmRequest};
use crate::error::{NewsError, NewsResult};
use crate::model::{ArticleText, FilterMode, NewsItem};
use crate::scraping::clip;

const CONTEXT_ITEMS: usize = 10;
const BLURB_CHARS: usize = 300;
const FULLTEXT_ITEMS: usize = 4;
const FULLTEXT_CHARS: usize = 1600;

pub struct BriefRequest<'a> {
    pub query: &'a str,
    pub mode: FilterMode,
    pub items: &'a [NewsItem],
    pub full_texts: &'a [ArticleText],
}

/// External summary generator. May fail; callers fall back to the extractive summarizer.
#[async_trait]
pub trait BriefGenerator: Send + Sync {
    async fn generate(&self, request: BriefRequest<'_>) -> NewsResult<String>;
}

/// Brief generator backed by any [`LlmProvider`].
pub struct LlmBriefGenerator {
    provider: Arc<dyn LlmProvider>,
}

impl LlmBriefGenerator {
    pub fn new(provider: Arc<dyn LlmProvider>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl BriefGenerator for LlmBriefGenerator {
    async fn generate(&self, request: BriefRequest<'_>) -> NewsResult<String> {
        let (prompt, temperature) = match request.mode {
            FilterMode::Finance => (finance_prompt(&request), 0.15),
            FilterMode::General => (general_prompt(&request), 0.25),
        };

        let response = self
            .provider
            .generate(LlmRequest {
                prompt,
                max_tokens: None,
                temperature: Some(temperature),
                timeout_seconds: None,
            })
            .await
            .map_err(|e| NewsError::Generator(format!("{e:#}")))?;

        let markdown = strip_code_fence(&response.content).to_string();
        if markdown.is_empty() {
            return Err(NewsError::Generator("empty response".to_string()));
        }
        info!(model = %response.model, tokens = response.usage.total_tokens, "generated brief");
        Ok(markdown)
    }
}

/// "- title — domain — blurb" lines for the leading items.
fn context_lines(items: &[NewsItem]) -> String {
    items
        .iter()
        .take(CONTEXT_ITEMS)
        .map(|it| format!("- {} — {} — {}", it.title, it.domain, clip(&it.summary, BLURB_CHARS)))
        .collect::<Vec<_>>()
        .join("\n")
}

fn fulltext_block(texts: &[ArticleText]) -> String {
    if texts.is_empty() {
        return String::new();
    }
    let mut out = String::from("\nFull article extracts (cleaned):");
    for t in texts.iter().take(FULLTEXT_ITEMS) {
        out.push_str(&format!("\n\n[{}] {}\n{}", t.domain, t.title, clip(&t.text, FULLTEXT_CHARS)));
    }
    out
}

const SECTIONS: &str = "### What's new
- 1-3 bullets on the most material developments.

### Key drivers & numbers
- 3-6 bullets (earnings/guidance, margins/FCF, upgrades/downgrades/price targets, M&A/regulatory).

### Risks / Watch items
- 2-4 bullets, only if present.

### Calendar
- Upcoming catalysts if present.

### Notable links
- 3-5 bullets as \"Title — Domain\" taken from the context only.";

fn general_prompt(req: &BriefRequest<'_>) -> String {
    format!(
        "Topic: {}\n\nContext (Title — Domain — Blurb):\n{}\n{}\n\n\
         Return a concise investor-style summary in Markdown only with the sections:\n\n{}\n\n\
         No preamble, no HTML, no invented data.",
        req.query,
        context_lines(req.items),
        fulltext_block(req.full_texts),
        SECTIONS
    )
}

fn finance_prompt(req: &BriefRequest<'_>) -> String {
    format!(
        "You are a sell-side equity analyst. Company/topic: {}\n\nContext (Title — Domain — Blurb):\n{}\n{}\n\n\
         Return a 220-280 word investor brief in Markdown only with exactly these sections:\n\n{}\n\n\
         Prioritize wire services, financial press and official filings. \
         Ignore retail-advice, opinion and blog sources. No HTML, no invented numbers.",
        req.query,
        context_lines(req.items),
        fulltext_block(req.full_texts),
        SECTIONS
    )
}
