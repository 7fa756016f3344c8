use async_trait::async_trait;
use reqwest::Client;
use std::io::Cursor;
use std::time::Duration;
use tracing::{info, warn};

use crate::error::{soft_fail, NewsError, NewsResult};
use crate::sanitize::normalize_whitespace;

/// Upper bound on the text returned for one article.
pub const MAX_ARTICLE_CHARS: usize = 6000;

/// Turns an article URL into bounded plain text; empty on any failure.
#[async_trait]
pub trait ArticleExpander: Send + Sync {
    async fn expand(&self, url: &str) -> String;
}

/// Readability-based main-content extraction.
pub struct ReadabilityExpander {
    client: Client,
    max_chars: usize,
}

impl ReadabilityExpander {
    pub fn new(timeout: Duration, user_agent: &str) -> NewsResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(user_agent.to_string())
            .build()?;
        Ok(Self {
            client,
            max_chars: MAX_ARTICLE_CHARS,
        })
    }

    async fn scrape(&self, url: &str) -> NewsResult<String> {
        let response = self.client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(NewsError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        // Readability requires a Reader, so we fetch bytes
        let bytes = response.bytes().await?;
        if bytes.is_empty() {
            return Ok(String::new());
        }
        let url_obj = url::Url::parse(url).map_err(|e| NewsError::Parse(format!("bad article URL {url}: {e}")))?;
        let product = readability::extractor::extract(&mut Cursor::new(bytes), &url_obj)
            .map_err(|e| NewsError::Parse(format!("readability failed for {url}: {e}")))?;

        let text = match html2text::from_read(product.content.as_bytes(), 120) {
            Ok(text) => text,
            Err(e) => {
                warn!(url = %url, error = %e, "html2text conversion failed, using readability text");
                product.text
            }
        };
        let text = clip(&normalize_whitespace(&text), self.max_chars);
        info!(url = %url, chars = text.chars().count(), "extracted article text");
        Ok(text)
    }
}

#[async_trait]
impl ArticleExpander for ReadabilityExpander {
    async fn expand(&self, url: &str) -> String {
        soft_fail(self.scrape(url).await, String::new(), "article expansion")
    }
}

/// First `max` characters of `s`, on a char boundary.
pub fn clip(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clip_respects_char_boundaries() {
        assert_eq!(clip("héllo wörld", 7), "héllo w");
        assert_eq!(clip("short", 100), "short");
    }

    #[tokio::test]
    async fn expansion_soft_fails_on_http_error() {
        let mut server = mockito::Server::new_async().await;
        let _m = server.mock("GET", "/gone").with_status(404).create_async().await;

        let expander = ReadabilityExpander::new(Duration::from_secs(2), "test-agent").expect("client");
        assert_eq!(expander.expand(&format!("{}/gone", server.url())).await, "");
    }

    #[tokio::test]
    async fn expansion_extracts_main_text() {
        let mut server = mockito::Server::new_async().await;
        let paragraph = "Nvidia reported record quarterly revenue driven by data center demand. ".repeat(8);
        let page = format!(
            "<html><head><title>Nvidia results</title></head><body><nav>Menu</nav><article><h1>Nvidia results</h1><p>{paragraph}</p><p>{paragraph}</p></article></body></html>"
        );
        let _m = server
            .mock("GET", "/story")
            .with_status(200)
            .with_header("content-type", "text/html")
            .with_body(page)
            .create_async()
            .await;

        let expander = ReadabilityExpander::new(Duration::from_secs(2), "test-agent").expect("client");
        let text = expander.expand(&format!("{}/story", server.url())).await;
        assert!(text.contains("record quarterly revenue"));
        assert!(text.chars().count() <= MAX_ARTICLE_CHARS);
    }
}
