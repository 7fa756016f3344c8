//! Text cleanup for feed fields: entity decoding, tag stripping, hosts and anchors.

use scraper::{Html, Selector};

/// Unescape HTML entities, drop tags and collapse whitespace.
pub fn strip_html(s: &str) -> String {
    if s.trim().is_empty() {
        return String::new();
    }
    let unescaped = html_escape::decode_html_entities(s);
    let fragment = Html::parse_fragment(&unescaped);
    let text = fragment.root_element().text().collect::<Vec<_>>().join(" ");
    normalize_whitespace(&text)
}

/// Collapse runs of whitespace (including non-breaking spaces) into single spaces.
pub fn normalize_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Lower-cased host of `url`, or an empty string when it has none.
pub fn domain_of(url: &str) -> String {
    url::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_lowercase))
        .unwrap_or_default()
}

/// True when `domain` equals one of `hosts` or is a subdomain of one.
pub fn host_matches(domain: &str, hosts: &[String]) -> bool {
    hosts.iter().any(|h| {
        let h = h.as_str();
        domain == h
            || domain
                .strip_suffix(h)
                .is_some_and(|prefix| prefix.ends_with('.'))
    })
}

/// First anchor href in an HTML fragment whose host is not an aggregator,
/// falling back to the first anchor.
pub fn first_publisher_href(fragment: &str, aggregator_hosts: &[String]) -> Option<String> {
    if fragment.trim().is_empty() {
        return None;
    }
    let selector = Selector::parse("a[href]").ok()?;
    let html = Html::parse_fragment(fragment);
    let hrefs: Vec<String> = html
        .select(&selector)
        .filter_map(|a| a.value().attr("href"))
        .map(|h| h.trim().to_string())
        .filter(|h| !h.is_empty())
        .collect();

    hrefs
        .iter()
        .find(|h| !host_matches(&domain_of(h), aggregator_hosts))
        .or_else(|| hrefs.first())
        .cloned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn google() -> Vec<String> {
        vec!["news.google.com".to_string()]
    }

    #[test]
    fn strip_html_unescapes_then_strips() {
        assert_eq!(strip_html("&lt;b&gt;Nvidia&lt;/b&gt; beats\n\n estimates"), "Nvidia beats estimates");
        assert_eq!(strip_html("<p>Rates&nbsp;hold</p><p>steady</p>"), "Rates hold steady");
        assert_eq!(strip_html("   "), "");
    }

    #[test]
    fn strip_html_keeps_plain_text() {
        assert_eq!(strip_html("AT&amp;T shares rise"), "AT&T shares rise");
    }

    #[test]
    fn domain_is_lowercased_host() {
        assert_eq!(domain_of("https://WWW.Reuters.com/markets/x?y=1"), "www.reuters.com");
        assert_eq!(domain_of("not a url"), "");
        assert_eq!(domain_of(""), "");
    }

    #[test]
    fn host_matching_respects_label_boundaries() {
        let hosts = vec!["reuters.com".to_string()];
        assert!(host_matches("reuters.com", &hosts));
        assert!(host_matches("www.reuters.com", &hosts));
        assert!(!host_matches("notreuters.com", &hosts));
        assert!(!host_matches("", &hosts));
    }

    #[test]
    fn publisher_href_skips_aggregator_anchors() {
        let fragment = r#"<a href="https://news.google.com/rss/articles/abc">Story</a>
            <a href="https://www.ft.com/content/123">FT</a>"#;
        assert_eq!(
            first_publisher_href(fragment, &google()).as_deref(),
            Some("https://www.ft.com/content/123")
        );
    }

    #[test]
    fn publisher_href_falls_back_to_first_anchor() {
        let fragment = r#"<a href="https://news.google.com/rss/articles/abc">Story</a>&nbsp;<font>Reuters</font>"#;
        assert_eq!(
            first_publisher_href(fragment, &google()).as_deref(),
            Some("https://news.google.com/rss/articles/abc")
        );
        assert_eq!(first_publisher_href("no anchors here", &google()), None);
    }
}
