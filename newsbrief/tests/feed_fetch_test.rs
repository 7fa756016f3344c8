use common::FetchConfig;
use mockito::Matcher;
use newsbrief::ingestion::FeedFetcher;

fn rss(items: &[(&str, &str, &str)]) -> String {
    let body: String = items
        .iter()
        .map(|(title, link, date)| {
            format!("<item><title>{title}</title><link>{link}</link><pubDate>{date}</pubDate><description>{title} summary</description></item>")
        })
        .collect();
    format!(r#"<?xml version="1.0" encoding="UTF-8"?><rss version="2.0"><channel><title>Test</title>{body}</channel></rss>"#)
}

fn fetcher(cap: usize) -> FeedFetcher {
    let cfg = FetchConfig {
        timeout_seconds: 2,
        entry_cap: cap,
        ..FetchConfig::default()
    };
    FeedFetcher::new(&cfg).expect("fetcher")
}

#[tokio::test]
async fn fetch_parses_items_with_identifying_user_agent() {
    let mut server = mockito::Server::new_async().await;
    let head = server.mock("HEAD", "/feed").with_status(200).create_async().await;
    let get = server
        .mock("GET", "/feed")
        .match_header("user-agent", Matcher::Regex("^PersonalizedNews/".to_string()))
        .with_status(200)
        .with_header("content-type", "application/rss+xml")
        .with_body(rss(&[
            ("Fed holds rates", "https://apnews.com/a", "Tue, 19 Nov 2024 10:00:00 GMT"),
            ("Stocks &amp; bonds rally", "https://www.cnbc.com/b", "Tue, 19 Nov 2024 12:00:00 GMT"),
        ]))
        .create_async()
        .await;

    let items = fetcher(25).fetch(&format!("{}/feed", server.url())).await;

    assert_eq!(items.len(), 2);
    assert_eq!(items[0].title, "Fed holds rates");
    assert_eq!(items[0].domain, "apnews.com");
    assert_eq!(items[0].summary, "Fed holds rates summary");
    assert_eq!(items[1].title, "Stocks & bonds rally");
    assert!(items.iter().all(|i| i.published_at.is_some()));

    head.assert_async().await;
    get.assert_async().await;
}

#[tokio::test]
async fn fetch_caps_entries() {
    let mut server = mockito::Server::new_async().await;
    let entries: Vec<(String, String)> = (0..30)
        .map(|i| (format!("Story {i}"), format!("https://www.reuters.com/{i}")))
        .collect();
    let refs: Vec<(&str, &str, &str)> = entries
        .iter()
        .map(|(t, l)| (t.as_str(), l.as_str(), "Tue, 19 Nov 2024 10:00:00 GMT"))
        .collect();
    let _m = server
        .mock("GET", "/big")
        .with_status(200)
        .with_body(rss(&refs))
        .create_async()
        .await;

    let items = fetcher(25).fetch(&format!("{}/big", server.url())).await;
    assert_eq!(items.len(), 25);
    assert_eq!(items[24].title, "Story 24");
}

#[tokio::test]
async fn fetch_failures_yield_empty_lists() {
    let mut server = mockito::Server::new_async().await;
    let _m = server.mock("GET", "/down").with_status(503).create_async().await;

    assert!(fetcher(25).fetch(&format!("{}/down", server.url())).await.is_empty());
    assert!(fetcher(25).fetch("http://127.0.0.1:1/unreachable").await.is_empty());
}

#[tokio::test]
async fn malformed_feed_keeps_recovered_entries() {
    let mut server = mockito::Server::new_async().await;
    let body = r#"<rss><channel>
        <item><title>Good one</title><link>https://www.ft.com/1</link></item>
        <item><title>Broken</title><link>https://www.ft.com/2</link></channel>"#;
    let _m = server
        .mock("GET", "/broken")
        .with_status(200)
        .with_body(body)
        .create_async()
        .await;

    let items = fetcher(25).fetch(&format!("{}/broken", server.url())).await;
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].title, "Good one");
    assert_eq!(items[0].published_at, None);
}
