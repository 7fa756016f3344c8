// Fetch arbitrary feed URLs and print what the parser recovers.
use clap::Parser;
use common::FetchConfig;
use newsbrief::display::human_time;
use newsbrief::ingestion::FeedFetcher;

#[derive(Parser, Debug)]
#[command(name = "feed_probe", about = "Fetch feeds and print parsed items")]
struct Args {
    /// Feed URLs to fetch
    #[arg(required = true)]
    urls: Vec<String>,

    /// Number of items to print per feed
    #[arg(long, default_value_t = 3)]
    show: usize,

    /// Request timeout in seconds
    #[arg(long, default_value_t = 8)]
    timeout: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_writer(std::io::stderr)
        .init();

    let cfg = FetchConfig {
        timeout_seconds: args.timeout,
        probe: false,
        ..FetchConfig::default()
    };
    let fetcher = FeedFetcher::new(&cfg)?;
    let now = chrono::Utc::now();

    for url in &args.urls {
        println!("\n{}", "=".repeat(60));
        println!("Feed: {}", url);
        println!("{}", "=".repeat(60));

        let items = fetcher.fetch(url).await;
        let dated = items.iter().filter(|i| i.published_at.is_some()).count();
        println!("  Items: {} ({} dated)", items.len(), dated);

        for (i, item) in items.iter().take(args.show).enumerate() {
            println!("    {}. {}", i + 1, item.title);
            println!("       URL: {}", item.link.as_deref().unwrap_or("none"));
            println!(
                "       Domain: {}  Source: {}  Published: {}",
                item.domain,
                if item.source.is_empty() { "-" } else { item.source.as_str() },
                human_time(item.published_at, now)
            );
            println!("       Summary: {} chars", item.summary.chars().count());
        }
    }
    Ok(())
}
