/*
newsbrief - command-line front end
Runs focused searches, topic digests and summaries against the configured feeds.
*/

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use common::Config;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use newsbrief::display::render_items;
use newsbrief::llm::brief::LlmBriefGenerator;
use newsbrief::llm::remote::RemoteLlmProvider;
use newsbrief::llm::LlmProvider;
use newsbrief::model::{FilterMode, SummaryMode};
use newsbrief::pipeline::NewsPipeline;

#[derive(Parser, Debug)]
#[command(name = "newsbrief", about = "Focused news search, topic digests and briefs")]
struct Args {
    /// Path to config.toml
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Override log level (info, debug, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Search news for a company, ticker or free-text query
    Search {
        query: String,
        /// Use the general allowlist instead of the finance cascade
        #[arg(long)]
        general: bool,
        /// Also print a markdown brief
        #[arg(long)]
        summary: bool,
        /// Use the configured LLM for the brief
        #[arg(long)]
        llm: bool,
    },
    /// Several queries at once (comma, semicolon or newline separated)
    Focus {
        tags: String,
        #[arg(long)]
        general: bool,
    },
    /// Latest items for a configured topic
    Topic {
        name: String,
        /// Ignore the topic cache
        #[arg(long)]
        refresh: bool,
    },
    /// List configured topics
    Topics,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let filter = EnvFilter::try_new(&args.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

    let config = load_config(args.config).await?;
    let generator = config.llm.as_ref().and_then(|llm_config| match create_llm_provider(llm_config) {
        Ok(provider) => {
            info!("LLM provider initialized");
            Some(Arc::new(LlmBriefGenerator::new(provider)))
        }
        Err(e) => {
            warn!("LLM provider unavailable, briefs will be extractive: {:#}", e);
            None
        }
    });

    let mut pipeline = NewsPipeline::from_config(config).context("failed to build pipeline")?;
    if let Some(generator) = generator {
        pipeline = pipeline.with_generator(generator);
    }
    let pipeline = Arc::new(pipeline);
    let now = Utc::now();

    match args.command {
        Command::Search {
            query,
            general,
            summary,
            llm,
        } => {
            let mode = filter_mode(general);
            let items = pipeline.search_with_fallback(&query, mode).await;
            if items.is_empty() {
                println!("No results for \"{}\".", query.trim());
            } else {
                print!("{}", render_items(&items, now));
            }
            if summary {
                let summary_mode = if llm { SummaryMode::Llm } else { SummaryMode::Extractive };
                let brief = pipeline.summarize(&query, mode, summary_mode).await;
                info!(cached = brief.cached, generator = ?brief.generator, "brief ready");
                println!("\n{}", brief.markdown);
            }
        }
        Command::Focus { tags, general } => {
            let tags: Vec<String> = tags
                .split([',', ';', '\n'])
                .map(str::to_string)
                .collect();
            for (tag, items) in pipeline.focus(&tags, filter_mode(general)).await {
                println!("## {}", tag);
                if items.is_empty() {
                    println!("(no results)");
                } else {
                    print!("{}", render_items(&items, now));
                }
                println!();
            }
        }
        Command::Topic { name, refresh } => {
            if pipeline.config().topic_feeds(&name).is_empty() {
                error!(topic = %name, "unknown topic");
                anyhow::bail!("Unknown topic '{}'; run `newsbrief topics` for the list", name);
            }
            let items = if refresh {
                pipeline.refresh_topic(&name).await
            } else {
                pipeline.topic_news(&name).await
            };
            print!("{}", render_items(&items, now));
        }
        Command::Topics => {
            for (name, feeds) in &pipeline.config().topics {
                println!("{} ({} feeds)", name, feeds.len());
            }
        }
    }

    Ok(())
}

fn filter_mode(general: bool) -> FilterMode {
    if general {
        FilterMode::General
    } else {
        FilterMode::Finance
    }
}

async fn load_config(explicit: Option<PathBuf>) -> Result<Config> {
    let default_path = PathBuf::from("config.default.toml");

    let override_path = if let Some(p) = explicit {
        if !p.exists() {
            error!(path = ?p, "specified config file not found");
            anyhow::bail!("Config file not found: {}", p.display());
        }
        Some(p)
    } else {
        let p = PathBuf::from("config.toml");
        if p.exists() {
            Some(p)
        } else {
            None
        }
    };

    let config = Config::load_with_defaults(
        if default_path.exists() { Some(&default_path) } else { None },
        override_path.as_deref(),
    )
    .await
    .context("failed to load configuration")?;
    info!(default = ?default_path, override = ?override_path, "configuration loaded");
    Ok(config)
}

/// Create an LLM provider based on configuration
fn create_llm_provider(llm_config: &common::LlmConfig) -> Result<Arc<dyn LlmProvider>> {
    let adapter = llm_config.adapter.as_deref().unwrap_or("none");
    match adapter {
        "remote" => {
            let remote_config = llm_config
                .remote
                .as_ref()
                .ok_or_else(|| anyhow::anyhow!("Remote adapter selected but [llm.remote] is missing"))?;

            let api_key_env = remote_config
                .api_key_env
                .as_deref()
                .ok_or_else(|| anyhow::anyhow!("Missing api_key_env in remote config"))?;
            let api_key = std::env::var(api_key_env)
                .with_context(|| format!("LLM API key env var '{}' not set", api_key_env))?;

            let model = remote_config.model.clone().unwrap_or_else(|| "gpt-4o-mini".to_string());
            let api_url = remote_config
                .api_url
                .clone()
                .unwrap_or_else(|| "https://api.openai.com/v1/chat/completions".to_string());

            let provider = RemoteLlmProvider::new(api_url, api_key, model).with_defaults(
                remote_config.timeout_seconds.unwrap_or(30),
                remote_config.max_tokens.unwrap_or(700),
                0.25,
            );
            Ok(Arc::new(provider))
        }
        "none" => anyhow::bail!("LLM adapter disabled (adapter = \"none\")"),
        _ => anyhow::bail!("Unknown LLM adapter type: {}", adapter),
    }
}
