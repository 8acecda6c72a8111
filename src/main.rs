mod analyze;
mod cli;
mod config;
mod daemon;
mod error;
mod exa;
mod gemini;
mod models;
mod monitor;
mod registry;
mod server;
mod store;
mod translate;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::cli::{Cli, Commands};
use crate::config::{Config, load_config, validate_config};
use crate::exa::ExaClient;
use crate::gemini::GeminiClient;
use crate::models::{Report, ReportStatus};
use crate::monitor::{MonitorEvent, MonitorParams};
use crate::registry::SourceRegistry;
use crate::store::{ReportStore, RunCounter};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = load_config(&cli.config).with_context(|| format!("loading config from {}", cli.config.display()))?;

    // Initialize tracing
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.rasad.log_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!(config_path = %cli.config.display(), "config loaded");

    validate_config(&config).context("config validation failed")?;
    info!("config validated successfully");

    match cli.command {
        Some(Commands::Validate) => {
            println!("Configuration is valid.");
        }
        Some(Commands::Run { topic, output }) => {
            run_once(config, topic, output).await?;
        }
        None => {
            daemon::run(config).await?;
        }
    }

    Ok(())
}

/// One-shot monitoring pass: drive the pipeline for the configured
/// watchlist, applying lifecycle events to an in-memory report store, and
/// print (or write) the resulting reports.
async fn run_once(config: Config, topic_filter: Option<String>, output: Option<PathBuf>) -> Result<()> {
    let registry = SourceRegistry::from_config(&config.source);

    let mut items = config.watchlist_items();
    if let Some(ref filter) = topic_filter {
        let needle = filter.to_lowercase();
        items.retain(|i| i.topic.to_lowercase().contains(&needle));
    }
    if items.is_empty() {
        anyhow::bail!("watchlist is empty — add a [[watchlist]] entry to the config");
    }

    let active_domains = registry.active_domains();
    if active_domains.is_empty() {
        anyhow::bail!("no active media sources configured");
    }

    let gemini_key = config.gemini_api_key().context("GEMINI_API_KEY not set in config or environment")?;
    let exa_key = config.exa_api_key().context("EXA_API_KEY not set in config or environment")?;
    let gemini_timeout = humantime::parse_duration(&config.gemini.timeout).context("gemini timeout")?;
    let exa_timeout = humantime::parse_duration(&config.exa.timeout).context("exa timeout")?;
    let gemini = GeminiClient::new(&gemini_key, gemini_timeout)?;
    let exa = ExaClient::new(&exa_key, exa_timeout)?;

    let params = MonitorParams {
        items,
        active_domains,
        allowed_domains: registry.allowed_domains(),
        leanings: registry.leanings(),
        num_results: config.exa.num_results,
        translation_model: config.gemini.translation_model.clone(),
        analysis_model: config.gemini.analysis_model.clone(),
    };

    let counter = RunCounter::new();
    let token = counter.begin();

    // Ctrl-C cancels the run; in-flight calls finish but their results are
    // discarded and remaining items are marked cancelled.
    {
        let counter = counter.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("cancellation requested");
                counter.cancel();
            }
        });
    }

    let store = ReportStore::new();
    let (tx, mut rx) = mpsc::unbounded_channel();
    let consumer = {
        let store = store.clone();
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                if let MonitorEvent::Update { item_id, patch } = &event
                    && let Some(ref stage) = patch.stage
                {
                    info!(item = %item_id, stage = %stage, "stage changed");
                }
                store.apply(&event);
            }
        })
    };

    monitor::run_monitoring(&gemini, &exa, &params, &token, &tx).await;
    drop(tx);
    consumer.await.context("applying monitor events")?;

    let reports = store.all();
    if let Some(dir) = output {
        std::fs::create_dir_all(&dir).with_context(|| format!("creating output directory {}", dir.display()))?;
        for report in &reports {
            let path = dir.join(format!("{}.md", slugify(&report.topic)));
            std::fs::write(&path, render_report(report)).with_context(|| format!("writing {}", path.display()))?;
            println!("Report written to: {}", path.display());
        }
    } else {
        for report in &reports {
            print_report(report);
        }
    }

    let failed = reports.iter().filter(|r| r.status == ReportStatus::Failed).count();
    if failed > 0 {
        warn!(failed, total = reports.len(), "some topics failed");
    }

    Ok(())
}

fn print_report(report: &Report) {
    println!("== {} [{}]", report.topic, report.status);
    if let Some(ref query) = report.query {
        println!("   query: {query}");
    }
    println!("   articles: {}", report.articles.len());
    if let Some(ref error) = report.error {
        println!("   error: {error}");
    }
    if let Some(ref summary) = report.summary {
        println!("\n{summary}\n");
    }
}

fn render_report(report: &Report) -> String {
    let mut out = String::new();
    out.push_str(&format!("# {}\n\n", report.topic));
    out.push_str(&format!("- Status: {}\n", report.status));
    out.push_str(&format!("- Generated: {}\n", report.created_at.to_rfc3339()));
    if let Some(ref query) = report.query {
        out.push_str(&format!("- Query: {query}\n"));
    }
    if let Some(ref error) = report.error {
        out.push_str(&format!("- Error: {error}\n"));
    }
    out.push('\n');
    if let Some(ref summary) = report.summary {
        out.push_str(summary);
        out.push('\n');
    }
    if !report.articles.is_empty() {
        out.push_str("\n## Retrieved articles\n\n");
        for article in &report.articles {
            let date = article.published_date.as_deref().unwrap_or("undated");
            out.push_str(&format!("- [{}]({}) — {} ({})\n", article.title, article.url, article.domain, date));
        }
    }
    out
}

fn slugify(name: &str) -> String {
    let slug: String = name
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect();
    let slug = slug.trim_matches('-').to_string();
    if slug.is_empty() { "topic".to_string() } else { slug }
}
