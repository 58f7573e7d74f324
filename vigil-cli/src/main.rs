//! Vigil CLI
//!
//! Concurrent threat intelligence ingestion, merge, and distribution.

mod config;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use config::Config;
use vigil_adapters::{MemorySink, SharedFeed, SharedSink, StaticFeed};
use vigil_core::ThresholdScorer;
use vigil_pipeline::{
    CancelToken, CorrelationScheduler, CycleReport, CycleStatus, DeliveryOutcome, Distributor,
    IngestionCoordinator, SearchAggregator, StatusTracker,
};
use vigil_store::{CanonicalStore, MemoryStore};

#[derive(Parser)]
#[command(name = "vigil")]
#[command(author, version, about = "Vigil: threat intelligence pipeline", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbosity level (0-3)
    #[arg(short, long, default_value = "1")]
    verbose: u8,

    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "vigil.toml")]
    config: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one ingestion cycle: fetch feeds, merge, distribute to sinks
    Cycle,

    /// Federated search across all configured sinks
    Search {
        /// The search query
        #[arg(short, long)]
        query: String,

        /// Maximum combined results
        #[arg(short, long, default_value = "50")]
        limit: usize,
    },

    /// Run one correlation cycle over the canonical store
    Correlate,

    /// Show per-sink connectivity and overall health
    Status,

    /// End-to-end demo with sample feeds and in-memory sinks
    Demo,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => Level::ERROR,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .compact()
        .init();

    match cli.command {
        Commands::Cycle => run_cycle(&cli.config).await?,
        Commands::Search { query, limit } => run_search(&cli.config, &query, limit).await?,
        Commands::Correlate => run_correlate(&cli.config).await?,
        Commands::Status => run_status(&cli.config).await?,
        Commands::Demo => run_demo().await?,
    }

    Ok(())
}

async fn run_cycle(config_path: &PathBuf) -> Result<()> {
    let config = Config::load(config_path)?;
    let feeds = config.build_feeds()?;
    let sinks = config.build_sinks()?;

    println!("🛰️  Vigil ingestion cycle");
    println!("📥 Feeds: {} | 📤 Sinks: {}\n", feeds.len(), sinks.len());

    let store: Arc<MemoryStore> = Arc::new(MemoryStore::new());
    let coordinator = IngestionCoordinator::new(
        feeds,
        store.clone(),
        Distributor::new(sinks, Duration::from_secs(config.sink_timeout_secs)),
        Arc::new(ThresholdScorer::default()),
        Duration::from_secs(config.feed_timeout_secs),
    );

    let report = coordinator.run_cycle(&CancelToken::new()).await;
    print_cycle_report(&report);
    Ok(())
}

async fn run_search(config_path: &PathBuf, query: &str, limit: usize) -> Result<()> {
    let config = Config::load(config_path)?;
    let sinks = config.build_sinks()?;

    println!("🔍 Federated search: {query:?} across {} sinks\n", sinks.len());

    let aggregator = SearchAggregator::new(sinks, Duration::from_secs(config.sink_timeout_secs));
    let result = aggregator.search(query, limit).await;

    for (sink, outcome) in &result.per_sink {
        match &outcome.error {
            Some(err) => println!("⚠️  {sink}: {err}"),
            None => println!("✅ {sink}: {} results", outcome.count),
        }
    }

    println!("\n📊 Combined ({} results):", result.combined.len());
    for record in &result.combined {
        println!(
            "   {} [{}] confidence={} last_seen={} source={}",
            record.key,
            record.severity,
            record.confidence,
            record.last_seen.format("%Y-%m-%d %H:%M:%S"),
            record.source
        );
    }
    Ok(())
}

async fn run_correlate(config_path: &PathBuf) -> Result<()> {
    let config = Config::load(config_path)?;
    let feeds = config.build_feeds()?;

    // Populate the store from the feeds first; correlation reads a snapshot.
    let store: Arc<MemoryStore> = Arc::new(MemoryStore::new());
    let coordinator = IngestionCoordinator::new(
        feeds,
        store.clone(),
        Distributor::new(Vec::new(), Duration::from_secs(config.sink_timeout_secs)),
        Arc::new(ThresholdScorer::default()),
        Duration::from_secs(config.feed_timeout_secs),
    );
    coordinator.run_cycle(&CancelToken::new()).await;

    let scheduler = CorrelationScheduler::with_default_rules(store);
    let report = scheduler.run_cycle().await;

    println!("🔗 Correlation cycle: {} rules evaluated", report.rules_evaluated);
    for (rule, err) in &report.rule_errors {
        println!("⚠️  {rule}: {err}");
    }
    if report.findings.is_empty() {
        println!("   No findings.");
    }
    for finding in &report.findings {
        println!("   [{}] {} ({} indicators)", finding.rule, finding.summary, finding.indicators.len());
    }
    Ok(())
}

async fn run_status(config_path: &PathBuf) -> Result<()> {
    let config = Config::load(config_path)?;
    let sinks = config.build_sinks()?;

    let tracker = StatusTracker::new();
    let summary = tracker.summary(&sinks).await;

    println!("🩺 Overall health: {:?}\n", summary.overall);
    for (sink, health) in &summary.sinks {
        let marker = if health.connected { "✅" } else { "❌" };
        println!("{marker} {sink}: {}", health.detail);
    }
    Ok(())
}

/// Full pipeline against sample feeds and in-memory sinks
async fn run_demo() -> Result<()> {
    println!("🛰️  Vigil end-to-end demo\n");

    let feeds: Vec<SharedFeed> = vec![
        Arc::new(StaticFeed::sample("sample-a")),
        Arc::new(StaticFeed::sample("sample-b")),
    ];
    let sinks: Vec<SharedSink> = vec![
        Arc::new(MemorySink::new("index-1")),
        Arc::new(MemorySink::new("index-2")),
    ];
    let store: Arc<MemoryStore> = Arc::new(MemoryStore::new());
    let tracker = StatusTracker::new();

    let coordinator = IngestionCoordinator::new(
        feeds,
        store.clone(),
        Distributor::new(sinks.clone(), Duration::from_secs(5)),
        Arc::new(ThresholdScorer::default()),
        Duration::from_secs(5),
    );
    let report = coordinator.run_cycle(&CancelToken::new()).await;
    print_cycle_report(&report);
    tracker.record_cycle(report);

    let aggregator = SearchAggregator::new(sinks.clone(), Duration::from_secs(5));
    let result = aggregator.search("evil", 10).await;
    println!("\n🔍 Search \"evil\": {} combined results", result.combined.len());

    let scheduler = CorrelationScheduler::with_default_rules(store.clone());
    let correlation = scheduler.run_cycle().await;
    println!("🔗 Correlation: {} findings", correlation.findings.len());
    tracker.record_correlation(correlation);

    let summary = tracker.summary(&sinks).await;
    let stats = store.stats().await.map_err(|e| anyhow::anyhow!(e.to_string()))?;
    println!("\n🩺 Health: {:?} | Store: {} active indicators", summary.overall, stats.active);
    Ok(())
}

fn print_cycle_report(report: &CycleReport) {
    let marker = match report.status {
        CycleStatus::Completed => "✅",
        CycleStatus::CompletedWithErrors => "⚠️ ",
    };
    println!(
        "{marker} Cycle {}: {} seen, {} merged, {} malformed, {} benign",
        report.cycle_id,
        report.records_seen,
        report.records_merged,
        report.records_malformed,
        report.records_benign
    );
    for (feed, err) in &report.feed_errors {
        println!("   ❌ feed {feed}: {err}");
    }
    for err in &report.store_errors {
        println!("   ❌ store: {err}");
    }
    for fanout in &report.distribution {
        for (sink, outcome) in &fanout.per_sink {
            if let DeliveryOutcome::Failed(reason) = outcome {
                println!("   ⚠️  {} -> {sink}: {reason}", fanout.doc_id);
            }
        }
    }
}
