use anyhow::{Context, Result};
use clap::Parser;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::collections::HashMap;
use std::fs::File;
use std::future::Future;
use std::io::{self, BufWriter, Write};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use sale_monitor::cli::{Cli, Commands, HistoryCommand};
use sale_monitor::config::{LoggingConfig, MetricsConfig};
use sale_monitor::storage::{read_products, PriceHistoryStore};
use sale_monitor::web::{self, AppState};
use sale_monitor::{AppConfig, CheckScheduler, PriceExtractor, PriceMonitor};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let mut config = AppConfig::from_env().context("failed to load configuration")?;
    cli.apply_overrides(&mut config);
    config.validate().context("invalid configuration")?;

    let _log_guard = init_tracing(&config.logging)?;
    init_metrics(&config.metrics)?;

    match cli.command.unwrap_or(Commands::Check) {
        Commands::Check => run_check(&config).await,
        Commands::Watch { .. } => run_watch(&config).await,
        Commands::Serve { watch, .. } => run_serve(&config, watch).await,
        Commands::Extract { url, selector } => run_extract(&config, &url, &selector).await,
        Commands::History(command) => run_history(&config, command).await,
    }
}

fn init_tracing(config: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(format!("{},tower_http=info,sqlx=warn", config.level)))?;

    let (file_layer, guard) = match &config.directory {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "sale-monitor.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer().with_writer(writer).with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .try_init()?;

    Ok(guard)
}

fn init_metrics(config: &MetricsConfig) -> Result<()> {
    if !config.enabled {
        return Ok(());
    }

    PrometheusBuilder::new()
        .with_http_listener(([0, 0, 0, 0], config.port))
        .install()
        .context("failed to install Prometheus exporter")?;

    info!("Metrics exporter listening on port {}", config.port);
    Ok(())
}

/// Resolves once Ctrl+C is received; every clone of the receiver sees it.
fn shutdown_channel() -> watch::Receiver<bool> {
    let (tx, rx) = watch::channel(false);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Shutdown signal received"),
            Err(e) => warn!("Failed to listen for Ctrl+C: {}", e),
        }
        let _ = tx.send(true);
    });
    rx
}

fn wait_for(mut rx: watch::Receiver<bool>) -> impl Future<Output = ()> + Send + 'static {
    async move {
        let _ = rx.wait_for(|stopped| *stopped).await;
    }
}

async fn run_check(config: &AppConfig) -> Result<()> {
    let monitor = PriceMonitor::from_config(config).await?;
    let summary = monitor.run_cycle().await?;

    println!(
        "Checked {} products: {} updated, {} failed, {} notifications sent",
        summary.checked, summary.updated, summary.failed, summary.notifications_sent
    );
    Ok(())
}

async fn run_watch(config: &AppConfig) -> Result<()> {
    let monitor = Arc::new(PriceMonitor::from_config(config).await?);
    let scheduler = CheckScheduler::new(monitor, &config.scheduler, config.storage.history_retention_days);

    scheduler.run_until(wait_for(shutdown_channel())).await;

    let stats = scheduler.stats().await;
    info!(
        "Watch finished after {} cycles ({} failed)",
        stats.completed_runs, stats.failed_runs
    );
    Ok(())
}

async fn run_serve(config: &AppConfig, with_scheduler: bool) -> Result<()> {
    let monitor = Arc::new(PriceMonitor::from_config(config).await?);
    let history = monitor
        .history()
        .cloned()
        .context("price history store is not configured")?;
    let shutdown = shutdown_channel();

    let scheduler_task = if with_scheduler {
        let scheduler = CheckScheduler::new(
            monitor.clone(),
            &config.scheduler,
            config.storage.history_retention_days,
        );
        let signal = wait_for(shutdown.clone());
        Some(tokio::spawn(async move { scheduler.run_until(signal).await }))
    } else {
        None
    };

    let state = AppState { monitor, history };
    web::serve(&config.server, state, wait_for(shutdown)).await?;

    if let Some(task) = scheduler_task {
        task.await?;
    }
    Ok(())
}

async fn run_extract(config: &AppConfig, url: &str, selector: &str) -> Result<()> {
    let extractor = PriceExtractor::new(&config.scraper)?;
    let result = extractor.extract_price(url, selector).await;

    match result.price() {
        Some(price) => println!("${:.2} (via {})", price, result.source_tag()),
        None => {
            println!("No price found at {}", url);
            if let Some(detection) = extractor.detector().last_detection() {
                println!(
                    "Detected {} selector '{}' but it held no parseable price",
                    detection.platform, detection.selector
                );
            }
        }
    }
    Ok(())
}

async fn run_history(config: &AppConfig, command: HistoryCommand) -> Result<()> {
    let store = PriceHistoryStore::open(&config.storage.history_db).await?;

    match command {
        HistoryCommand::Export { output, url } => {
            let rows = match &output {
                Some(path) => {
                    let file = File::create(path)
                        .with_context(|| format!("failed to create {}", path.display()))?;
                    store.export_csv(BufWriter::new(file), url.as_deref()).await?
                }
                None => {
                    let mut buffer = Vec::new();
                    let rows = store.export_csv(&mut buffer, url.as_deref()).await?;
                    io::stdout().write_all(&buffer)?;
                    rows
                }
            };
            if let Some(path) = output {
                println!("Exported {} records to {}", rows, path.display());
            }
        }
        HistoryCommand::Cleanup { .. } => {
            let days = config.storage.history_retention_days;
            if days == 0 {
                println!("Retention is 0 days; keeping all records");
            } else {
                let deleted = store.cleanup_old_records(days).await?;
                println!("Deleted {} records older than {} days", deleted, days);
            }
        }
        HistoryCommand::NormalizeNames { apply } => {
            let names: HashMap<String, String> = read_products(&config.storage.products_csv)?
                .into_iter()
                .map(|p| (p.url, p.name))
                .collect();

            if apply {
                let updated = store.normalize_names(&names).await?;
                println!("Updated {} history records", updated);
            } else {
                let pending = store.count_name_mismatches(&names).await?;
                println!("{} history records would be renamed (use --apply to write)", pending);
            }
        }
    }
    Ok(())
}
