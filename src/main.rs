use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::TimeDelta;
use clap::Parser;
use color_eyre::eyre::{Result, WrapErr, eyre};
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use slidecache::application::services::{
    ImageStorageService, OfflineQueue, SlideImageResolver, StorageContext, UsageMonitor,
};
use slidecache::application::use_cases::{
    BootstrapOptions, BootstrapOutcome, BootstrapStorageUseCase,
};
use slidecache::domain::entities::SlideId;
use slidecache::domain::ports::{
    KeyValueStore, OperationHandler, PublishedImagePort, QueueStoragePort,
};
use slidecache::infrastructure::config::{AppConfig, CliArgs, Command, StorageManager};
use slidecache::infrastructure::publish::{
    AnalyticsEventHandler, HttpPublishClient, ImageUploadHandler, LocalOnlyPublishedSource,
    UploadImage,
};
use slidecache::infrastructure::storage::{
    JsonFileKeyValueStore, JsonQueueStore, MemoryKeyValueStore, MemoryQueueStore,
    StorageAvailabilityDetector,
};

fn init_logging(config: &AppConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.to_string()));

    if let Some(log_path) = config.effective_log_path() {
        if let Some(parent) = log_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)?;

        let file_layer = fmt::layer()
            .with_writer(file)
            .with_ansi(false)
            .with_target(true)
            .with_thread_ids(false);

        tracing_subscriber::registry()
            .with(filter)
            .with(file_layer)
            .init();

        info!(path = %log_path.display(), "Logging initialized");
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();
    }

    Ok(())
}

fn load_config(args: &CliArgs) -> Result<AppConfig> {
    let manager = StorageManager::new().wrap_err("failed to locate config directory")?;
    let mut config = manager
        .load_config(args.config.as_deref())
        .wrap_err("failed to load config")?;
    config.merge_with_args(args);
    Ok(config)
}

fn legacy_store(config: &AppConfig) -> Result<Arc<dyn KeyValueStore>> {
    match config.effective_legacy_path() {
        Some(path) => Ok(Arc::new(
            JsonFileKeyValueStore::open(path).wrap_err("failed to open legacy store")?,
        )),
        None => Ok(Arc::new(MemoryKeyValueStore::new())),
    }
}

fn publish_client(config: &AppConfig) -> Result<Option<Arc<HttpPublishClient>>> {
    config
        .publish
        .endpoint
        .as_ref()
        .map(|endpoint| {
            HttpPublishClient::new(endpoint, Duration::from_secs(config.publish.timeout_secs))
                .map(Arc::new)
                .wrap_err("failed to create publish client")
        })
        .transpose()
}

async fn bootstrap(config: &AppConfig) -> Result<BootstrapOutcome> {
    let root = config
        .effective_storage_root()
        .ok_or_else(|| eyre!("cannot determine storage directory"))?;

    let mut options = BootstrapOptions::new(root, config.storage.quota_bytes);
    options.memory_only = config.storage.memory_only;

    let outcome = BootstrapStorageUseCase::new(
        options,
        legacy_store(config)?,
        Arc::new(config.identifiers.migration.clone()),
    )
    .execute()
    .await;

    if let Some(notice) = outcome.context.notice() {
        eprintln!("warning: {notice}");
    }
    Ok(outcome)
}

fn resolver(config: &AppConfig, context: Arc<StorageContext>) -> Result<SlideImageResolver> {
    let published: Arc<dyn PublishedImagePort> = match publish_client(config)? {
        Some(client) => client,
        None => Arc::new(LocalOnlyPublishedSource),
    };

    Ok(SlideImageResolver::new(
        context,
        published,
        Arc::new(config.identifiers.legacy.clone()),
    )
    .with_dedup_ttl(Duration::from_millis(config.dedup_ttl_ms)))
}

async fn run_status(config: &AppConfig) -> Result<()> {
    let outcome = bootstrap(config).await?;
    let context = outcome.context;

    let service = ImageStorageService::new(Arc::clone(&context), config.cleanup);
    let usage = service.usage_snapshot().await?;
    let status = resolver(config, Arc::clone(&context))?
        .publishing_status()
        .await?;

    println!("mode:       {}", context.mode());
    println!("usage:      {usage} ({:?})", usage.level());
    println!("publishing: {status}");
    Ok(())
}

async fn run_resolve(config: &AppConfig, slides: Vec<String>) -> Result<()> {
    let outcome = bootstrap(config).await?;
    let resolver = resolver(config, outcome.context)?;

    let slides: Vec<SlideId> = slides.into_iter().map(SlideId::from).collect();
    let results = resolver.prefetch(&slides).await;

    for (slide, result) in slides.iter().zip(results) {
        match result? {
            Some(image) => println!(
                "{slide}: {} [{:?}{}] {}",
                image.id,
                image.source,
                if image.is_published { ", published" } else { "" },
                image.url
            ),
            None => println!("{slide}: no image"),
        }
    }
    Ok(())
}

async fn run_migrate(config: &AppConfig) -> Result<()> {
    let outcome = bootstrap(config).await?;

    match outcome.migration {
        Some(report) => {
            println!("legacy:      {report}");
            for error in &report.errors {
                println!("  {error}");
            }
        }
        None => println!("legacy:      not run"),
    }
    match outcome.identifiers {
        Some(report) => {
            println!(
                "identifiers: {} renamed, {} discarded",
                report.renamed.len(),
                report.discarded.len()
            );
            for (old, new) in &report.renamed {
                println!("  {old} -> {new}");
            }
        }
        None => println!("identifiers: failed"),
    }
    Ok(())
}

async fn run_cleanup(
    config: &AppConfig,
    max_age_days: Option<u32>,
    max_total_size: Option<u64>,
    keep_recent: Option<usize>,
) -> Result<()> {
    let outcome = bootstrap(config).await?;
    let service = ImageStorageService::new(outcome.context, config.cleanup);

    let mut options = config.cleanup;
    if max_age_days.is_some() {
        options.max_age_days = max_age_days;
    }
    if max_total_size.is_some() {
        options.max_total_size_bytes = max_total_size;
    }
    if let Some(keep) = keep_recent {
        options.keep_recent_count = keep;
    }

    let removed = service.cleanup(&options).await?;
    let usage = service.usage_snapshot().await?;
    println!("removed {removed} image(s); {usage}");
    Ok(())
}

async fn run_publish(config: &AppConfig) -> Result<()> {
    let client = publish_client(config)?.ok_or_else(|| eyre!("no publish endpoint configured"))?;
    let outcome = bootstrap(config).await?;
    let service = ImageStorageService::new(outcome.context, config.cleanup);

    let slides: BTreeMap<SlideId, UploadImage> = service
        .slide_images()
        .await?
        .into_iter()
        .map(|(slide, slide_config, record)| {
            (slide, UploadImage::from_local(&record, &slide_config))
        })
        .collect();
    if slides.is_empty() {
        println!("nothing to publish");
        return Ok(());
    }

    let summary = client.publish_all_slides(&slides).await?;
    println!("published {}/{} slide(s)", summary.success_count, summary.total_count);
    for error in &summary.errors {
        println!("  {error}");
    }
    Ok(())
}

async fn load_queue(config: &AppConfig, online: watch::Receiver<bool>) -> Result<OfflineQueue> {
    let storage: Arc<dyn QueueStoragePort> = match config.effective_queue_path() {
        Some(path) => Arc::new(JsonQueueStore::new(path)),
        None => {
            warn!("No data directory, queue is not persisted");
            Arc::new(MemoryQueueStore::new())
        }
    };

    let timeout = Duration::from_secs(config.publish.timeout_secs);
    let mut handlers: Vec<Arc<dyn OperationHandler>> = Vec::new();
    if let Some(client) = publish_client(config)? {
        handlers.push(Arc::new(ImageUploadHandler::new(client)));
    }
    if let Some(url) = &config.publish.analytics_url {
        handlers.push(Arc::new(AnalyticsEventHandler::new(url.clone(), timeout)?));
    }

    Ok(OfflineQueue::load(storage, handlers, online)
        .await
        .wrap_err("failed to load offline queue")?
        .with_retention(TimeDelta::hours(i64::from(config.queue.retention_hours))))
}

async fn run_flush(config: &AppConfig, offline: bool) -> Result<()> {
    let (_online_tx, online_rx) = watch::channel(!offline);
    let queue = load_queue(config, online_rx).await?;

    let report = queue.flush().await?;
    println!("{report}");
    for (id, error) in &report.failed {
        println!("  {id}: {error}");
    }
    Ok(())
}

async fn run_daemon(config: &AppConfig, offline: bool) -> Result<()> {
    let outcome = bootstrap(config).await?;
    let service = Arc::new(ImageStorageService::new(outcome.context, config.cleanup));

    // Held until shutdown: the reconnect flush task watches this channel.
    let (_online_tx, online_rx) = watch::channel(!offline);
    let queue = Arc::new(load_queue(config, online_rx).await?);

    if !offline {
        match queue.flush().await {
            Ok(report) => info!(%report, "Startup flush complete"),
            Err(e) => warn!(error = %e, "Startup flush failed"),
        }
    }

    let tasks = queue.start_background_flush(Duration::from_secs(config.queue.flush_interval_secs));
    let monitor = UsageMonitor::start(
        service,
        Duration::from_secs(config.storage.usage_interval_secs),
    );

    info!(pending = queue.len().await, "Running until interrupted");
    tokio::signal::ctrl_c()
        .await
        .wrap_err("failed to listen for interrupt")?;

    monitor.shutdown().await;
    for task in tasks {
        task.shutdown().await;
    }
    info!(pending = queue.len().await, "Stopped");
    Ok(())
}

async fn run_probe(config: &AppConfig) -> Result<()> {
    let root = config
        .effective_storage_root()
        .ok_or_else(|| eyre!("cannot determine storage directory"))?;

    let availability = StorageAvailabilityDetector::new(root.clone()).probe().await;
    match availability.reason {
        None => println!("{}: available", root.display()),
        Some(reason) => println!("{}: unavailable ({reason})", root.display()),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let args = CliArgs::parse();
    let config = load_config(&args)?;
    init_logging(&config)?;

    info!(version = slidecache::VERSION, command = ?args.command, "Starting slidecache");

    match args.command {
        Command::Status => run_status(&config).await,
        Command::Resolve { slides } => run_resolve(&config, slides).await,
        Command::Migrate => run_migrate(&config).await,
        Command::Cleanup {
            max_age_days,
            max_total_size,
            keep_recent,
        } => run_cleanup(&config, max_age_days, max_total_size, keep_recent).await,
        Command::Flush { offline } => run_flush(&config, offline).await,
        Command::Publish => run_publish(&config).await,
        Command::Probe => run_probe(&config).await,
        Command::Run { offline } => run_daemon(&config, offline).await,
    }
}
