//! `empcache` server binary.
//!
//! Wires the record source, page cache, progress log and cache warmer
//! together, starts the refresh scheduler, and serves HTTP until Ctrl-C.

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use empcache_server::network::module::ServiceHandles;
use empcache_server::network::NetworkModule;
use empcache_server::service::{
    BackgroundWorker, CacheWarmer, ReadPath, ResumeTrigger, StartupHook, WarmerRunnable,
};
use empcache_server::storage::datastores::MemoryRecordSource;
use empcache_server::storage::engines::MemoryCacheEngine;
use empcache_server::storage::PageCache;
use empcache_server::{AppConfig, ProgressLog, RecordSource};

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[cfg(feature = "postgres")]
async fn record_source(config: &AppConfig) -> anyhow::Result<Arc<dyn RecordSource>> {
    use empcache_server::storage::datastores::PgRecordSource;

    if let Some(url) = config.database_url.as_deref() {
        let source = PgRecordSource::connect(url, 5)
            .await
            .context("connecting to the employee database")?;
        info!("reading employees from PostgreSQL");
        return Ok(Arc::new(source));
    }
    Ok(memory_source(config))
}

#[cfg(not(feature = "postgres"))]
async fn record_source(config: &AppConfig) -> anyhow::Result<Arc<dyn RecordSource>> {
    if config.database_url.is_some() {
        warn!("DATABASE_URL is set but the postgres feature is disabled; using the in-memory table");
    }
    Ok(memory_source(config))
}

fn memory_source(config: &AppConfig) -> Arc<dyn RecordSource> {
    info!(records = config.seed_records, "reading employees from the in-memory table");
    Arc::new(MemoryRecordSource::seeded(config.seed_records))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::parse();
    init_tracing(config.log_json);

    if let Some(addr) = config.metrics_addr() {
        PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()
            .context("installing the Prometheus exporter")?;
        info!(%addr, "metrics exporter listening");
    }

    let source = record_source(&config).await?;
    let cache = Arc::new(PageCache::new(
        Arc::new(MemoryCacheEngine::new()),
        config.cache_config(),
    ));
    let progress = Arc::new(
        ProgressLog::open(&config.progress_log).context("opening the progress log")?,
    );
    let warmer_config = config.warmer_config();
    let job_name: Arc<str> = Arc::from(warmer_config.job_name.as_str());
    let refresh_interval_ms = warmer_config.refresh_interval_ms;
    let refresh_on_startup = warmer_config.refresh_on_startup;

    let warmer = Arc::new(CacheWarmer::new(
        Arc::clone(&source),
        Arc::clone(&cache),
        Arc::clone(&progress),
        warmer_config,
    ));
    let mut scheduler = BackgroundWorker::start(WarmerRunnable::new(warmer), refresh_interval_ms);
    let jobs = Arc::new(
        scheduler
            .sender()
            .context("refresh scheduler stopped before startup")?,
    );

    let trigger = ResumeTrigger::new(Arc::clone(&progress), jobs.clone(), job_name.to_string());
    StartupHook::new(trigger, refresh_on_startup).run_once().await;

    let services = ServiceHandles {
        read_path: Arc::new(ReadPath::new(source, Arc::clone(&cache), config.page_size)),
        jobs,
        progress,
        cache,
        job_name,
    };
    let mut network = NetworkModule::new(config.network_config(), services);
    let serving = network.shutdown_controller();
    let port = network.start().await?;
    info!(port, "empcache server started");

    let served = network
        .serve(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "failed to listen for Ctrl-C");
                std::future::pending::<()>().await;
            }
        })
        .await;

    scheduler.stop().await;
    info!(state = serving.health_state().as_str(), "empcache server stopped");
    served
}
