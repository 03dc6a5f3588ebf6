//! Command-line and environment configuration for the server binary.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use empcache_core::DEFAULT_PAGE_SIZE;

use crate::network::NetworkConfig;
use crate::service::WarmerConfig;
use crate::storage::CacheConfig;

/// Server settings. Every flag can also be set through its environment
/// variable.
#[derive(Parser, Debug, Clone)]
#[command(name = "empcache-server", version, about = "Employee page cache server")]
pub struct AppConfig {
    /// Bind address for the HTTP server
    #[arg(long, env = "EMPCACHE_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// HTTP port
    #[arg(long, env = "EMPCACHE_PORT", default_value_t = 8000)]
    pub port: u16,

    /// `PostgreSQL` URL of the employee table. Needs the `postgres` feature;
    /// without it an in-memory table is used.
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: Option<String>,

    /// Synthetic records loaded into the in-memory table
    #[arg(long, env = "EMPCACHE_SEED_RECORDS", default_value_t = 0)]
    pub seed_records: u64,

    /// Page cache entry lifetime in seconds; 0 disables expiry
    #[arg(long, env = "CACHE_TIMEOUT_SECONDS", default_value_t = 600)]
    pub cache_ttl_secs: u64,

    /// Path of the JSON-lines progress log
    #[arg(long, env = "PROGRESS_LOG_PATH", default_value = "progress.log")]
    pub progress_log: PathBuf,

    /// Seconds between scheduled cache refreshes
    #[arg(
        long,
        env = "EMPCACHE_REFRESH_INTERVAL_SECS",
        default_value_t = 300,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub refresh_interval_secs: u64,

    /// Records per page
    #[arg(long, env = "EMPCACHE_PAGE_SIZE", default_value_t = DEFAULT_PAGE_SIZE)]
    pub page_size: usize,

    /// Queue a full refresh when the server starts
    #[arg(long, env = "EMPCACHE_REFRESH_ON_STARTUP", default_value_t = false)]
    pub refresh_on_startup: bool,

    /// Record a FAILED event when a scheduled refresh errors
    #[arg(long, env = "EMPCACHE_MARK_FAILED_RUNS", default_value_t = false)]
    pub mark_failed_runs: bool,

    /// Emit logs as JSON lines
    #[arg(long, env = "EMPCACHE_LOG_JSON", default_value_t = false)]
    pub log_json: bool,

    /// Serve Prometheus metrics on this port
    #[arg(long, env = "EMPCACHE_METRICS_PORT")]
    pub metrics_port: Option<u16>,
}

impl AppConfig {
    #[must_use]
    pub fn network_config(&self) -> NetworkConfig {
        NetworkConfig {
            host: self.host.clone(),
            port: self.port,
            ..NetworkConfig::default()
        }
    }

    #[must_use]
    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig {
            ttl: Duration::from_secs(self.cache_ttl_secs),
        }
    }

    #[must_use]
    pub fn warmer_config(&self) -> WarmerConfig {
        WarmerConfig {
            page_size: self.page_size,
            refresh_interval_ms: self.refresh_interval_secs.saturating_mul(1000),
            refresh_on_startup: self.refresh_on_startup,
            mark_failed_runs: self.mark_failed_runs,
            ..WarmerConfig::default()
        }
    }

    /// Address of the Prometheus listener, if enabled.
    #[must_use]
    pub fn metrics_addr(&self) -> Option<SocketAddr> {
        self.metrics_port
            .map(|port| SocketAddr::from(([0, 0, 0, 0], port)))
    }
}
