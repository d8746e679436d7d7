//! Service Configuration
//!
//! Command-line arguments (with environment fallbacks) and the `TriggerConfig`
//! they resolve into. Components receive the config at construction and never
//! read the environment themselves.

use clap::{Parser, ValueEnum};
use std::net::SocketAddr;
use std::time::Duration;

pub const DEFAULT_BIND: &str = "127.0.0.1:8090";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_CLAIM_LEASE_SECS: u64 = 300;
pub const DEFAULT_BATCH_SIZE: usize = 100;
pub const DEFAULT_BATCH_WINDOW_MS: u64 = 500;

/// Where change events come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StreamSource {
    /// The in-process table's change feed, plus `POST /stream/batch`.
    LocalChangeFeed,
    /// Only batches pushed through `POST /stream/batch`.
    Http,
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "document_trigger",
    version,
    about = "Dispatches newly uploaded documents to the processing service"
)]
pub struct Args {
    #[arg(long, env = "TRIGGER_BIND", default_value = DEFAULT_BIND)]
    pub bind: SocketAddr,

    #[arg(long, env = "PROCESSING_SERVICE_URL")]
    pub processing_service_url: String,

    #[arg(long, env = "REQUEST_TIMEOUT_SECS", default_value_t = DEFAULT_REQUEST_TIMEOUT_SECS)]
    pub request_timeout_secs: u64,

    #[arg(
        long,
        env = "STORE_ENDPOINT",
        help = "Base URL of a peer hosting the record table (default: in-process table)"
    )]
    pub store_endpoint: Option<String>,

    #[arg(long, env = "STREAM_SOURCE", value_enum, default_value_t = StreamSource::LocalChangeFeed)]
    pub stream_source: StreamSource,

    #[arg(long, default_value_t = DEFAULT_CLAIM_LEASE_SECS)]
    pub claim_lease_secs: u64,

    #[arg(long, default_value_t = DEFAULT_BATCH_SIZE)]
    pub batch_size: usize,

    #[arg(long, default_value_t = DEFAULT_BATCH_WINDOW_MS)]
    pub batch_window_ms: u64,

    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

#[derive(Debug, Clone)]
pub struct TriggerConfig {
    pub bind_addr: SocketAddr,
    pub store_endpoint: Option<String>,
    pub stream_source: StreamSource,
    pub processing_service_url: String,
    pub request_timeout: Duration,
    pub claim_lease: Duration,
    pub batch_size: usize,
    pub batch_window: Duration,
    pub log_level: tracing::Level,
}

impl TriggerConfig {
    pub fn from_args(args: Args) -> anyhow::Result<Self> {
        let log_level = args
            .log_level
            .parse::<tracing::Level>()
            .map_err(|_| anyhow::anyhow!("invalid log level: {}", args.log_level))?;

        let processing_service_url = args.processing_service_url.trim_end_matches('/').to_string();
        reqwest::Url::parse(&processing_service_url)
            .map_err(|e| anyhow::anyhow!("invalid processing service url: {}", e))?;

        if args.batch_size == 0 {
            anyhow::bail!("--batch-size must be at least 1");
        }

        // A peer-hosted table has no local change feed to consume.
        let stream_source = match (&args.store_endpoint, args.stream_source) {
            // A peer-hosted table has no local feed.
            (Some(_), StreamSource::LocalChangeFeed) => StreamSource::Http,
            (_, source) => source,
        };

        Ok(Self {
            bind_addr: args.bind,
            store_endpoint: args.store_endpoint,
            stream_source,
            processing_service_url,
            request_timeout: Duration::from_secs(args.request_timeout_secs),
            claim_lease: Duration::from_secs(args.claim_lease_secs),
            batch_size: args.batch_size,
            batch_window: Duration::from_millis(args.batch_window_ms),
            log_level,
        })
    }

    /// Config with defaults for everything but the processing service.
    pub fn for_service(processing_service_url: &str) -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 8090)),
            store_endpoint: None,
            stream_source: StreamSource::LocalChangeFeed,
            processing_service_url: processing_service_url.trim_end_matches('/').to_string(),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            claim_lease: Duration::from_secs(DEFAULT_CLAIM_LEASE_SECS),
            batch_size: DEFAULT_BATCH_SIZE,
            batch_window: Duration::from_millis(DEFAULT_BATCH_WINDOW_MS),
            log_level: tracing::Level::INFO,
        }
    }
}
