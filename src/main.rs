use clap::Parser;
use document_trigger::config::{Args, StreamSource, TriggerConfig};
use document_trigger::dispatch::client::DispatchClient;
use document_trigger::status::accessor::StatusAccessor;
use document_trigger::status::memory::MemoryRecordTable;
use document_trigger::status::remote::RemoteRecordTable;
use document_trigger::status::table::RecordTable;
use document_trigger::trigger::consumer::StreamConsumer;
use document_trigger::trigger::handlers::{ENDPOINT_STREAM_BATCH, router};
use document_trigger::trigger::pipeline::TriggerPipeline;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

const CHANGE_FEED_CAPACITY: usize = 1024;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let requested_source = args.stream_source;
    let config = TriggerConfig::from_args(args)?;

    tracing_subscriber::fmt().with_max_level(config.log_level).init();

    if config.stream_source != requested_source {
        tracing::warn!(
            "Remote store configured, falling back to {:?} stream source",
            config.stream_source
        );
    }

    tracing::info!("Starting document trigger on {}", config.bind_addr);
    tracing::info!("Processing service: {}", config.processing_service_url);

    // 1. Record table:
    let mut local_table: Option<Arc<MemoryRecordTable>> = None;
    let mut change_feed = None;

    let table: Arc<dyn RecordTable> = match &config.store_endpoint {
        Some(endpoint) => {
            tracing::info!("Using remote record table at {}", endpoint);
            Arc::new(RemoteRecordTable::new(endpoint, config.request_timeout))
        }
        None => {
            tracing::info!("Using in-process record table");
            let memory = match config.stream_source {
                StreamSource::LocalChangeFeed => {
                    let (tx, rx) = mpsc::channel(CHANGE_FEED_CAPACITY);
                    let memory = MemoryRecordTable::with_change_feed(tx.clone());
                    change_feed = Some((tx, rx));
                    memory
                }
                StreamSource::Http => MemoryRecordTable::new(),
            };
            let memory = Arc::new(memory);
            local_table = Some(memory.clone());
            memory
        }
    };

    // 2. Pipeline:
    let accessor = StatusAccessor::new(table.clone());
    let pipeline = Arc::new(TriggerPipeline::new(
        accessor.clone(),
        DispatchClient::new(&config),
        config.claim_lease,
    ));

    // 3. Change feed consumer:
    if let Some((tx, rx)) = change_feed {
        StreamConsumer::new(pipeline.clone(), &config).start(rx, &tx);
    } else {
        tracing::info!("Accepting stream batches on {}", ENDPOINT_STREAM_BATCH);
    }

    // 4. HTTP Router:
    let app = router(pipeline, accessor, table);

    // 5. Spawn stats reporter:
    if let Some(stats_table) = local_table {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(30));

            loop {
                interval.tick().await;
                let (pending, processing, completed, failed) = stats_table.status_counts();
                tracing::info!(
                    "Table stats: {} records (pending={} processing={} completed={} failed={})",
                    stats_table.len(),
                    pending,
                    processing,
                    completed,
                    failed
                );
            }
        });
    }

    // 6. Start HTTP server:
    tracing::info!("HTTP server listening on {}", config.bind_addr);
    tracing::info!("Press Ctrl+C to shutdown");

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
