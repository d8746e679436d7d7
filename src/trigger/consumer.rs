//! Stream Consumer
//!
//! Drains the table's change feed into batches and hands each batch to the
//! pipeline on its own task.
//!
//! A batch closes when it reaches `batch_size` events or when `batch_window`
//! has passed since its first event. The local feed has no upstream to
//! redeliver from, so events the pipeline reports as retryable are fed back
//! into the channel after `redelivery_delay`.

use super::pipeline::TriggerPipeline;
use crate::config::TriggerConfig;
use crate::stream::types::ChangeEvent;

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;

pub const DEFAULT_REDELIVERY_DELAY: Duration = Duration::from_secs(2);

pub struct StreamConsumer {
    pipeline: Arc<TriggerPipeline>,
    batch_size: usize,
    batch_window: Duration,
    redelivery_delay: Duration,
}

impl StreamConsumer {
    pub fn new(pipeline: Arc<TriggerPipeline>, config: &TriggerConfig) -> Self {
        Self {
            pipeline,
            batch_size: config.batch_size.max(1),
            batch_window: config.batch_window,
            redelivery_delay: DEFAULT_REDELIVERY_DELAY,
        }
    }

    pub fn with_redelivery_delay(mut self, delay: Duration) -> Self {
        self.redelivery_delay = delay;
        self
    }

    /// Starts consuming `feed` in the background.
    ///
    /// `redeliver` is where retryable events are sent back to; usually a clone of
    /// the sender that feeds `feed`. Only a weak handle is kept, so the consumer
    /// stops once every producer is gone.
    pub fn start(
        self,
        feed: mpsc::Receiver<ChangeEvent>,
        redeliver: &mpsc::Sender<ChangeEvent>,
    ) -> JoinHandle<()> {
        let redeliver = redeliver.downgrade();
        tokio::spawn(async move {
            self.run(feed, redeliver).await;
        })
    }

    async fn run(
        self,
        mut feed: mpsc::Receiver<ChangeEvent>,
        redeliver: mpsc::WeakSender<ChangeEvent>,
    ) {
        tracing::info!(
            "Stream consumer started (batch size {}, window {:?})",
            self.batch_size,
            self.batch_window
        );

        loop {
            let Some(first) = feed.recv().await else {
                break;
            };

            let (batch, closed) = self.collect_batch(first, &mut feed).await;
            tracing::debug!("Collected batch of {} events", batch.len());

            let pipeline = self.pipeline.clone();
            let redeliver = redeliver.clone();
            let delay = self.redelivery_delay;
            tokio::spawn(async move {
                let report = pipeline.handle_batch(&batch).await;
                if report.batch_item_failures.is_empty() {
                    return;
                }

                let failed: HashSet<&str> = report
                    .batch_item_failures
                    .iter()
                    .map(|f| f.item_identifier.as_str())
                    .collect();
                let retry: Vec<ChangeEvent> = batch
                    .iter()
                    .filter(|e| e.event_id.as_deref().is_some_and(|id| failed.contains(id)))
                    .cloned()
                    .collect();

                tracing::info!("Redelivering {} events in {:?}", retry.len(), delay);
                tokio::time::sleep(delay).await;
                let Some(redeliver) = redeliver.upgrade() else {
                    tracing::warn!("Change feed closed, dropping {} redeliveries", retry.len());
                    return;
                };
                for event in retry {
                    if redeliver.send(event).await.is_err() {
                        tracing::warn!("Change feed closed, dropping redelivery");
                        break;
                    }
                }
            });

            if closed {
                break;
            }
        }

        tracing::info!("Stream consumer stopped: change feed closed");
    }

    /// Fills a batch starting with `first`. Returns whether the feed closed.
    async fn collect_batch(
        &self,
        first: ChangeEvent,
        feed: &mut mpsc::Receiver<ChangeEvent>,
    ) -> (Vec<ChangeEvent>, bool) {
        let deadline = Instant::now() + self.batch_window;
        let mut batch = vec![first];

        while batch.len() < self.batch_size {
            match tokio::time::timeout_at(deadline, feed.recv()).await {
                Ok(Some(event)) => batch.push(event),
                Ok(None) => return (batch, true),
                Err(_) => break,
            }
        }

        (batch, false)
    }
}
