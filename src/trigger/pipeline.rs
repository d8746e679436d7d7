//! Trigger Pipeline
//!
//! Runs one batch of change events through filter, normalize, claim and
//! dispatch. Every event gets an outcome; a failing record never stops its
//! siblings.
//!
//! ## Per-record flow
//! 1. **Filter**: only pending inserts go further.
//! 2. **Normalize**: malformed records are dropped (redelivery would not help).
//! 3. **Claim**: a record past the claim step is counted and skipped; a claim
//!    still held by another dispatch asks for redelivery. A row missing from
//!    the table is dispatched unclaimed.
//! 4. **Dispatch**: retryable failures release the claim and ask the stream
//!    for redelivery; rejections mark the record failed.

use super::types::{BatchReport, RecordOutcome};
use crate::dispatch::client::DispatchClient;
use crate::dispatch::types::DispatchError;
use crate::normalizer::normalize;
use crate::status::accessor::{ClaimOutcome, StatusAccessor};
use crate::status::table::StoreError;
use crate::stream::filter::pending_inserts;
use crate::stream::types::ChangeEvent;

use std::time::Duration;

pub struct TriggerPipeline {
    accessor: StatusAccessor,
    client: DispatchClient,
    claim_lease: Duration,
}

impl TriggerPipeline {
    pub fn new(accessor: StatusAccessor, client: DispatchClient, claim_lease: Duration) -> Self {
        Self {
            accessor,
            client,
            claim_lease,
        }
    }

    /// Processes a batch in delivery order and summarizes the outcomes.
    pub async fn handle_batch(&self, events: &[ChangeEvent]) -> BatchReport {
        let mut report = BatchReport::new(events.len());
        let mut pending = 0;

        for event in pending_inserts(events) {
            pending += 1;
            let outcome = self.handle_event(event).await;
            report.record(event.event_id.as_deref(), outcome);
        }

        for _ in pending..events.len() {
            report.record(None, RecordOutcome::Skipped);
        }

        tracing::info!(
            "Batch done: {} records, {} dispatched, {} already claimed, {} skipped, {} errors",
            report.total_records,
            report.processed_documents,
            report.already_claimed,
            report.skipped_records,
            report.errors.len()
        );

        report
    }

    /// Runs one pending insert through normalize, claim and dispatch.
    pub async fn handle_event(&self, event: &ChangeEvent) -> RecordOutcome {
        let event_id = event.event_id.as_deref().unwrap_or("-");

        let request = match normalize(&event.new_image) {
            Ok(request) => request,
            Err(e) => {
                tracing::warn!("Dropping event {}: {}", event_id, e);
                return RecordOutcome::Dropped {
                    reason: format!("event {}: {}", event_id, e),
                };
            }
        };

        let key = request.key();

        // Whether this call owns a claim on a stored row.
        let claimed = match self.accessor.claim(&key, self.claim_lease).await {
            Ok(ClaimOutcome::Claimed) => true,
            Ok(ClaimOutcome::Held) => {
                tracing::debug!("Deferring {}: claim held by another dispatch", key);
                return RecordOutcome::Retry {
                    reason: format!("{}: claim held by another dispatch", key),
                };
            }
            Ok(ClaimOutcome::AlreadyClaimed) => {
                tracing::debug!("Skipping {}: already claimed", key);
                return RecordOutcome::AlreadyClaimed {
                    document_id: request.document_id,
                };
            }
            Err(StoreError::NotFound { .. }) => {
                // The row lives in a table this node cannot see; the processing
                // service's own duplicate check is the only guard left.
                tracing::warn!("No stored row for {}, dispatching unclaimed", key);
                false
            }
            Err(e) if e.is_retryable() => {
                tracing::warn!("Could not claim {}: {}", key, e);
                return RecordOutcome::Retry {
                    reason: format!("{}: {}", key, e),
                };
            }
            Err(e) => {
                tracing::error!("Could not claim {}: {}", key, e);
                return RecordOutcome::Dropped {
                    reason: format!("{}: {}", key, e),
                };
            }
        };

        match self.client.dispatch(&request).await {
            Ok(accepted) => {
                tracing::info!(
                    "Dispatched {} (owner {}) -> {}",
                    request.document_id,
                    request.owner_id,
                    accepted.status
                );
                if claimed && let Err(mark_err) = self.accessor.mark_dispatched(&key).await {
                    // The lease expires on its own; redeliveries until then are held.
                    tracing::warn!("Could not record dispatch of {}: {}", key, mark_err);
                }
                RecordOutcome::Dispatched {
                    document_id: request.document_id,
                }
            }
            Err(e) if e.is_retryable() => {
                tracing::warn!("Dispatch of {} failed ({}): {}", key, e.kind(), e);
                if claimed && let Err(release_err) = self.accessor.release(&key).await {
                    // Redeliveries are held until the lease runs out.
                    tracing::warn!("Could not release claim on {}: {}", key, release_err);
                }
                RecordOutcome::Retry {
                    reason: format!("{}: {}", key, e),
                }
            }
            Err(e) => {
                tracing::error!("Dispatch of {} rejected: {}", key, e);
                let detail = match &e {
                    DispatchError::RequestRejected { status, body } => {
                        format!("rejected by processing service ({}): {}", status, body)
                    }
                    other => other.to_string(),
                };
                if claimed && let Err(reject_err) = self.accessor.reject(&key, &detail).await {
                    tracing::warn!("Could not mark {} failed: {}", key, reject_err);
                }
                RecordOutcome::Dropped {
                    reason: format!("{}: {}", key, e),
                }
            }
        }
    }
}
