//! Status Store Accessor
//!
//! Read path for status queries, plus the writes the trigger is allowed to make
//! around a dispatch: claim, then mark dispatched, release or reject.
//!
//! ## Claims
//! A claim moves `pending -> processing` with step `dispatch_claimed` and a lease.
//! A lost claim is one of two things:
//! - `Held`: another dispatch holds a live lease at the claim step. Its outcome
//!   is still open, so callers ask for redelivery until the lease settles.
//! - `AlreadyClaimed`: the record moved past the claim step (dispatched,
//!   picked up by the processing service, or finished). A successful no-op.
//!
//! When a dispatch fails in a way the stream will redeliver, the claim is
//! released by expiring its lease; the status stays `processing` and the
//! redelivered event may reclaim it. An accepted dispatch moves the record to
//! step `dispatched`; a refused one moves it to `failed`.

use super::table::{RecordTable, StoreError};
use super::types::{
    CLAIM_STEP, DISPATCHED_STEP, DocumentStatus, REJECTED_STEP, StatusRecord, StatusUpdate,
    UpdateCondition,
};
use crate::normalizer::types::RecordKey;

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum StatusError {
    #[error("document not found: {document_id} (owner {owner_id})")]
    NotFound {
        document_id: String,
        owner_id: String,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Result of a claim attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimOutcome {
    /// This caller now owns dispatch for the record.
    Claimed,
    /// Another dispatch holds a live claim; its outcome is not known yet.
    Held,
    /// The record is past the claim step.
    AlreadyClaimed,
}

#[derive(Clone)]
pub struct StatusAccessor {
    table: Arc<dyn RecordTable>,
}

impl StatusAccessor {
    pub fn new(table: Arc<dyn RecordTable>) -> Self {
        Self { table }
    }

    pub fn table(&self) -> &Arc<dyn RecordTable> {
        &self.table
    }

    /// Looks up a document's status.
    ///
    /// 1. Composite key `(document_id, owner_id)`.
    /// 2. Legacy flat key `document_id`.
    pub async fn get(&self, document_id: &str, owner_id: &str) -> Result<StatusRecord, StatusError> {
        let candidates = [
            RecordKey::composite(document_id, owner_id),
            RecordKey::legacy(document_id),
        ];

        for key in candidates {
            if let Some(record) = self.table.get_item(&key).await? {
                tracing::debug!("Status lookup hit {}", key);
                return StatusRecord::from_record(&key, &record)
                    .map_err(|reason| StatusError::Store(StoreError::Corrupt { key, reason }));
            }
        }

        Err(StatusError::NotFound {
            document_id: document_id.to_string(),
            owner_id: owner_id.to_string(),
        })
    }

    /// Claims a record for dispatch, holding the claim for `lease`.
    pub async fn claim(&self, key: &RecordKey, lease: Duration) -> Result<ClaimOutcome, StoreError> {
        let now = Utc::now();
        let expires = chrono::Duration::from_std(lease)
            .ok()
            .and_then(|lease| now.checked_add_signed(lease))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);

        let update = StatusUpdate::new(DocumentStatus::Processing)
            .with_step(CLAIM_STEP)
            .with_claim_lease(expires);

        match self
            .table
            .update_item(key, &UpdateCondition::Claimable { now }, &update)
            .await
        {
            Ok(true) => {
                tracing::debug!("Claimed {} until {}", key, expires);
                Ok(ClaimOutcome::Claimed)
            }
            Ok(false) => self.lost_claim(key).await,
            // A concurrent writer moved the record to a state we may not leave from.
            Err(StoreError::IllegalTransition { .. }) => Ok(ClaimOutcome::AlreadyClaimed),
            Err(e) => Err(e),
        }
    }

    async fn lost_claim(&self, key: &RecordKey) -> Result<ClaimOutcome, StoreError> {
        let row = self
            .table
            .get_item(key)
            .await?
            .ok_or_else(|| StoreError::NotFound { key: key.clone() })?;

        if UpdateCondition::ClaimHeld.holds(&row) {
            tracing::debug!("Record {} is held by another dispatch", key);
            Ok(ClaimOutcome::Held)
        } else {
            tracing::debug!("Record {} is past the claim step, already claimed", key);
            Ok(ClaimOutcome::AlreadyClaimed)
        }
    }

    /// Records that the processing service accepted the request, ending the claim.
    pub async fn mark_dispatched(&self, key: &RecordKey) -> Result<bool, StoreError> {
        let update = StatusUpdate::new(DocumentStatus::Processing).with_step(DISPATCHED_STEP);

        self.table
            .update_item(key, &UpdateCondition::ClaimHeld, &update)
            .await
    }

    /// Expires a claim so a redelivered event can take it again.
    ///
    /// Only applies while the record still sits at the claim step.
    pub async fn release(&self, key: &RecordKey) -> Result<bool, StoreError> {
        let now = Utc::now();
        let update = StatusUpdate::new(DocumentStatus::Processing)
            .with_step(CLAIM_STEP)
            .with_claim_lease(now);

        let released = self
            .table
            .update_item(key, &UpdateCondition::ClaimHeld, &update)
            .await?;

        if released {
            tracing::debug!("Released claim on {}", key);
        }
        Ok(released)
    }

    /// Marks a claimed record failed after the processing service refused it.
    ///
    /// Only applies while the record still sits at the claim step; a record the
    /// processing service already picked up is left alone.
    pub async fn reject(&self, key: &RecordKey, error: &str) -> Result<bool, StoreError> {
        let update = StatusUpdate::new(DocumentStatus::Failed)
            .with_step(REJECTED_STEP)
            .with_error(error);

        let rejected = self
            .table
            .update_item(key, &UpdateCondition::ClaimHeld, &update)
            .await?;

        if rejected {
            tracing::debug!("Marked {} failed: {}", key, error);
        }
        Ok(rejected)
    }
}
