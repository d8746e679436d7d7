//! Record Table Abstraction
//!
//! The backing table that stores document rows. Two implementations exist:
//! - **`MemoryRecordTable`**: in-process, with an optional change feed.
//! - **`RemoteRecordTable`**: HTTP client for a table hosted by a peer node.

use super::types::{DocumentStatus, StatusUpdate, UpdateCondition};
use crate::normalizer::types::RecordKey;
use crate::stream::types::RawRecord;

use async_trait::async_trait;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("record not found: {key}")]
    NotFound { key: RecordKey },

    #[error("record already exists: {key}")]
    AlreadyExists { key: RecordKey },

    #[error("record has no natural key (expected fileId or id)")]
    MissingKey,

    /// The write would break the lifecycle state machine.
    #[error("illegal status transition for {key}: {from} -> {to}")]
    IllegalTransition {
        key: RecordKey,
        from: DocumentStatus,
        to: DocumentStatus,
    },

    #[error("stored record {key} is corrupt: {reason}")]
    Corrupt { key: RecordKey, reason: String },

    /// The table could not be reached; the operation may succeed on retry.
    #[error("status table unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }
}

/// Row-level access to the document table.
///
/// Every method is atomic per key; no cross-key transactions are offered.
#[async_trait]
pub trait RecordTable: Send + Sync {
    async fn get_item(&self, key: &RecordKey) -> Result<Option<RawRecord>, StoreError>;

    /// Inserts a new row. Fails with `AlreadyExists` when the key is taken.
    async fn put_item(&self, record: RawRecord) -> Result<RecordKey, StoreError>;

    /// Applies `update` when `condition` holds.
    ///
    /// Returns `Ok(false)` when the condition does not hold, and
    /// `IllegalTransition` when it holds but the state machine forbids the write.
    async fn update_item(
        &self,
        key: &RecordKey,
        condition: &UpdateCondition,
        update: &StatusUpdate,
    ) -> Result<bool, StoreError>;
}
