//! Status Table Network Protocol
//!
//! Endpoints and DTOs used when one node reads or writes the record table
//! hosted by another, and by the public status query surface.

use super::table::StoreError;
use super::types::{DocumentStatus, StatusUpdate, UpdateCondition};
use crate::normalizer::types::RecordKey;
use crate::stream::types::RawRecord;

use serde::{Deserialize, Serialize};

// --- API Endpoints ---

/// Public status query: `/status/:document_id[/:owner_id]`.
pub const ENDPOINT_STATUS: &str = "/status";
pub const ENDPOINT_ITEM_GET: &str = "/internal/item/get";
pub const ENDPOINT_ITEM_PUT: &str = "/internal/item/put";
pub const ENDPOINT_ITEM_UPDATE: &str = "/internal/item/update";

// --- Data Transfer Objects ---

#[derive(Debug, Serialize, Deserialize)]
pub struct GetItemRequest {
    pub key: RecordKey,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GetItemResponse {
    pub item: Option<RawRecord>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PutItemRequest {
    pub item: RawRecord,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PutItemResponse {
    pub key: Option<RecordKey>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<StoreFailure>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UpdateItemRequest {
    pub key: RecordKey,
    pub condition: UpdateCondition,
    pub update: StatusUpdate,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UpdateItemResponse {
    pub applied: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<StoreFailure>,
}

/// Wire form of a `StoreError`, so the caller can rebuild the same variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StoreFailure {
    NotFound,
    AlreadyExists,
    MissingKey,
    IllegalTransition {
        from: DocumentStatus,
        to: DocumentStatus,
    },
    Corrupt {
        reason: String,
    },
    Unavailable {
        reason: String,
    },
}

impl From<&StoreError> for StoreFailure {
    fn from(err: &StoreError) -> Self {
        match err {
            StoreError::NotFound { .. } => Self::NotFound,
            StoreError::AlreadyExists { .. } => Self::AlreadyExists,
            StoreError::MissingKey => Self::MissingKey,
            StoreError::IllegalTransition { from, to, .. } => Self::IllegalTransition {
                from: *from,
                to: *to,
            },
            StoreError::Corrupt { reason, .. } => Self::Corrupt {
                reason: reason.clone(),
            },
            StoreError::Unavailable(reason) => Self::Unavailable {
                reason: reason.clone(),
            },
        }
    }
}

impl StoreFailure {
    pub fn into_error(self, key: RecordKey) -> StoreError {
        match self {
            Self::NotFound => StoreError::NotFound { key },
            Self::AlreadyExists => StoreError::AlreadyExists { key },
            Self::MissingKey => StoreError::MissingKey,
            Self::IllegalTransition { from, to } => StoreError::IllegalTransition { key, from, to },
            Self::Corrupt { reason } => StoreError::Corrupt { key, reason },
            Self::Unavailable { reason } => StoreError::Unavailable(reason),
        }
    }
}
