//! Normalizer Data Types
//!
//! The canonical request shape sent to the processing service, and the natural
//! key used to find the stored row again.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Owner assigned to records that do not name one.
///
/// Older record generations never stored an owner; "system" is the single
/// sentinel used for them everywhere in this service.
pub const ANONYMOUS_OWNER: &str = "system";

/// Where the document lives in object storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageLocation {
    pub bucket: String,
    pub key: String,
}

/// The natural key of a stored row, across both schema generations.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "schema", rename_all = "lowercase")]
pub enum RecordKey {
    /// Current generation: `fileId` + `uploadedBy`.
    Composite {
        #[serde(rename = "fileId")]
        file_id: String,
        #[serde(rename = "uploadedBy")]
        uploaded_by: String,
    },
    /// Legacy generation: flat `id`.
    Legacy { id: String },
}

impl RecordKey {
    pub fn composite(file_id: impl Into<String>, uploaded_by: impl Into<String>) -> Self {
        Self::Composite {
            file_id: file_id.into(),
            uploaded_by: uploaded_by.into(),
        }
    }

    pub fn legacy(id: impl Into<String>) -> Self {
        Self::Legacy { id: id.into() }
    }

    pub fn document_id(&self) -> &str {
        match self {
            Self::Composite { file_id, .. } => file_id,
            Self::Legacy { id } => id,
        }
    }

    pub fn owner_id(&self) -> &str {
        match self {
            Self::Composite { uploaded_by, .. } => uploaded_by,
            Self::Legacy { .. } => ANONYMOUS_OWNER,
        }
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Composite {
                file_id,
                uploaded_by,
            } => write!(f, "{}/{}", file_id, uploaded_by),
            Self::Legacy { id } => write!(f, "{}", id),
        }
    }
}

/// Canonical request for one processing attempt.
///
/// `document_id` + `owner_id` identify the attempt. Optional fields that are
/// absent are left out of the serialized payload entirely; the processing
/// service rejects explicit nulls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingRequest {
    pub document_id: String,
    pub owner_id: String,
    pub storage_location: StorageLocation,
    pub content_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submitted_at: Option<DateTime<Utc>>,
    /// The row this request was decoded from. Never sent downstream.
    #[serde(skip)]
    pub record_key: Option<RecordKey>,
}

impl ProcessingRequest {
    /// Natural key of the source row, derived from the ids when the request
    /// was built by hand rather than decoded.
    pub fn key(&self) -> RecordKey {
        self.record_key
            .clone()
            .unwrap_or_else(|| RecordKey::composite(&self.document_id, &self.owner_id))
    }
}

/// Normalization failures.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum NormalizeError {
    /// No known schema variant yields the required fields.
    #[error("malformed record: {reason}")]
    MalformedRecord { reason: String },
}
