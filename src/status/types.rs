//! Status Data Types
//!
//! The document lifecycle state machine and the status projection read back by
//! status queries.

use crate::normalizer::schema::parse_timestamp;
use crate::normalizer::types::RecordKey;
use crate::stream::types::{AttributeValue, RawRecord, STATUS_FIELD};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const FIELD_CURRENT_STEP: &str = "current_step";
pub const FIELD_ERROR: &str = "error";
pub const FIELD_VALIDATION_SCORE: &str = "validation_score";
pub const FIELD_PROCESSED_DATE: &str = "processed_date";
pub const FIELD_LAST_UPDATED: &str = "last_updated";
pub const FIELD_CLAIM_EXPIRES_AT: &str = "claim_expires_at";

/// Step recorded while the trigger holds a claim and the processing service
/// has not yet reported progress.
pub const CLAIM_STEP: &str = "dispatch_claimed";

/// Step recorded once the processing service accepted the dispatched request.
pub const DISPATCHED_STEP: &str = "dispatched";

/// Step recorded when the processing service refused the dispatched request.
pub const REJECTED_STEP: &str = "dispatch_rejected";

/// Lifecycle state of a document record.
///
/// ```text
/// pending -> processing -> completed
///                       -> failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    /// Uploaded, waiting for a processing attempt.
    Pending,
    /// Claimed for dispatch or being worked on by the processing service.
    Processing,
    Completed,
    Failed,
}

impl DocumentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Whether a write may move a record from `self` to `next`.
    ///
    /// `processing -> processing` is allowed so the owner can report step changes.
    /// Nothing ever returns to `pending`.
    pub fn can_transition_to(self, next: DocumentStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Processing)
                | (Self::Processing, Self::Processing)
                | (Self::Processing, Self::Completed)
                | (Self::Processing, Self::Failed)
        )
    }
}

impl fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocumentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "processing" => Ok(Self::Processing),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            other => Err(format!("unknown document status: {}", other)),
        }
    }
}

/// Status view of a stored record, as returned to status-query callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusRecord {
    pub document_id: String,
    pub owner_id: String,
    pub status: DocumentStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_step: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,
}

impl StatusRecord {
    /// Projects a stored row onto its status fields.
    ///
    /// Accepts both the snake_case names written by the processing service and
    /// the camelCase names used by newer writers.
    pub fn from_record(key: &RecordKey, record: &RawRecord) -> Result<Self, String> {
        let status = record
            .status()
            .ok_or_else(|| "record has no status".to_string())?
            .parse::<DocumentStatus>()?;

        let text = |snake: &str, camel: &str| {
            record
                .get_str(snake)
                .or_else(|| record.get_str(camel))
                .map(str::to_string)
        };
        let time = |snake: &str, camel: &str| {
            record
                .get_str(snake)
                .or_else(|| record.get_str(camel))
                .and_then(parse_timestamp)
        };

        Ok(Self {
            document_id: key.document_id().to_string(),
            owner_id: key.owner_id().to_string(),
            status,
            current_step: text(FIELD_CURRENT_STEP, "currentStep"),
            error: text(FIELD_ERROR, "error"),
            validation_score: record
                .get_f64(FIELD_VALIDATION_SCORE)
                .or_else(|| record.get_f64("validationScore")),
            processed_at: time(FIELD_PROCESSED_DATE, "processedAt"),
            last_updated: time(FIELD_LAST_UPDATED, "lastUpdated"),
        })
    }
}

/// Guard evaluated atomically with an update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UpdateCondition {
    /// Unconditional write (still subject to the state machine).
    Always,
    /// Current status must equal the given one.
    StatusIs { status: DocumentStatus },
    /// Record is pending, or holds a dispatch claim whose lease ended before `now`.
    Claimable { now: DateTime<Utc> },
    /// Record is processing and still at the dispatch claim step.
    ClaimHeld,
}

impl UpdateCondition {
    pub fn holds(&self, record: &RawRecord) -> bool {
        let current = record.status().and_then(|s| s.parse::<DocumentStatus>().ok());

        match self {
            Self::Always => true,
            Self::StatusIs { status } => current == Some(*status),
            Self::Claimable { now } => match current {
                Some(DocumentStatus::Pending) => true,
                Some(DocumentStatus::Processing) => {
                    record.get_str(FIELD_CURRENT_STEP) == Some(CLAIM_STEP)
                        && record
                            .get_str(FIELD_CLAIM_EXPIRES_AT)
                            .and_then(parse_timestamp)
                            .map(|expires| expires <= *now)
                            .unwrap_or(false)
                }
                _ => false,
            },
            Self::ClaimHeld => {
                current == Some(DocumentStatus::Processing)
                    && record.get_str(FIELD_CURRENT_STEP) == Some(CLAIM_STEP)
            }
        }
    }
}

/// A status write. `None` fields are left untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusUpdate {
    pub status: DocumentStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_step: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processed_at: Option<DateTime<Utc>>,
    /// New end of the dispatch claim lease.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claim_expires_at: Option<DateTime<Utc>>,
}

impl StatusUpdate {
    pub fn new(status: DocumentStatus) -> Self {
        Self {
            status,
            current_step: None,
            error: None,
            validation_score: None,
            processed_at: None,
            claim_expires_at: None,
        }
    }

    pub fn with_step(mut self, step: impl Into<String>) -> Self {
        self.current_step = Some(step.into());
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    pub fn with_validation_score(mut self, score: f64) -> Self {
        self.validation_score = Some(score);
        self
    }

    pub fn with_processed_at(mut self, at: DateTime<Utc>) -> Self {
        self.processed_at = Some(at);
        self
    }

    pub fn with_claim_lease(mut self, expires_at: DateTime<Utc>) -> Self {
        self.claim_expires_at = Some(expires_at);
        self
    }

    /// Writes the update into a stored row, stamping `last_updated`.
    ///
    /// The claim lease is dropped once the record moves past the claim step.
    pub fn apply_to(&self, record: &mut RawRecord, now: DateTime<Utc>) {
        record.set_str(STATUS_FIELD, self.status.as_str());
        record.set_str(FIELD_LAST_UPDATED, now.to_rfc3339());

        if let Some(step) = &self.current_step {
            record.set_str(FIELD_CURRENT_STEP, step.clone());
        }
        if let Some(error) = &self.error {
            record.set_str(FIELD_ERROR, error.clone());
        }
        if let Some(score) = self.validation_score {
            record.set(FIELD_VALIDATION_SCORE, AttributeValue::N(score.to_string()));
        }
        if let Some(at) = self.processed_at {
            record.set_str(FIELD_PROCESSED_DATE, at.to_rfc3339());
        }
        if let Some(expires) = self.claim_expires_at {
            record.set_str(FIELD_CLAIM_EXPIRES_AT, expires.to_rfc3339());
        } else if self.status.is_terminal()
            || record.get_str(FIELD_CURRENT_STEP) != Some(CLAIM_STEP)
        {
            record.remove(FIELD_CLAIM_EXPIRES_AT);
        }
    }
}
