use serde::{Deserialize, Serialize};

/// Identifies a record the stream should deliver again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchItemFailure {
    pub item_identifier: String,
}

/// What happened to one event of a batch.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordOutcome {
    /// Not a pending insert.
    Skipped,
    Dispatched { document_id: String },
    /// Another invocation owns (or already finished) this record.
    AlreadyClaimed { document_id: String },
    /// Will not succeed on redelivery.
    Dropped { reason: String },
    /// May succeed on redelivery.
    Retry { reason: String },
}

/// Summary returned for a processed batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchReport {
    pub total_records: usize,
    pub processed_documents: usize,
    pub already_claimed: usize,
    pub skipped_records: usize,
    pub errors: Vec<String>,
    pub batch_item_failures: Vec<BatchItemFailure>,
}

impl BatchReport {
    pub fn new(total_records: usize) -> Self {
        Self {
            total_records,
            ..Self::default()
        }
    }

    /// Folds one event's outcome into the report.
    ///
    /// `event_id` is only needed for retryable outcomes; a retryable event
    /// without an id cannot be named for redelivery and is reported as an
    /// error only.
    pub fn record(&mut self, event_id: Option<&str>, outcome: RecordOutcome) {
        match outcome {
            RecordOutcome::Skipped => self.skipped_records += 1,
            RecordOutcome::Dispatched { .. } => self.processed_documents += 1,
            RecordOutcome::AlreadyClaimed { .. } => self.already_claimed += 1,
            RecordOutcome::Dropped { reason } => self.errors.push(reason),
            RecordOutcome::Retry { reason } => {
                self.errors.push(reason);
                if let Some(id) = event_id {
                    self.batch_item_failures.push(BatchItemFailure {
                        item_identifier: id.to_string(),
                    });
                }
            }
        }
    }

    /// Counts a notification that never decoded into an event.
    ///
    /// It is not named for redelivery: the same bytes would fail again.
    pub fn record_undecodable(&mut self, reason: String) {
        self.total_records += 1;
        self.errors.push(reason);
    }
}
