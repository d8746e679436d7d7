//! In-Memory Record Table
//!
//! Stores rows in a `DashMap` keyed by natural key. Conditional updates hold the
//! row's shard lock while the condition is checked and the write applied, which
//! makes claims compare-and-set.
//!
//! When built with a change feed, every write is published as a `ChangeEvent`
//! (INSERT for new rows, MODIFY otherwise), emulating the table's stream.

use super::table::{RecordTable, StoreError};
use super::types::{DocumentStatus, StatusUpdate, UpdateCondition};
use crate::normalizer::schema::natural_key;
use crate::normalizer::types::RecordKey;
use crate::stream::types::{ChangeEvent, RawRecord};

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::sync::mpsc;

pub struct MemoryRecordTable {
    rows: DashMap<RecordKey, RawRecord>,
    change_feed: Option<mpsc::Sender<ChangeEvent>>,
}

impl MemoryRecordTable {
    pub fn new() -> Self {
        Self {
            rows: DashMap::new(),
            change_feed: None,
        }
    }

    /// Creates a table that publishes its writes on `change_feed`.
    pub fn with_change_feed(change_feed: mpsc::Sender<ChangeEvent>) -> Self {
        Self {
            rows: DashMap::new(),
            change_feed: Some(change_feed),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Counts rows per lifecycle status: (pending, processing, completed, failed).
    pub fn status_counts(&self) -> (usize, usize, usize, usize) {
        let mut counts = (0, 0, 0, 0);

        for row in self.rows.iter() {
            match row.value().status().and_then(|s| s.parse().ok()) {
                Some(DocumentStatus::Pending) => counts.0 += 1,
                Some(DocumentStatus::Processing) => counts.1 += 1,
                Some(DocumentStatus::Completed) => counts.2 += 1,
                Some(DocumentStatus::Failed) => counts.3 += 1,
                None => {}
            }
        }

        counts
    }

    async fn publish(&self, event: ChangeEvent) {
        if let Some(feed) = &self.change_feed {
            if feed.send(event).await.is_err() {
                tracing::warn!("Change feed closed, dropping change event");
            }
        }
    }
}

impl Default for MemoryRecordTable {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RecordTable for MemoryRecordTable {
    async fn get_item(&self, key: &RecordKey) -> Result<Option<RawRecord>, StoreError> {
        Ok(self.rows.get(key).map(|row| row.value().clone()))
    }

    async fn put_item(&self, record: RawRecord) -> Result<RecordKey, StoreError> {
        let key = natural_key(&record).ok_or(StoreError::MissingKey)?;

        match self.rows.entry(key.clone()) {
            Entry::Occupied(_) => return Err(StoreError::AlreadyExists { key }),
            Entry::Vacant(slot) => {
                slot.insert(record.clone());
            }
        }

        tracing::debug!("Stored record {}", key);
        self.publish(ChangeEvent::insert(record)).await;

        Ok(key)
    }

    async fn update_item(
        &self,
        key: &RecordKey,
        condition: &UpdateCondition,
        update: &StatusUpdate,
    ) -> Result<bool, StoreError> {
        let (old_image, new_image) = {
            let Some(mut row) = self.rows.get_mut(key) else {
                return Err(StoreError::NotFound { key: key.clone() });
            };

            if !condition.holds(row.value()) {
                return Ok(false);
            }

            let current = row
                .value()
                .status()
                .and_then(|s| s.parse::<DocumentStatus>().ok())
                .ok_or_else(|| StoreError::Corrupt {
                    key: key.clone(),
                    reason: "missing or unknown status".to_string(),
                })?;

            if !current.can_transition_to(update.status) {
                return Err(StoreError::IllegalTransition {
                    key: key.clone(),
                    from: current,
                    to: update.status,
                });
            }

            let old_image = row.value().clone();
            update.apply_to(row.value_mut(), Utc::now());
            (old_image, row.value().clone())
        };

        tracing::debug!("Updated record {} -> {}", key, update.status);
        self.publish(ChangeEvent::modify(old_image, new_image)).await;

        Ok(true)
    }
}
