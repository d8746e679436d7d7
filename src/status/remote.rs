//! Remote Record Table
//!
//! A `RecordTable` backed by the internal item endpoints of another node.
//! Reads are retried with backoff; writes are sent once, because a conditional
//! write that landed but whose response was lost must not be replayed as a
//! second claim.

use super::protocol::*;
use super::table::{RecordTable, StoreError};
use super::types::{StatusUpdate, UpdateCondition};
use crate::normalizer::schema::natural_key;
use crate::normalizer::types::RecordKey;
use crate::stream::types::RawRecord;

use async_trait::async_trait;
use std::time::Duration;

pub struct RemoteRecordTable {
    base_url: String,
    timeout: Duration,
    http_client: reqwest::Client,
}

impl RemoteRecordTable {
    pub fn new(base_url: &str, timeout: Duration) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
            http_client: reqwest::Client::new(),
        }
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}{}", self.base_url, endpoint)
    }

    async fn post_once<T: serde::Serialize>(
        &self,
        url: String,
        payload: &T,
    ) -> Result<reqwest::Response, StoreError> {
        self.http_client
            .post(url)
            .json(payload)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))
    }

    async fn post_with_retry<T: serde::Serialize>(
        &self,
        url: String,
        payload: &T,
        attempts: usize,
    ) -> Result<reqwest::Response, StoreError> {
        let mut delay_ms = 150u64;

        for attempt in 0..attempts {
            match self.post_once(url.clone(), payload).await {
                Ok(resp) if !resp.status().is_server_error() => return Ok(resp),
                Ok(resp) if attempt + 1 == attempts => return Ok(resp),
                Err(e) if attempt + 1 == attempts => return Err(e),
                Ok(resp) => {
                    tracing::debug!("Table read returned {}, retrying", resp.status());
                }
                Err(e) => {
                    tracing::debug!("Table read failed: {}, retrying", e);
                }
            }

            // Simple jitter to prevent thundering herd
            let jitter = rand::random::<u64>() % 50;
            tokio::time::sleep(Duration::from_millis(delay_ms + jitter)).await;
            delay_ms = (delay_ms * 2).min(1200);
        }

        Err(StoreError::Unavailable("retry attempts exhausted".to_string()))
    }
}

fn unexpected(status: reqwest::StatusCode) -> StoreError {
    StoreError::Unavailable(format!("unexpected table response: {}", status))
}

#[async_trait]
impl RecordTable for RemoteRecordTable {
    async fn get_item(&self, key: &RecordKey) -> Result<Option<RawRecord>, StoreError> {
        let response = self
            .post_with_retry(
                self.url(ENDPOINT_ITEM_GET),
                &GetItemRequest { key: key.clone() },
                3,
            )
            .await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(unexpected(response.status()));
        }

        let body: GetItemResponse = response
            .json()
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        Ok(body.item)
    }

    async fn put_item(&self, record: RawRecord) -> Result<RecordKey, StoreError> {
        let key = natural_key(&record).ok_or(StoreError::MissingKey)?;

        let response = self
            .post_once(self.url(ENDPOINT_ITEM_PUT), &PutItemRequest { item: record })
            .await?;
        let status = response.status();

        let body: PutItemResponse = response.json().await.map_err(|_| unexpected(status))?;

        match (body.key, body.failure) {
            (_, Some(failure)) => Err(failure.into_error(key)),
            (Some(stored), None) => Ok(stored),
            (None, None) => Err(unexpected(status)),
        }
    }

    async fn update_item(
        &self,
        key: &RecordKey,
        condition: &UpdateCondition,
        update: &StatusUpdate,
    ) -> Result<bool, StoreError> {
        let payload = UpdateItemRequest {
            key: key.clone(),
            condition: condition.clone(),
            update: update.clone(),
        };

        let response = self
            .post_once(self.url(ENDPOINT_ITEM_UPDATE), &payload)
            .await?;
        let status = response.status();

        let body: UpdateItemResponse = response.json().await.map_err(|_| unexpected(status))?;

        match body.failure {
            Some(failure) => Err(failure.into_error(key.clone())),
            None => Ok(body.applied),
        }
    }
}
