use super::pipeline::TriggerPipeline;
use super::types::BatchReport;
use crate::normalizer::types::RecordKey;
use crate::status::accessor::StatusAccessor;
use crate::status::handlers::*;
use crate::status::protocol::{
    ENDPOINT_ITEM_GET, ENDPOINT_ITEM_PUT, ENDPOINT_ITEM_UPDATE, ENDPOINT_STATUS,
};
use crate::status::table::RecordTable;
use crate::stream::types::{RawRecord, StreamBatch};

use axum::{
    Extension, Json, Router,
    http::StatusCode,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub const ENDPOINT_STREAM_BATCH: &str = "/stream/batch";
pub const ENDPOINT_RECORDS: &str = "/records";
pub const ENDPOINT_HEALTH: &str = "/health";

pub const SERVICE_NAME: &str = "document-trigger";

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateRecordResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<RecordKey>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
}

/// Runs a pushed stream batch through the pipeline.
///
/// Always 200: per-record failures, undecodable notifications included, are
/// reported in the body, and `batchItemFailures` names the records the caller
/// should redeliver.
pub async fn handle_stream_batch(
    Extension(pipeline): Extension<Arc<TriggerPipeline>>,
    Json(batch): Json<StreamBatch>,
) -> (StatusCode, Json<BatchReport>) {
    let decoded = batch.decode();
    tracing::debug!(
        "Received stream batch of {} records ({} undecodable)",
        decoded.events.len() + decoded.failures.len(),
        decoded.failures.len()
    );

    let mut report = pipeline.handle_batch(&decoded.events).await;
    for failure in decoded.failures {
        report.record_undecodable(failure);
    }
    (StatusCode::OK, Json(report))
}

/// Stores a new record, which shows up on the change feed as an INSERT.
pub async fn handle_create_record(
    Extension(table): Extension<Arc<dyn RecordTable>>,
    Json(record): Json<RawRecord>,
) -> (StatusCode, Json<CreateRecordResponse>) {
    match table.put_item(record).await {
        Ok(key) => {
            tracing::info!("Created record {}", key);
            (
                StatusCode::CREATED,
                Json(CreateRecordResponse {
                    key: Some(key),
                    detail: None,
                }),
            )
        }
        Err(e) => {
            tracing::warn!("Rejected record: {}", e);
            (
                store_error_status(&e),
                Json(CreateRecordResponse {
                    key: None,
                    detail: Some(e.to_string()),
                }),
            )
        }
    }
}

pub async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        service: SERVICE_NAME.to_string(),
    })
}

/// Builds the service's full HTTP surface.
pub fn router(
    pipeline: Arc<TriggerPipeline>,
    accessor: StatusAccessor,
    table: Arc<dyn RecordTable>,
) -> Router {
    Router::new()
        .route(ENDPOINT_STREAM_BATCH, post(handle_stream_batch))
        .route(ENDPOINT_RECORDS, post(handle_create_record))
        .route(ENDPOINT_HEALTH, get(handle_health))
        .route(&format!("{}/:document_id", ENDPOINT_STATUS), get(handle_get_status))
        .route(
            &format!("{}/:document_id/:owner_id", ENDPOINT_STATUS),
            get(handle_get_owned_status),
        )
        .route(ENDPOINT_ITEM_GET, post(handle_internal_get_item))
        .route(ENDPOINT_ITEM_PUT, post(handle_internal_put_item))
        .route(ENDPOINT_ITEM_UPDATE, post(handle_internal_update_item))
        .layer(Extension(pipeline))
        .layer(Extension(accessor))
        .layer(Extension(table))
}
