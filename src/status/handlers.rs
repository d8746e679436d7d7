use super::accessor::{StatusAccessor, StatusError};
use super::protocol::*;
use super::table::{RecordTable, StoreError};
use super::types::StatusRecord;
use crate::normalizer::types::ANONYMOUS_OWNER;

use axum::{Extension, Json, extract::Path, http::StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub detail: String,
}

type StatusResult = Result<Json<StatusRecord>, (StatusCode, Json<ErrorResponse>)>;

pub async fn handle_get_status(
    Extension(accessor): Extension<StatusAccessor>,
    Path(document_id): Path<String>,
) -> StatusResult {
    lookup_status(&accessor, &document_id, ANONYMOUS_OWNER).await
}

pub async fn handle_get_owned_status(
    Extension(accessor): Extension<StatusAccessor>,
    Path((document_id, owner_id)): Path<(String, String)>,
) -> StatusResult {
    lookup_status(&accessor, &document_id, &owner_id).await
}

async fn lookup_status(accessor: &StatusAccessor, document_id: &str, owner_id: &str) -> StatusResult {
    match accessor.get(document_id, owner_id).await {
        Ok(record) => {
            tracing::debug!("Status query: {} -> {}", document_id, record.status);
            Ok(Json(record))
        }
        Err(StatusError::NotFound { .. }) => {
            tracing::debug!("Status query: {} not found", document_id);
            Err((
                StatusCode::NOT_FOUND,
                Json(ErrorResponse {
                    detail: "Document not found".to_string(),
                }),
            ))
        }
        Err(e) => {
            tracing::error!("Error getting document status: {}", e);
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    detail: "Error retrieving document status".to_string(),
                }),
            ))
        }
    }
}

pub async fn handle_internal_get_item(
    Extension(table): Extension<Arc<dyn RecordTable>>,
    Json(req): Json<GetItemRequest>,
) -> (StatusCode, Json<GetItemResponse>) {
    match table.get_item(&req.key).await {
        Ok(Some(item)) => (StatusCode::OK, Json(GetItemResponse { item: Some(item) })),
        Ok(None) => (StatusCode::NOT_FOUND, Json(GetItemResponse { item: None })),
        Err(e) => {
            tracing::error!("Failed to read item {}: {}", req.key, e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(GetItemResponse { item: None }),
            )
        }
    }
}

pub async fn handle_internal_put_item(
    Extension(table): Extension<Arc<dyn RecordTable>>,
    Json(req): Json<PutItemRequest>,
) -> (StatusCode, Json<PutItemResponse>) {
    match table.put_item(req.item).await {
        Ok(key) => (
            StatusCode::CREATED,
            Json(PutItemResponse {
                key: Some(key),
                failure: None,
            }),
        ),
        Err(e) => {
            tracing::warn!("Rejected item put: {}", e);
            (
                store_error_status(&e),
                Json(PutItemResponse {
                    key: None,
                    failure: Some(StoreFailure::from(&e)),
                }),
            )
        }
    }
}

pub async fn handle_internal_update_item(
    Extension(table): Extension<Arc<dyn RecordTable>>,
    Json(req): Json<UpdateItemRequest>,
) -> (StatusCode, Json<UpdateItemResponse>) {
    match table
        .update_item(&req.key, &req.condition, &req.update)
        .await
    {
        Ok(applied) => (
            StatusCode::OK,
            Json(UpdateItemResponse {
                applied,
                failure: None,
            }),
        ),
        Err(e) => {
            tracing::warn!("Rejected item update for {}: {}", req.key, e);
            (
                store_error_status(&e),
                Json(UpdateItemResponse {
                    applied: false,
                    failure: Some(StoreFailure::from(&e)),
                }),
            )
        }
    }
}

pub fn store_error_status(err: &StoreError) -> StatusCode {
    match err {
        StoreError::NotFound { .. } => StatusCode::NOT_FOUND,
        StoreError::AlreadyExists { .. } | StoreError::IllegalTransition { .. } => {
            StatusCode::CONFLICT
        }
        StoreError::MissingKey => StatusCode::BAD_REQUEST,
        StoreError::Corrupt { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        StoreError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}
