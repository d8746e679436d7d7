//! Status Module Tests
//!
//! ## Test Scopes
//! - **State Machine**: Legal and illegal transitions.
//! - **MemoryRecordTable**: Put/get, conditional updates, change feed.
//! - **StatusAccessor**: Schema fallback on lookup, claim races, lease expiry.
//! - **RemoteRecordTable**: Round trip through the internal item endpoints.

#[cfg(test)]
mod tests {
    use crate::normalizer::types::RecordKey;
    use crate::status::accessor::{ClaimOutcome, StatusAccessor, StatusError};
    use crate::status::handlers::{
        handle_internal_get_item, handle_internal_put_item, handle_internal_update_item,
    };
    use crate::status::memory::MemoryRecordTable;
    use crate::status::protocol::{ENDPOINT_ITEM_GET, ENDPOINT_ITEM_PUT, ENDPOINT_ITEM_UPDATE};
    use crate::status::remote::RemoteRecordTable;
    use crate::status::table::{RecordTable, StoreError};
    use crate::status::types::{
        CLAIM_STEP, DISPATCHED_STEP, DocumentStatus, StatusRecord, StatusUpdate, UpdateCondition,
    };
    use crate::stream::types::{AttributeValue, EventType, RawRecord};

    use axum::{Extension, Router, routing::post};
    use chrono::{Duration as ChronoDuration, Utc};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::mpsc;

    fn s(value: &str) -> AttributeValue {
        AttributeValue::S(value.to_string())
    }

    fn legacy_row(id: &str, status: &str) -> RawRecord {
        [
            ("id", s(id)),
            ("status", s(status)),
            ("bucket", s("b")),
            ("key", s("k")),
        ]
        .into_iter()
        .collect()
    }

    fn composite_row(file_id: &str, owner: &str, status: &str) -> RawRecord {
        [
            ("fileId", s(file_id)),
            ("uploadedBy", s(owner)),
            ("status", s(status)),
            ("s3Key", s("uploads/x.pdf")),
            ("s3Url", s("s3://bkt/uploads/x.pdf")),
        ]
        .into_iter()
        .collect()
    }

    fn accessor_with(table: MemoryRecordTable) -> StatusAccessor {
        StatusAccessor::new(Arc::new(table))
    }

    // ============================================================
    // STATE MACHINE
    // ============================================================

    #[test]
    fn test_legal_transitions() {
        use DocumentStatus::*;

        assert!(Pending.can_transition_to(Processing));
        assert!(Processing.can_transition_to(Processing));
        assert!(Processing.can_transition_to(Completed));
        assert!(Processing.can_transition_to(Failed));
    }

    #[test]
    fn test_illegal_transitions() {
        use DocumentStatus::*;

        let all = [Pending, Processing, Completed, Failed];
        for from in all {
            // Nothing re-enters pending
            assert!(!from.can_transition_to(Pending), "{} -> pending", from);
        }
        for to in all {
            assert!(!Completed.can_transition_to(to), "completed -> {}", to);
            assert!(!Failed.can_transition_to(to), "failed -> {}", to);
        }
        assert!(!Pending.can_transition_to(Completed));
        assert!(!Pending.can_transition_to(Failed));
    }

    #[test]
    fn test_status_parse_and_display() {
        for status in ["pending", "processing", "completed", "failed"] {
            let parsed: DocumentStatus = status.parse().unwrap();
            assert_eq!(parsed.to_string(), status);
        }
        assert!("done".parse::<DocumentStatus>().is_err());
        assert!(DocumentStatus::Completed.is_terminal());
        assert!(!DocumentStatus::Processing.is_terminal());
    }

    #[test]
    fn test_claimable_condition() {
        let now = Utc::now();
        let cond = UpdateCondition::Claimable { now };

        assert!(cond.holds(&legacy_row("a", "pending")));
        assert!(!cond.holds(&legacy_row("a", "completed")));

        let mut held = legacy_row("a", "processing");
        held.set_str("current_step", CLAIM_STEP);
        held.set_str(
            "claim_expires_at",
            (now + ChronoDuration::seconds(60)).to_rfc3339(),
        );
        assert!(!cond.holds(&held));

        held.set_str(
            "claim_expires_at",
            (now - ChronoDuration::seconds(1)).to_rfc3339(),
        );
        assert!(cond.holds(&held));

        // Processing service already reported progress: never reclaimable
        held.set_str("current_step", "extracting");
        assert!(!cond.holds(&held));
    }

    #[test]
    fn test_status_record_projection_accepts_both_namings() {
        let mut row = composite_row("f1", "alice", "completed");
        row.set("validation_score", AttributeValue::N("85".to_string()));
        row.set_str("processedAt", "2024-03-01T10:00:00Z");
        row.set_str("currentStep", "validating");

        let key = RecordKey::composite("f1", "alice");
        let record = StatusRecord::from_record(&key, &row).unwrap();

        assert_eq!(record.document_id, "f1");
        assert_eq!(record.owner_id, "alice");
        assert_eq!(record.status, DocumentStatus::Completed);
        assert_eq!(record.validation_score, Some(85.0));
        assert_eq!(record.current_step.as_deref(), Some("validating"));
        assert!(record.processed_at.is_some());
        assert_eq!(record.error, None);

        let json = serde_json::to_value(&record).unwrap();
        assert!(json.get("error").is_none());
        assert_eq!(json["status"], "completed");
    }

    // ============================================================
    // MEMORY TABLE
    // ============================================================

    #[tokio::test]
    async fn test_memory_put_and_get() {
        let table = MemoryRecordTable::new();

        let key = table.put_item(legacy_row("doc1", "pending")).await.unwrap();
        assert_eq!(key, RecordKey::legacy("doc1"));

        let row = table.get_item(&key).await.unwrap().unwrap();
        assert_eq!(row.status(), Some("pending"));
        assert!(table.get_item(&RecordKey::legacy("nope")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_memory_put_rejects_duplicates_and_keyless_rows() {
        let table = MemoryRecordTable::new();
        table.put_item(legacy_row("doc1", "pending")).await.unwrap();

        let dup = table.put_item(legacy_row("doc1", "pending")).await;
        assert!(matches!(dup, Err(StoreError::AlreadyExists { .. })));

        let keyless: RawRecord = [("status", s("pending"))].into_iter().collect();
        assert!(matches!(
            table.put_item(keyless).await,
            Err(StoreError::MissingKey)
        ));
    }

    #[tokio::test]
    async fn test_memory_update_enforces_state_machine() {
        let table = MemoryRecordTable::new();
        let key = table.put_item(legacy_row("doc1", "completed")).await.unwrap();

        let result = table
            .update_item(
                &key,
                &UpdateCondition::Always,
                &StatusUpdate::new(DocumentStatus::Pending),
            )
            .await;

        assert!(matches!(
            result,
            Err(StoreError::IllegalTransition {
                from: DocumentStatus::Completed,
                to: DocumentStatus::Pending,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_memory_update_condition_mismatch_is_not_applied() {
        let table = MemoryRecordTable::new();
        let key = table.put_item(legacy_row("doc1", "pending")).await.unwrap();

        let applied = table
            .update_item(
                &key,
                &UpdateCondition::StatusIs {
                    status: DocumentStatus::Processing,
                },
                &StatusUpdate::new(DocumentStatus::Completed),
            )
            .await
            .unwrap();

        assert!(!applied);
        let row = table.get_item(&key).await.unwrap().unwrap();
        assert_eq!(row.status(), Some("pending"));
    }

    #[tokio::test]
    async fn test_memory_update_missing_row() {
        let table = MemoryRecordTable::new();

        let result = table
            .update_item(
                &RecordKey::legacy("ghost"),
                &UpdateCondition::Always,
                &StatusUpdate::new(DocumentStatus::Processing),
            )
            .await;

        assert!(matches!(result, Err(StoreError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_memory_change_feed_emits_insert_then_modify() {
        let (tx, mut rx) = mpsc::channel(8);
        let table = MemoryRecordTable::with_change_feed(tx);

        let key = table.put_item(legacy_row("doc1", "pending")).await.unwrap();
        table
            .update_item(
                &key,
                &UpdateCondition::Always,
                &StatusUpdate::new(DocumentStatus::Processing).with_step("downloading"),
            )
            .await
            .unwrap();

        let insert = rx.recv().await.unwrap();
        assert_eq!(insert.event_type, EventType::Insert);
        assert_eq!(insert.new_image.status(), Some("pending"));
        assert!(insert.event_id.is_some());

        let modify = rx.recv().await.unwrap();
        assert_eq!(modify.event_type, EventType::Modify);
        assert_eq!(modify.new_image.status(), Some("processing"));
        assert_eq!(modify.new_image.get_str("current_step"), Some("downloading"));
        assert_eq!(modify.old_image.unwrap().status(), Some("pending"));
    }

    #[tokio::test]
    async fn test_memory_status_counts() {
        let table = MemoryRecordTable::new();
        table.put_item(legacy_row("a", "pending")).await.unwrap();
        table.put_item(legacy_row("b", "pending")).await.unwrap();
        table.put_item(legacy_row("c", "failed")).await.unwrap();

        assert_eq!(table.status_counts(), (2, 0, 0, 1));
        assert_eq!(table.len(), 3);
    }

    // ============================================================
    // ACCESSOR
    // ============================================================

    #[tokio::test]
    async fn test_get_prefers_composite_key() {
        let table = MemoryRecordTable::new();
        table
            .put_item(composite_row("doc1", "alice", "processing"))
            .await
            .unwrap();
        table.put_item(legacy_row("doc1", "pending")).await.unwrap();
        let accessor = accessor_with(table);

        let record = accessor.get("doc1", "alice").await.unwrap();
        assert_eq!(record.status, DocumentStatus::Processing);
        assert_eq!(record.owner_id, "alice");
    }

    #[tokio::test]
    async fn test_get_falls_back_to_legacy_key() {
        let table = MemoryRecordTable::new();
        table.put_item(legacy_row("doc1", "completed")).await.unwrap();
        let accessor = accessor_with(table);

        let record = accessor.get("doc1", "bob").await.unwrap();
        assert_eq!(record.status, DocumentStatus::Completed);
        assert_eq!(record.owner_id, "system");
    }

    #[tokio::test]
    async fn test_get_not_found() {
        let accessor = accessor_with(MemoryRecordTable::new());

        let err = accessor.get("missing", "system").await.unwrap_err();
        assert!(matches!(err, StatusError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_get_corrupt_status() {
        let table = MemoryRecordTable::new();
        table.put_item(legacy_row("doc1", "archived")).await.unwrap();
        let accessor = accessor_with(table);

        let err = accessor.get("doc1", "system").await.unwrap_err();
        assert!(matches!(err, StatusError::Store(StoreError::Corrupt { .. })));
    }

    #[tokio::test]
    async fn test_claim_is_exclusive() {
        let table = MemoryRecordTable::new();
        let key = table.put_item(legacy_row("doc1", "pending")).await.unwrap();
        let accessor = accessor_with(table);

        let first = accessor.claim(&key, Duration::from_secs(60)).await.unwrap();
        let second = accessor.claim(&key, Duration::from_secs(60)).await.unwrap();

        assert_eq!(first, ClaimOutcome::Claimed);
        // The first claim's dispatch has no outcome yet
        assert_eq!(second, ClaimOutcome::Held);

        let record = accessor.get("doc1", "system").await.unwrap();
        assert_eq!(record.status, DocumentStatus::Processing);
        assert_eq!(record.current_step.as_deref(), Some(CLAIM_STEP));
    }

    #[tokio::test]
    async fn test_dispatched_record_is_already_claimed() {
        // ARRANGE
        let table = MemoryRecordTable::new();
        let key = table.put_item(legacy_row("doc1", "pending")).await.unwrap();
        let accessor = accessor_with(table);
        accessor.claim(&key, Duration::from_secs(60)).await.unwrap();

        // ACT
        let marked = accessor.mark_dispatched(&key).await.unwrap();
        let outcome = accessor.claim(&key, Duration::from_secs(60)).await.unwrap();

        // ASSERT
        assert!(marked);
        assert_eq!(outcome, ClaimOutcome::AlreadyClaimed);
        let row = accessor.table().get_item(&key).await.unwrap().unwrap();
        assert_eq!(row.status(), Some("processing"));
        assert_eq!(row.get_str("current_step"), Some(DISPATCHED_STEP));
        assert!(row.get("claim_expires_at").is_none());

        // Settled records are neither released nor marked again
        assert!(!accessor.release(&key).await.unwrap());
        assert!(!accessor.mark_dispatched(&key).await.unwrap());
    }

    #[tokio::test]
    async fn test_unreleased_claim_is_held_until_lease_ends() {
        // ARRANGE: a claim whose release never happened
        let table = MemoryRecordTable::new();
        let key = table.put_item(legacy_row("doc1", "pending")).await.unwrap();
        let accessor = accessor_with(table);
        accessor.claim(&key, Duration::from_millis(50)).await.unwrap();

        // ACT + ASSERT
        assert_eq!(
            accessor.claim(&key, Duration::from_secs(60)).await.unwrap(),
            ClaimOutcome::Held
        );
        tokio::time::sleep(Duration::from_millis(80)).await;
        assert_eq!(
            accessor.claim(&key, Duration::from_secs(60)).await.unwrap(),
            ClaimOutcome::Claimed
        );
    }

    #[tokio::test]
    async fn test_concurrent_claims_yield_one_winner() {
        let table = MemoryRecordTable::new();
        let key = table.put_item(legacy_row("doc1", "pending")).await.unwrap();
        let accessor = accessor_with(table);

        let mut handles = Vec::new();
        for _ in 0..16 {
            let accessor = accessor.clone();
            let key = key.clone();
            handles.push(tokio::spawn(async move {
                accessor.claim(&key, Duration::from_secs(60)).await.unwrap()
            }));
        }

        let mut claimed = 0;
        for handle in handles {
            if handle.await.unwrap() == ClaimOutcome::Claimed {
                claimed += 1;
            }
        }

        assert_eq!(claimed, 1);
    }

    #[tokio::test]
    async fn test_claim_on_terminal_record_is_already_claimed() {
        let table = MemoryRecordTable::new();
        let key = table.put_item(legacy_row("doc1", "completed")).await.unwrap();
        let accessor = accessor_with(table);

        let outcome = accessor.claim(&key, Duration::from_secs(60)).await.unwrap();
        assert_eq!(outcome, ClaimOutcome::AlreadyClaimed);
    }

    #[tokio::test]
    async fn test_released_claim_can_be_reclaimed() {
        let table = MemoryRecordTable::new();
        let key = table.put_item(legacy_row("doc1", "pending")).await.unwrap();
        let accessor = accessor_with(table);

        accessor.claim(&key, Duration::from_secs(300)).await.unwrap();
        assert!(accessor.release(&key).await.unwrap());

        let again = accessor.claim(&key, Duration::from_secs(300)).await.unwrap();
        assert_eq!(again, ClaimOutcome::Claimed);
    }

    #[tokio::test]
    async fn test_release_after_progress_is_noop() {
        let table = MemoryRecordTable::new();
        let key = table.put_item(legacy_row("doc1", "pending")).await.unwrap();
        let accessor = accessor_with(table);

        accessor.claim(&key, Duration::from_secs(300)).await.unwrap();
        accessor
            .table()
            .update_item(
                &key,
                &UpdateCondition::Always,
                &StatusUpdate::new(DocumentStatus::Processing).with_step("downloading"),
            )
            .await
            .unwrap();

        assert!(!accessor.release(&key).await.unwrap());
        let outcome = accessor.claim(&key, Duration::from_secs(300)).await.unwrap();
        assert_eq!(outcome, ClaimOutcome::AlreadyClaimed);

        let row = accessor.table().get_item(&key).await.unwrap().unwrap();
        assert!(row.get("claim_expires_at").is_none());
    }

    #[tokio::test]
    async fn test_claim_missing_record_is_store_error() {
        let accessor = accessor_with(MemoryRecordTable::new());

        let result = accessor
            .claim(&RecordKey::legacy("ghost"), Duration::from_secs(60))
            .await;
        assert!(matches!(result, Err(StoreError::NotFound { .. })));
    }

    // ============================================================
    // REMOTE TABLE
    // ============================================================

    async fn start_table_node() -> (String, Arc<dyn RecordTable>) {
        let table: Arc<dyn RecordTable> = Arc::new(MemoryRecordTable::new());
        let app = Router::new()
            .route(ENDPOINT_ITEM_GET, post(handle_internal_get_item))
            .route(ENDPOINT_ITEM_PUT, post(handle_internal_put_item))
            .route(ENDPOINT_ITEM_UPDATE, post(handle_internal_update_item))
            .layer(Extension(table.clone()));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        (format!("http://{}", addr), table)
    }

    #[tokio::test]
    async fn test_remote_table_round_trip() {
        let (base_url, backing) = start_table_node().await;
        let remote = RemoteRecordTable::new(&base_url, Duration::from_secs(5));

        let key = remote
            .put_item(composite_row("f1", "alice", "pending"))
            .await
            .unwrap();
        assert_eq!(key, RecordKey::composite("f1", "alice"));

        let row = remote.get_item(&key).await.unwrap().unwrap();
        assert_eq!(row.get_str("s3Key"), Some("uploads/x.pdf"));
        assert!(remote.get_item(&RecordKey::legacy("none")).await.unwrap().is_none());

        let accessor = StatusAccessor::new(Arc::new(remote));
        assert_eq!(
            accessor.claim(&key, Duration::from_secs(60)).await.unwrap(),
            ClaimOutcome::Claimed
        );
        assert_eq!(
            accessor.claim(&key, Duration::from_secs(60)).await.unwrap(),
            ClaimOutcome::Held
        );
        assert!(accessor.mark_dispatched(&key).await.unwrap());
        assert_eq!(
            accessor.claim(&key, Duration::from_secs(60)).await.unwrap(),
            ClaimOutcome::AlreadyClaimed
        );

        let stored = backing.get_item(&key).await.unwrap().unwrap();
        assert_eq!(stored.status(), Some("processing"));
        assert_eq!(stored.get_str("current_step"), Some(DISPATCHED_STEP));
    }

    #[tokio::test]
    async fn test_remote_table_propagates_store_errors() {
        let (base_url, _backing) = start_table_node().await;
        let remote = RemoteRecordTable::new(&base_url, Duration::from_secs(5));

        let key = remote.put_item(legacy_row("doc1", "failed")).await.unwrap();

        let dup = remote.put_item(legacy_row("doc1", "pending")).await;
        assert!(matches!(dup, Err(StoreError::AlreadyExists { .. })));

        let illegal = remote
            .update_item(
                &key,
                &UpdateCondition::Always,
                &StatusUpdate::new(DocumentStatus::Processing),
            )
            .await;
        assert!(matches!(illegal, Err(StoreError::IllegalTransition { .. })));

        let missing = remote
            .update_item(
                &RecordKey::legacy("ghost"),
                &UpdateCondition::Always,
                &StatusUpdate::new(DocumentStatus::Processing),
            )
            .await;
        assert!(matches!(missing, Err(StoreError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_remote_table_unreachable_is_unavailable() {
        let remote = RemoteRecordTable::new("http://127.0.0.1:1", Duration::from_millis(200));

        let err = remote
            .update_item(
                &RecordKey::legacy("doc1"),
                &UpdateCondition::Always,
                &StatusUpdate::new(DocumentStatus::Processing),
            )
            .await
            .unwrap_err();

        assert!(err.is_retryable());
    }
}
