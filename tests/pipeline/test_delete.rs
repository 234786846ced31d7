//! Deletion: completeness, ownership, file removal

use crate::common::{policy_text, TestPipeline};
use clauserag::commands::{cmd_delete, cmd_query};
use clauserag::error::Error;
use clauserag::storage::ObjectStore;
use clauserag::store::VectorIndex;
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn test_delete_removes_vectors_rows_and_document() {
    let t = TestPipeline::new().await;
    let outcome = t.ingest_text("alice", "policy.txt", &policy_text(1500)).await;
    let kept = t.ingest_text("alice", "other.txt", "Glass breakage is covered.").await;

    let result = cmd_delete(&t.ctx, "alice", &outcome.document_id, false)
        .await
        .unwrap();
    assert!(result.ok);
    assert_eq!(result.chunks_deleted, 2);
    assert!(!result.file_deleted);

    assert!(t.ctx.db.get_document(&outcome.document_id).await.unwrap().is_none());
    assert_eq!(t.ctx.db.count_chunks(&outcome.document_id).await.unwrap(), 0);
    assert_eq!(t.vector_count("alice", &outcome.document_id).await, 0);

    // Sibling document untouched
    assert_eq!(t.vector_count("alice", &kept.document_id).await, 1);

    // Deleted clauses never come back from a query
    let answer = cmd_query(&t.ctx, "alice", "water damage").await.unwrap();
    assert!(answer
        .contexts
        .iter()
        .all(|c| c.source.document_id.as_deref() != Some(outcome.document_id.as_str())));
}

#[tokio::test]
async fn test_delete_with_file_removes_stored_object() {
    let t = TestPipeline::new().await;
    let outcome = t.ingest_text("alice", "policy.txt", "Theft is covered.").await;
    let doc = t.ctx.db.get_document(&outcome.document_id).await.unwrap().unwrap();
    let path = doc.storage_path.unwrap();

    let result = cmd_delete(&t.ctx, "alice", &outcome.document_id, true)
        .await
        .unwrap();
    assert!(result.file_deleted);
    assert!(t.objects.get(&path).await.is_err());
}

#[tokio::test]
async fn test_delete_unknown_document_makes_no_index_calls() {
    let t = TestPipeline::new().await;
    t.ingest_text("alice", "policy.txt", "Theft is covered.").await;
    let calls = t.index.calls();

    let err = cmd_delete(&t.ctx, "alice", "no-such-doc", false)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
    assert_eq!(t.index.calls(), calls);
}

#[tokio::test]
async fn test_delete_other_users_document_is_forbidden() {
    let t = TestPipeline::new().await;
    let outcome = t.ingest_text("alice", "policy.txt", "Theft is covered.").await;

    let err = cmd_delete(&t.ctx, "bob", &outcome.document_id, true)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Forbidden(_)));
    assert!(t.ctx.db.get_document(&outcome.document_id).await.unwrap().is_some());
    assert_eq!(t.vector_count("alice", &outcome.document_id).await, 1);
}

#[tokio::test]
async fn test_delete_while_leased_is_conflict() {
    let t = TestPipeline::new().await;
    let outcome = t.ingest_text("alice", "policy.txt", "Theft is covered.").await;
    t.ctx
        .db
        .acquire_lease(&outcome.document_id, "someone-else", Duration::from_secs(60))
        .await
        .unwrap();

    let err = cmd_delete(&t.ctx, "alice", &outcome.document_id, false)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Conflict(_)));
    assert!(t.ctx.db.get_document(&outcome.document_id).await.unwrap().is_some());
}

#[tokio::test]
async fn test_failed_vector_delete_keeps_metadata() {
    let mut t = TestPipeline::new().await;
    let outcome = t.ingest_text("alice", "policy.txt", "Theft is covered.").await;
    let doc = t.ctx.db.get_document(&outcome.document_id).await.unwrap().unwrap();
    let path = doc.storage_path.unwrap();

    let faulty = t.with_faulty_index();
    faulty.fail_deletes();

    let err = cmd_delete(&t.ctx, "alice", &outcome.document_id, true)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::VectorDeleteFailed(_)));
    assert_eq!(err.kind(), "vector_delete_failed");

    assert!(t.ctx.db.get_document(&outcome.document_id).await.unwrap().is_some());
    assert_eq!(t.ctx.db.count_chunks(&outcome.document_id).await.unwrap(), 1);
    assert_eq!(t.vector_count("alice", &outcome.document_id).await, 1);
    assert!(t.objects.get(&path).await.is_ok());

    // Lease was released, so a retry goes through once the index recovers
    t.ctx.index = t.index.clone() as Arc<dyn VectorIndex>;
    tokio_test::assert_ok!(cmd_delete(&t.ctx, "alice", &outcome.document_id, true).await);
}
