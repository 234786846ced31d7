//! Reindex: idempotence, ownership, source and lease checks

use crate::common::{policy_text, TestPipeline};
use clauserag::commands::{cmd_reindex, cmd_verify_document};
use clauserag::error::Error;
use clauserag::meta::{Document, DocumentStatus};
use std::time::Duration;

#[tokio::test]
async fn test_reindex_is_idempotent() {
    let t = TestPipeline::new().await;
    let outcome = t.ingest_text("alice", "policy.txt", &policy_text(2500)).await;
    let before = t.ctx.db.get_chunks(&outcome.document_id).await.unwrap();

    for _ in 0..2 {
        let again = cmd_reindex(&t.ctx, "alice", &outcome.document_id)
            .await
            .unwrap();
        assert_eq!(again.chunk_count, outcome.chunk_count);
        assert_eq!(again.document_id, outcome.document_id);
    }

    let after = t.ctx.db.get_chunks(&outcome.document_id).await.unwrap();
    let ids = |rows: &[clauserag::meta::ChunkRow]| {
        rows.iter().map(|r| r.vector_id.clone()).collect::<Vec<_>>()
    };
    assert_eq!(ids(&before), ids(&after));
    assert_eq!(
        t.vector_count("alice", &outcome.document_id).await,
        outcome.chunk_count as u64
    );

    let report = cmd_verify_document(&t.ctx, "alice", &outcome.document_id)
        .await
        .unwrap();
    assert!(report.consistent);
}

#[tokio::test]
async fn test_reindex_picks_up_changed_source() {
    let t = TestPipeline::new().await;
    let outcome = t.ingest_text("alice", "policy.txt", &policy_text(2500)).await;
    assert_eq!(outcome.chunk_count, 3);

    let doc = t.ctx.db.get_document(&outcome.document_id).await.unwrap().unwrap();
    let path = doc.storage_path.clone().unwrap();
    clauserag::storage::ObjectStore::put(t.objects.as_ref(), &path, b"Only one clause now.")
        .await
        .unwrap();

    let again = cmd_reindex(&t.ctx, "alice", &outcome.document_id)
        .await
        .unwrap();
    assert_eq!(again.chunk_count, 1);
    assert_eq!(t.vector_count("alice", &outcome.document_id).await, 1);

    let doc = t.ctx.db.get_document(&outcome.document_id).await.unwrap().unwrap();
    assert_eq!(doc.size_bytes, "Only one clause now.".len() as i64);
    assert_eq!(doc.get_status().unwrap(), DocumentStatus::Indexed);
}

#[tokio::test]
async fn test_reindex_other_users_document_is_forbidden() {
    let t = TestPipeline::new().await;
    let outcome = t.ingest_text("alice", "policy.txt", "Theft is covered.").await;
    let calls = t.index.calls();

    let err = cmd_reindex(&t.ctx, "bob", &outcome.document_id)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Forbidden(_)));
    assert_eq!(t.index.calls(), calls);
    assert_eq!(t.vector_count("alice", &outcome.document_id).await, 1);
}

#[tokio::test]
async fn test_reindex_unknown_document_is_not_found() {
    let t = TestPipeline::new().await;
    let err = cmd_reindex(&t.ctx, "alice", "no-such-doc").await.unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));

    let err = cmd_reindex(&t.ctx, "alice", " ").await.unwrap_err();
    assert!(matches!(err, Error::BadRequest(_)));
}

#[tokio::test]
async fn test_reindex_without_storage_path_is_missing_source() {
    let t = TestPipeline::new().await;
    let doc = Document::new("alice", "orphan.txt");
    t.ctx.db.insert_document(&doc).await.unwrap();

    let err = cmd_reindex(&t.ctx, "alice", &doc.id).await.unwrap_err();
    assert!(matches!(err, Error::MissingSource(_)));
    assert_eq!(t.index.calls(), 0);
}

#[tokio::test]
async fn test_reindex_while_leased_is_conflict() {
    let t = TestPipeline::new().await;
    let outcome = t.ingest_text("alice", "policy.txt", "Theft is covered.").await;

    t.ctx
        .db
        .acquire_lease(&outcome.document_id, "someone-else", Duration::from_secs(60))
        .await
        .unwrap();

    let err = cmd_reindex(&t.ctx, "alice", &outcome.document_id)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Conflict(_)));

    t.ctx
        .db
        .release_lease(&outcome.document_id, "someone-else")
        .await
        .unwrap();
    tokio_test::assert_ok!(cmd_reindex(&t.ctx, "alice", &outcome.document_id).await);
}

#[tokio::test]
async fn test_reindex_upsert_failure_marks_document_failed() {
    let mut t = TestPipeline::new().await;
    let outcome = t.ingest_text("alice", "policy.txt", &policy_text(1500)).await;
    assert_eq!(t.vector_count("alice", &outcome.document_id).await, 2);

    let faulty = t.with_faulty_index();
    faulty.fail_upserts();

    let err = cmd_reindex(&t.ctx, "alice", &outcome.document_id)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::UpstreamUnavailable(_)));

    // Old vectors were removed before the failed upsert
    assert_eq!(t.vector_count("alice", &outcome.document_id).await, 0);

    let doc = t.ctx.db.get_document(&outcome.document_id).await.unwrap().unwrap();
    assert_eq!(doc.get_status().unwrap(), DocumentStatus::Failed);

    let report = cmd_verify_document(&t.ctx, "alice", &outcome.document_id)
        .await
        .unwrap();
    assert!(!report.consistent);
}
