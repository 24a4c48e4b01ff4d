//! SQLite backend tests against a real file-backed database.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

use docdex::db;
use docdex::migrate;
use docdex::models::{ChunkRecord, DocumentRecord};
use docdex::store::sqlite::SqliteStore;
use docdex::store::{Store, StoreError};

async fn open_store(tmp: &TempDir) -> SqliteStore {
    let pool = db::connect(&tmp.path().join("index.sqlite")).await.unwrap();
    migrate::run_migrations(&pool).await.unwrap();
    SqliteStore::new(pool)
}

fn doc(key: &str, fingerprint: &str) -> DocumentRecord {
    DocumentRecord {
        key: key.to_string(),
        fingerprint: fingerprint.to_string(),
        ingested_at: 1_700_000_000,
    }
}

fn chunk(doc_key: &str, ordinal: i64, page: i64, text: &str) -> ChunkRecord {
    ChunkRecord {
        doc_key: doc_key.to_string(),
        ordinal,
        page,
        text: text.to_string(),
    }
}

#[tokio::test]
async fn migrations_are_idempotent() {
    let tmp = TempDir::new().unwrap();
    let pool = db::connect(&tmp.path().join("index.sqlite")).await.unwrap();
    migrate::run_migrations(&pool).await.unwrap();
    migrate::run_migrations(&pool).await.unwrap();
}

#[tokio::test]
async fn replace_persists_document_and_chunks() {
    let tmp = TempDir::new().unwrap();
    let store = open_store(&tmp).await;

    store
        .replace_document(
            &doc("guide.pdf", "f1"),
            &[
                chunk("guide.pdf", 0, 1, "intro"),
                chunk("guide.pdf", 1, 2, "details"),
            ],
            &[vec![1.0, 0.0], vec![0.0, 1.0]],
        )
        .await
        .unwrap();

    let stored = store.get_document("guide.pdf").await.unwrap().unwrap();
    assert_eq!(stored.fingerprint, "f1");
    assert_eq!(store.chunk_count().await.unwrap(), 2);

    let hits = store.vector_search(&[0.0, 1.0], 1).await.unwrap();
    assert_eq!(hits[0].text, "details");
    assert_eq!(hits[0].page, 2);
}

#[tokio::test]
async fn replace_swaps_chunk_set_without_leftovers() {
    let tmp = TempDir::new().unwrap();
    let store = open_store(&tmp).await;

    store
        .replace_document(
            &doc("guide.pdf", "f1"),
            &[
                chunk("guide.pdf", 0, 1, "old a"),
                chunk("guide.pdf", 1, 1, "old b"),
                chunk("guide.pdf", 2, 2, "old c"),
            ],
            &[vec![1.0], vec![1.0], vec![1.0]],
        )
        .await
        .unwrap();

    store
        .replace_document(
            &doc("guide.pdf", "f2"),
            &[chunk("guide.pdf", 0, 1, "new only")],
            &[vec![1.0]],
        )
        .await
        .unwrap();

    assert_eq!(store.chunk_count().await.unwrap(), 1);
    let stored = store.get_document("guide.pdf").await.unwrap().unwrap();
    assert_eq!(stored.fingerprint, "f2");

    let hits = store.vector_search(&[1.0], 10).await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].text, "new only");
}

#[tokio::test]
async fn failed_replace_leaves_previous_state_intact() {
    let tmp = TempDir::new().unwrap();
    let store = open_store(&tmp).await;

    store
        .replace_document(
            &doc("guide.pdf", "f1"),
            &[chunk("guide.pdf", 0, 1, "original")],
            &[vec![1.0]],
        )
        .await
        .unwrap();

    // Mismatched vector count is rejected before any row is touched.
    let result = store
        .replace_document(
            &doc("guide.pdf", "f2"),
            &[chunk("guide.pdf", 0, 1, "replacement")],
            &[],
        )
        .await;
    assert!(matches!(result, Err(StoreError::VectorCountMismatch { .. })));

    let stored = store.get_document("guide.pdf").await.unwrap().unwrap();
    assert_eq!(stored.fingerprint, "f1");
    let hits = store.vector_search(&[1.0], 10).await.unwrap();
    assert_eq!(hits[0].text, "original");
}

#[tokio::test]
async fn delete_removes_document_and_its_chunks_only() {
    let tmp = TempDir::new().unwrap();
    let store = open_store(&tmp).await;

    store
        .replace_document(
            &doc("a.pdf", "f1"),
            &[chunk("a.pdf", 0, 1, "a body")],
            &[vec![1.0]],
        )
        .await
        .unwrap();
    store
        .replace_document(
            &doc("b.pdf", "f2"),
            &[chunk("b.pdf", 0, 1, "b body")],
            &[vec![1.0]],
        )
        .await
        .unwrap();

    store.delete_document("a.pdf").await.unwrap();

    assert!(store.get_document("a.pdf").await.unwrap().is_none());
    assert_eq!(store.document_count().await.unwrap(), 1);
    assert_eq!(store.chunk_count().await.unwrap(), 1);
    let hits = store.vector_search(&[1.0], 10).await.unwrap();
    assert_eq!(hits[0].doc_key, "b.pdf");
}

#[tokio::test]
async fn delete_missing_key_is_a_noop() {
    let tmp = TempDir::new().unwrap();
    let store = open_store(&tmp).await;
    store.delete_document("never-ingested.pdf").await.unwrap();
    assert_eq!(store.document_count().await.unwrap(), 0);
}

#[tokio::test]
async fn list_documents_sorted_by_key() {
    let tmp = TempDir::new().unwrap();
    let store = open_store(&tmp).await;

    for key in ["z.pdf", "a.pdf", "m.pdf"] {
        store
            .replace_document(&doc(key, "f"), &[], &[])
            .await
            .unwrap();
    }

    let docs = store.list_documents().await.unwrap();
    let keys: Vec<&str> = docs.iter().map(|d| d.key.as_str()).collect();
    assert_eq!(keys, vec!["a.pdf", "m.pdf", "z.pdf"]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn readers_never_observe_a_partial_replace() {
    let tmp = TempDir::new().unwrap();
    let store = Arc::new(open_store(&tmp).await);

    fn version(tag: &str) -> (DocumentRecord, Vec<ChunkRecord>, Vec<Vec<f32>>) {
        let chunks: Vec<ChunkRecord> = (0..3)
            .map(|i| chunk("flip.pdf", i, 1, &format!("{tag} {i}")))
            .collect();
        (doc("flip.pdf", tag), chunks, vec![vec![1.0]; 3])
    }

    let (d, chunks, vectors) = version("old");
    store.replace_document(&d, &chunks, &vectors).await.unwrap();

    // Readers hammer the index while the writer flips the document between
    // two versions. Every observed result set must be one whole version:
    // never empty mid-replace, never a mix of old and new chunks.
    let done = Arc::new(AtomicBool::new(false));
    let mut readers = Vec::new();
    for _ in 0..4 {
        let store = Arc::clone(&store);
        let done = Arc::clone(&done);
        readers.push(tokio::spawn(async move {
            while !done.load(Ordering::SeqCst) {
                let hits = store.vector_search(&[1.0], 10).await.unwrap();
                assert_eq!(hits.len(), 3, "partial chunk set observed");
                let tag = hits[0].text.split(' ').next().unwrap().to_string();
                for hit in &hits {
                    assert!(
                        hit.text.starts_with(&tag),
                        "mixed chunk set observed: {hits:?}"
                    );
                }
            }
        }));
    }

    for round in 0..40u32 {
        let tag = if round % 2 == 0 { "new" } else { "old" };
        let (d, chunks, vectors) = version(tag);
        store.replace_document(&d, &chunks, &vectors).await.unwrap();
    }

    done.store(true, Ordering::SeqCst);
    for reader in readers {
        reader.await.unwrap();
    }
}

#[tokio::test]
async fn vector_roundtrip_through_blob_storage() {
    let tmp = TempDir::new().unwrap();
    let store = open_store(&tmp).await;

    let vector = vec![0.25f32, -1.5, 3.125];
    store
        .replace_document(
            &doc("v.pdf", "f"),
            &[chunk("v.pdf", 0, 1, "body")],
            &[vector.clone()],
        )
        .await
        .unwrap();

    // An identical query vector must score ~1.0 after the blob roundtrip.
    let hits = store.vector_search(&vector, 1).await.unwrap();
    assert!((hits[0].score - 1.0).abs() < 1e-6);
}
