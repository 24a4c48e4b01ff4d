//! Vector index storage.
//!
//! The [`Store`] trait holds the two keyed collections the diff algorithm
//! depends on: documents (`key → fingerprint`) and chunks
//! (`(doc_key, ordinal) → text + vector`). Replacing a document swaps its
//! entire chunk set in one atomic step, so a concurrent reader sees either
//! the old chunk set or the new one, never a mix and never an empty gap.
//!
//! Backends: [`SqliteStore`](sqlite::SqliteStore) for persistence,
//! [`MemoryStore`](memory::MemoryStore) for tests.

pub mod memory;
pub mod sqlite;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{ChunkRecord, DocumentRecord, SearchHit};

/// Storage failure. Fatal for the document being written; an ingestion run
/// keeps going for other documents.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("chunk/vector count mismatch for {key}: {chunks} chunks, {vectors} vectors")]
    VectorCountMismatch {
        key: String,
        chunks: usize,
        vectors: usize,
    },
}

/// Persistent keyed collections with vector similarity search.
///
/// The ingestion coordinator is the only writer; search is read-only.
#[async_trait]
pub trait Store: Send + Sync {
    /// All document records currently in the index.
    async fn list_documents(&self) -> Result<Vec<DocumentRecord>, StoreError>;

    /// One document record by key.
    async fn get_document(&self, key: &str) -> Result<Option<DocumentRecord>, StoreError>;

    /// Upsert the document record and replace its entire chunk set.
    ///
    /// `chunks` and `vectors` are parallel slices; the replacement is
    /// observed atomically by concurrent readers.
    async fn replace_document(
        &self,
        doc: &DocumentRecord,
        chunks: &[ChunkRecord],
        vectors: &[Vec<f32>],
    ) -> Result<(), StoreError>;

    /// Delete a document and all of its chunks.
    async fn delete_document(&self, key: &str) -> Result<(), StoreError>;

    /// Nearest-neighbor search over chunk vectors: top `k` by cosine
    /// similarity, highest first.
    async fn vector_search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>, StoreError>;

    async fn document_count(&self) -> Result<u64, StoreError>;

    async fn chunk_count(&self) -> Result<u64, StoreError>;
}

pub(crate) fn check_vector_count(
    doc: &DocumentRecord,
    chunks: &[ChunkRecord],
    vectors: &[Vec<f32>],
) -> Result<(), StoreError> {
    if chunks.len() != vectors.len() {
        return Err(StoreError::VectorCountMismatch {
            key: doc.key.clone(),
            chunks: chunks.len(),
            vectors: vectors.len(),
        });
    }
    Ok(())
}
