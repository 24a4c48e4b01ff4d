//! In-memory [`Store`] used by tests.
//!
//! HashMap/Vec behind `std::sync::RwLock`; vector search is brute-force
//! cosine similarity, matching the SQLite backend's semantics. Write
//! operations are counted so tests can assert that an unchanged source
//! produces a write-free second ingestion pass.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use async_trait::async_trait;

use crate::embedding::cosine_similarity;
use crate::models::{ChunkRecord, DocumentRecord, SearchHit};

use super::{check_vector_count, Store, StoreError};

#[derive(Default)]
pub struct MemoryStore {
    docs: RwLock<HashMap<String, DocumentRecord>>,
    chunks: RwLock<Vec<(ChunkRecord, Vec<f32>)>>,
    write_ops: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of replace/delete operations performed so far.
    pub fn write_ops(&self) -> u64 {
        self.write_ops.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn list_documents(&self) -> Result<Vec<DocumentRecord>, StoreError> {
        let docs = self.docs.read().unwrap();
        let mut records: Vec<DocumentRecord> = docs.values().cloned().collect();
        records.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(records)
    }

    async fn get_document(&self, key: &str) -> Result<Option<DocumentRecord>, StoreError> {
        Ok(self.docs.read().unwrap().get(key).cloned())
    }

    async fn replace_document(
        &self,
        doc: &DocumentRecord,
        chunks: &[ChunkRecord],
        vectors: &[Vec<f32>],
    ) -> Result<(), StoreError> {
        check_vector_count(doc, chunks, vectors)?;
        self.write_ops.fetch_add(1, Ordering::SeqCst);

        // Both locks held for the whole swap: readers see old or new,
        // never a partially replaced document.
        let mut docs = self.docs.write().unwrap();
        let mut stored = self.chunks.write().unwrap();

        docs.insert(doc.key.clone(), doc.clone());
        stored.retain(|(c, _)| c.doc_key != doc.key);
        for (chunk, vector) in chunks.iter().zip(vectors.iter()) {
            stored.push((chunk.clone(), vector.clone()));
        }

        Ok(())
    }

    async fn delete_document(&self, key: &str) -> Result<(), StoreError> {
        self.write_ops.fetch_add(1, Ordering::SeqCst);

        let mut docs = self.docs.write().unwrap();
        let mut stored = self.chunks.write().unwrap();
        docs.remove(key);
        stored.retain(|(c, _)| c.doc_key != key);
        Ok(())
    }

    async fn vector_search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>, StoreError> {
        let stored = self.chunks.read().unwrap();
        let mut hits: Vec<SearchHit> = stored
            .iter()
            .map(|(chunk, vector)| SearchHit {
                doc_key: chunk.doc_key.clone(),
                ordinal: chunk.ordinal,
                page: chunk.page,
                text: chunk.text.clone(),
                score: cosine_similarity(query, vector),
            })
            .collect();

        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.doc_key.cmp(&b.doc_key))
                .then_with(|| a.ordinal.cmp(&b.ordinal))
        });
        hits.truncate(k);
        Ok(hits)
    }

    async fn document_count(&self) -> Result<u64, StoreError> {
        Ok(self.docs.read().unwrap().len() as u64)
    }

    async fn chunk_count(&self) -> Result<u64, StoreError> {
        Ok(self.chunks.read().unwrap().len() as u64)
    }
}
