//! SQLite-backed [`Store`].
//!
//! Schema: `documents(key PRIMARY KEY, fingerprint, ingested_at)` and
//! `chunks(doc_key, ordinal, page, text, embedding)` with a composite
//! primary key on `(doc_key, ordinal)`. Vectors are little-endian f32
//! blobs. Document replacement runs delete-then-insert inside a single
//! transaction; with WAL journaling, readers keep seeing the old chunk set
//! until the commit lands.
//!
//! Similarity search is brute-force: all vectors are loaded and scored in
//! process. Fine at the corpus sizes this serves; an ANN index can slot in
//! behind the same trait if that stops being true.

use async_trait::async_trait;
use sqlx::{Row, SqlitePool};

use crate::embedding::{blob_to_vec, cosine_similarity, vec_to_blob};
use crate::models::{ChunkRecord, DocumentRecord, SearchHit};

use super::{check_vector_count, Store, StoreError};

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl Store for SqliteStore {
    async fn list_documents(&self) -> Result<Vec<DocumentRecord>, StoreError> {
        let rows =
            sqlx::query("SELECT key, fingerprint, ingested_at FROM documents ORDER BY key ASC")
                .fetch_all(&self.pool)
                .await?;

        Ok(rows
            .iter()
            .map(|row| DocumentRecord {
                key: row.get("key"),
                fingerprint: row.get("fingerprint"),
                ingested_at: row.get("ingested_at"),
            })
            .collect())
    }

    async fn get_document(&self, key: &str) -> Result<Option<DocumentRecord>, StoreError> {
        let row = sqlx::query("SELECT key, fingerprint, ingested_at FROM documents WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|r| DocumentRecord {
            key: r.get("key"),
            fingerprint: r.get("fingerprint"),
            ingested_at: r.get("ingested_at"),
        }))
    }

    async fn replace_document(
        &self,
        doc: &DocumentRecord,
        chunks: &[ChunkRecord],
        vectors: &[Vec<f32>],
    ) -> Result<(), StoreError> {
        check_vector_count(doc, chunks, vectors)?;

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO documents (key, fingerprint, ingested_at)
            VALUES (?, ?, ?)
            ON CONFLICT(key) DO UPDATE SET
                fingerprint = excluded.fingerprint,
                ingested_at = excluded.ingested_at
            "#,
        )
        .bind(&doc.key)
        .bind(&doc.fingerprint)
        .bind(doc.ingested_at)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM chunks WHERE doc_key = ?")
            .bind(&doc.key)
            .execute(&mut *tx)
            .await?;

        for (chunk, vector) in chunks.iter().zip(vectors.iter()) {
            sqlx::query(
                "INSERT INTO chunks (doc_key, ordinal, page, text, embedding) VALUES (?, ?, ?, ?, ?)",
            )
            .bind(&chunk.doc_key)
            .bind(chunk.ordinal)
            .bind(chunk.page)
            .bind(&chunk.text)
            .bind(vec_to_blob(vector))
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn delete_document(&self, key: &str) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM chunks WHERE doc_key = ?")
            .bind(key)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM documents WHERE key = ?")
            .bind(key)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn vector_search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>, StoreError> {
        let rows = sqlx::query("SELECT doc_key, ordinal, page, text, embedding FROM chunks")
            .fetch_all(&self.pool)
            .await?;

        let mut hits: Vec<SearchHit> = rows
            .iter()
            .map(|row| {
                let blob: Vec<u8> = row.get("embedding");
                let vector = blob_to_vec(&blob);
                SearchHit {
                    doc_key: row.get("doc_key"),
                    ordinal: row.get("ordinal"),
                    page: row.get("page"),
                    text: row.get("text"),
                    score: cosine_similarity(query, &vector),
                }
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
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM documents")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }

    async fn chunk_count(&self) -> Result<u64, StoreError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chunks")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }
}
