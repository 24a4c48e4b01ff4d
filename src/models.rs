//! Core data types shared across the ingestion and retrieval pipeline.
//!
//! A document is identified by its stable source key (the path relative to
//! the source root). Chunks are identified by `(doc_key, ordinal)`; they
//! carry the page they were cut from so search results can cite a position.

/// A document record as persisted in the index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentRecord {
    /// Stable source key, unique across the index.
    pub key: String,
    /// SHA-256 of the raw source bytes; change detection happens here.
    pub fingerprint: String,
    /// Unix timestamp of the last successful ingestion of this document.
    pub ingested_at: i64,
}

/// One bounded passage of a document's text, the unit of embedding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkRecord {
    pub doc_key: String,
    /// Position within the document; contiguous from 0.
    pub ordinal: i64,
    /// 1-based page the chunk starts on.
    pub page: i64,
    pub text: String,
}

/// A structural unit of extracted text (a PDF page, or the whole file for
/// plain-text formats).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    /// 1-based page number.
    pub number: i64,
    pub text: String,
}

/// Cheap listing entry produced by a document source scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceEntry {
    pub key: String,
    pub fingerprint: String,
}

/// A scored search result.
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub doc_key: String,
    pub ordinal: i64,
    pub page: i64,
    pub text: String,
    /// Cosine similarity against the query vector, in `[-1.0, 1.0]`.
    pub score: f32,
}

impl SearchHit {
    /// Human-readable citation for downstream chat layers.
    pub fn citation(&self) -> String {
        format!("{}#page={}", self.doc_key, self.page)
    }
}
