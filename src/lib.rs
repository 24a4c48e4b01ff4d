//! # docdex
//!
//! A document ingestion and semantic retrieval engine for chat assistants.
//!
//! docdex keeps a chunk-level vector index synchronized with a directory
//! of documents across repeated runs. Each ingestion pass diffs the
//! current document set against the index by content fingerprint and only
//! re-processes what actually changed; queries embed free text and return
//! the most similar chunks with their source citations.
//!
//! ```text
//! ┌──────────────┐   ┌──────────────────┐   ┌────────────┐
//! │ Doc source   │──▶│ Chunker + Embed   │──▶│  SQLite    │
//! │ (PDF/MD/TXT) │   │ (diff-driven)     │   │ docs+chunks│
//! └──────────────┘   └──────────────────┘   └─────┬──────┘
//!                                                 ▼
//!                                          ┌─────────────┐
//!                                          │ Semantic     │
//!                                          │ search (topK)│
//!                                          └─────────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration, validated at startup |
//! | [`models`] | Core data types |
//! | [`source`] | Document source trait + filesystem scan |
//! | [`extract`] | PDF / plain-text page extraction |
//! | [`chunk`] | Deterministic text chunking |
//! | [`embedding`] | Embedding provider boundary + vector utilities |
//! | [`store`] | Vector index storage (SQLite, in-memory) |
//! | [`ingest`] | Diff-driven ingestion coordinator |
//! | [`search`] | Semantic search service |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod chunk;
pub mod config;
pub mod db;
pub mod embedding;
pub mod extract;
pub mod ingest;
pub mod migrate;
pub mod models;
pub mod search;
pub mod source;
pub mod store;
