//! Ingestion coordination.
//!
//! Each run reconciles the document source against the persisted index:
//! the source's `(key, fingerprint)` listing is diffed against the stored
//! document records, producing one decision per key — new, modified,
//! removed, or unchanged. New and modified documents flow through
//! extraction → chunking → embedding → atomic replacement; removed keys
//! are deleted outright; unchanged keys are not touched, which is what
//! makes a second run over an unchanged source write nothing.
//!
//! Per-document work runs on a bounded set of tokio tasks. A failure in
//! one document (unreadable file, embedding retries exhausted, store
//! write error) is recorded in the run report and never blocks the rest
//! of the run. A failed document keeps its previous index state and its
//! old fingerprint, so the next run picks it up again.

use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::chunk::chunk_pages;
use crate::config::{ChunkingConfig, EmbeddingConfig};
use crate::embedding::{EmbeddingError, EmbeddingProvider};
use crate::models::{DocumentRecord, SourceEntry};
use crate::source::{DocumentSource, SourceError};
use crate::store::{Store, StoreError};

/// Why one document failed to ingest. Collected per key; never aborts the
/// run.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error(transparent)]
    Embedding(#[from] EmbeddingError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// The per-key decisions for one run, computed before any write happens.
#[derive(Debug, Default)]
pub struct IngestPlan {
    /// Keys present only in the source.
    pub add: Vec<SourceEntry>,
    /// Keys present in both with differing fingerprints.
    pub update: Vec<SourceEntry>,
    /// Keys present only in the index.
    pub remove: Vec<String>,
    /// Keys present in both with matching fingerprints.
    pub unchanged: usize,
}

impl IngestPlan {
    pub fn is_noop(&self) -> bool {
        self.add.is_empty() && self.update.is_empty() && self.remove.is_empty()
    }
}

/// One failed document in a run report.
#[derive(Debug)]
pub struct DocumentFailure {
    pub key: String,
    pub error: String,
}

/// Aggregate outcome of one ingestion run.
#[derive(Debug, Default)]
pub struct IngestReport {
    pub added: usize,
    pub updated: usize,
    pub removed: usize,
    pub unchanged: usize,
    pub failed: usize,
    pub chunks_written: u64,
    pub failures: Vec<DocumentFailure>,
}

/// Drives the source → chunker → embedder → store pipeline. The only
/// writer to the index.
pub struct Ingestor {
    store: Arc<dyn Store>,
    provider: Arc<dyn EmbeddingProvider>,
    chunking: ChunkingConfig,
    batch_size: usize,
    concurrency: usize,
}

impl Ingestor {
    pub fn new(
        store: Arc<dyn Store>,
        provider: Arc<dyn EmbeddingProvider>,
        chunking: ChunkingConfig,
        embedding: &EmbeddingConfig,
    ) -> Self {
        Self {
            store,
            provider,
            chunking,
            batch_size: embedding.batch_size.max(1),
            concurrency: embedding.concurrency.max(1),
        }
    }

    /// Diff the source against the index without writing anything.
    ///
    /// With `full` set, every key present in the source is scheduled as an
    /// update regardless of fingerprint; removals are still honored.
    pub async fn plan(
        &self,
        source: &dyn DocumentSource,
        full: bool,
    ) -> Result<IngestPlan, IngestError> {
        let entries = source.list().await?;
        let existing = self.store.list_documents().await?;

        let mut by_key: HashMap<&str, &DocumentRecord> =
            existing.iter().map(|d| (d.key.as_str(), d)).collect();

        let mut plan = IngestPlan::default();
        for entry in entries {
            match by_key.remove(entry.key.as_str()) {
                None => plan.add.push(entry),
                Some(stored) if full || stored.fingerprint != entry.fingerprint => {
                    plan.update.push(entry)
                }
                Some(_) => plan.unchanged += 1,
            }
        }
        // Whatever is left in the map exists only in the index.
        plan.remove = by_key.keys().map(|k| k.to_string()).collect();
        plan.remove.sort();

        Ok(plan)
    }

    /// Execute one full ingestion run.
    pub async fn run(
        &self,
        source: Arc<dyn DocumentSource>,
        full: bool,
    ) -> Result<IngestReport, IngestError> {
        let plan = self.plan(source.as_ref(), full).await?;
        info!(
            source = source.name(),
            add = plan.add.len(),
            update = plan.update.len(),
            remove = plan.remove.len(),
            unchanged = plan.unchanged,
            "ingestion plan computed"
        );

        let mut report = IngestReport {
            unchanged: plan.unchanged,
            ..Default::default()
        };

        for key in &plan.remove {
            match self.store.delete_document(key).await {
                Ok(()) => report.removed += 1,
                Err(e) => {
                    warn!(key = %key, error = %e, "failed to delete document");
                    report.failed += 1;
                    report.failures.push(DocumentFailure {
                        key: key.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }

        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut tasks: JoinSet<(String, bool, Result<u64, IngestError>)> = JoinSet::new();

        let work = plan
            .add
            .into_iter()
            .map(|e| (e, false))
            .chain(plan.update.into_iter().map(|e| (e, true)));

        for (entry, is_update) in work {
            let store = Arc::clone(&self.store);
            let provider = Arc::clone(&self.provider);
            let source = Arc::clone(&source);
            let chunking = self.chunking.clone();
            let batch_size = self.batch_size;
            let semaphore = Arc::clone(&semaphore);

            tasks.spawn(async move {
                // Closed only on drop; acquire cannot fail while we hold it.
                let _permit = semaphore.acquire_owned().await.expect("semaphore closed");
                let key = entry.key.clone();
                let result =
                    ingest_document(store, provider, source, chunking, batch_size, entry).await;
                (key, is_update, result)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((_, is_update, Ok(chunks))) => {
                    report.chunks_written += chunks;
                    if is_update {
                        report.updated += 1;
                    } else {
                        report.added += 1;
                    }
                }
                Ok((key, _, Err(e))) => {
                    warn!(key = %key, error = %e, "document ingestion failed");
                    report.failed += 1;
                    report.failures.push(DocumentFailure {
                        key,
                        error: e.to_string(),
                    });
                }
                Err(e) => {
                    warn!(error = %e, "ingestion task panicked");
                    report.failed += 1;
                    report.failures.push(DocumentFailure {
                        key: "<unknown>".to_string(),
                        error: e.to_string(),
                    });
                }
            }
        }

        info!(
            added = report.added,
            updated = report.updated,
            removed = report.removed,
            unchanged = report.unchanged,
            failed = report.failed,
            chunks_written = report.chunks_written,
            "ingestion run complete"
        );

        Ok(report)
    }
}

/// Ingest one new or modified document: fetch pages, chunk, embed in
/// batches, then atomically replace the stored document. Any error leaves
/// the document's previous index state intact.
async fn ingest_document(
    store: Arc<dyn Store>,
    provider: Arc<dyn EmbeddingProvider>,
    source: Arc<dyn DocumentSource>,
    chunking: ChunkingConfig,
    batch_size: usize,
    entry: SourceEntry,
) -> Result<u64, IngestError> {
    let pages = source.fetch(&entry.key).await?;
    let chunks = chunk_pages(&entry.key, &pages, &chunking);

    let mut vectors: Vec<Vec<f32>> = Vec::with_capacity(chunks.len());
    for batch in chunks.chunks(batch_size) {
        let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
        vectors.extend(provider.embed(&texts).await?);
    }

    let doc = DocumentRecord {
        key: entry.key,
        fingerprint: entry.fingerprint,
        ingested_at: Utc::now().timestamp(),
    };
    store.replace_document(&doc, &chunks, &vectors).await?;

    Ok(chunks.len() as u64)
}
