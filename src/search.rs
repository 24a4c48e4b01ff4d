//! Semantic search service.
//!
//! Read-only query surface over the vector index: validate, embed the
//! query, rank stored chunks by cosine similarity, return the top K. An
//! empty index is an empty result, not an error; a store failure is an
//! error, never masked as an empty result.

use std::sync::Arc;
use thiserror::Error;

use crate::embedding::{EmbeddingError, EmbeddingProvider};
use crate::models::SearchHit;
use crate::store::{Store, StoreError};

/// Input rejected before the embedding gateway is ever invoked.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueryValidationError {
    #[error("query must not be empty")]
    EmptyQuery,
    #[error("result count must be >= 1, got {0}")]
    InvalidLimit(i64),
}

#[derive(Debug, Error)]
pub enum SearchError {
    #[error(transparent)]
    Validation(#[from] QueryValidationError),
    #[error(transparent)]
    Embedding(#[from] EmbeddingError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

pub struct SemanticSearch {
    store: Arc<dyn Store>,
    provider: Arc<dyn EmbeddingProvider>,
}

impl SemanticSearch {
    pub fn new(store: Arc<dyn Store>, provider: Arc<dyn EmbeddingProvider>) -> Self {
        Self { store, provider }
    }

    /// Top `k` chunks most similar to `query`, highest similarity first.
    /// At most `k` results; fewer only when the index holds fewer chunks.
    pub async fn search(&self, query: &str, k: i64) -> Result<Vec<SearchHit>, SearchError> {
        if query.trim().is_empty() {
            return Err(QueryValidationError::EmptyQuery.into());
        }
        if k < 1 {
            return Err(QueryValidationError::InvalidLimit(k).into());
        }

        let query_vec = self
            .provider
            .embed(std::slice::from_ref(&query.to_string()))
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| {
                EmbeddingError::MalformedResponse("empty embedding response".to_string())
            })?;

        let hits = self.store.vector_search(&query_vec, k as usize).await?;
        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::DisabledProvider;
    use crate::store::memory::MemoryStore;

    fn service() -> SemanticSearch {
        SemanticSearch::new(Arc::new(MemoryStore::new()), Arc::new(DisabledProvider))
    }

    #[tokio::test]
    async fn empty_query_rejected_before_embedding() {
        // DisabledProvider errors on any embed call, so getting a
        // validation error back proves the gateway was never reached.
        let result = service().search("   ", 5).await;
        assert!(matches!(
            result,
            Err(SearchError::Validation(QueryValidationError::EmptyQuery))
        ));
    }

    #[tokio::test]
    async fn non_positive_k_rejected_before_embedding() {
        for k in [0, -3] {
            let result = service().search("anything", k).await;
            assert!(matches!(
                result,
                Err(SearchError::Validation(QueryValidationError::InvalidLimit(got))) if got == k
            ));
        }
    }
}
