//! Embedding gateway.
//!
//! [`EmbeddingProvider`] is the seam between the pipeline and the external
//! embedding service: a batch of texts in, one fixed-length vector per text
//! out, in the same order. Two implementations ship:
//!
//! - [`OpenAiProvider`] — OpenAI-compatible `POST /embeddings` with bounded
//!   retries and exponential backoff (429/5xx and network errors retry,
//!   other 4xx fail immediately).
//! - [`DisabledProvider`] — always errors; lets commands that never embed
//!   (`init`, `stats`, `sync --dry-run`) run without credentials.
//!
//! Also home to the vector utilities: f32 little-endian blob encoding for
//! SQLite storage and cosine similarity.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use crate::config::{ConfigError, EmbeddingConfig};

const OPENAI_EMBEDDINGS_URL: &str = "https://api.openai.com/v1/embeddings";

/// Failure talking to the embedding service. Retryable per batch at the
/// coordinator level; fatal for a document once retries are exhausted.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("embedding provider is disabled")]
    Disabled,
    #[error("embedding request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("embedding service returned {status}: {body}")]
    Service { status: u16, body: String },
    #[error("malformed embedding response: {0}")]
    MalformedResponse(String),
    #[error("expected {expected} vectors of {dims} dims, got {got}")]
    ShapeMismatch {
        expected: usize,
        got: usize,
        dims: usize,
    },
    #[error("embedding failed after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: String },
}

/// External embedding service boundary.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Model identifier, e.g. `"text-embedding-3-small"`.
    fn model_name(&self) -> &str;

    /// Vector dimensionality every response must match.
    fn dims(&self) -> usize;

    /// Embed a batch of texts, one vector per input, input order preserved.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError>;
}

/// Build the provider named by the config. Missing credentials are a
/// startup error, not a per-request one.
pub fn create_provider(config: &EmbeddingConfig) -> Result<Arc<dyn EmbeddingProvider>, ConfigError> {
    match config.provider.as_str() {
        "disabled" => Ok(Arc::new(DisabledProvider)),
        "openai" => {
            let api_key = std::env::var("OPENAI_API_KEY").map_err(|_| {
                ConfigError::Invalid(
                    "OPENAI_API_KEY environment variable not set".to_string(),
                )
            })?;
            Ok(Arc::new(OpenAiProvider::new(config, api_key)?))
        }
        other => Err(ConfigError::Invalid(format!(
            "unknown embedding provider: {}",
            other
        ))),
    }
}

/// No-op provider used when embeddings are not configured.
pub struct DisabledProvider;

#[async_trait]
impl EmbeddingProvider for DisabledProvider {
    fn model_name(&self) -> &str {
        "disabled"
    }
    fn dims(&self) -> usize {
        0
    }
    async fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        Err(EmbeddingError::Disabled)
    }
}

/// OpenAI-compatible embeddings client.
pub struct OpenAiProvider {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    dims: usize,
    max_retries: u32,
}

impl OpenAiProvider {
    pub fn new(config: &EmbeddingConfig, api_key: String) -> Result<Self, ConfigError> {
        let model = config.model.clone().ok_or_else(|| {
            ConfigError::Invalid("embedding.model required for openai provider".to_string())
        })?;
        let dims = config.dims.ok_or_else(|| {
            ConfigError::Invalid("embedding.dims required for openai provider".to_string())
        })?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ConfigError::Invalid(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: config
                .api_base
                .clone()
                .unwrap_or_else(|| OPENAI_EMBEDDINGS_URL.to_string()),
            api_key,
            model,
            dims,
            max_retries: config.max_retries,
        })
    }

    async fn request_once(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
        });

        let response = self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(EmbeddingError::Service {
                status: status.as_u16(),
                body: body_text,
            });
        }

        let json: serde_json::Value = response.json().await?;
        let vectors = parse_response(&json)?;

        if vectors.len() != texts.len() || vectors.iter().any(|v| v.len() != self.dims) {
            return Err(EmbeddingError::ShapeMismatch {
                expected: texts.len(),
                got: vectors.len(),
                dims: self.dims,
            });
        }

        Ok(vectors)
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiProvider {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let mut last_err: Option<EmbeddingError> = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                // Backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped).
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                debug!(attempt, delay_secs = delay.as_secs(), "retrying embedding batch");
                tokio::time::sleep(delay).await;
            }

            match self.request_once(texts).await {
                Ok(vectors) => return Ok(vectors),
                // Rate limits and server errors are transient.
                Err(EmbeddingError::Service { status, body }) if status == 429 || status >= 500 => {
                    last_err = Some(EmbeddingError::Service { status, body });
                }
                Err(EmbeddingError::Transport(e)) => {
                    last_err = Some(EmbeddingError::Transport(e));
                }
                Err(e) => return Err(e),
            }
        }

        Err(EmbeddingError::RetriesExhausted {
            attempts: self.max_retries + 1,
            last: last_err
                .map(|e| e.to_string())
                .unwrap_or_else(|| "unknown error".to_string()),
        })
    }
}

fn parse_response(json: &serde_json::Value) -> Result<Vec<Vec<f32>>, EmbeddingError> {
    let data = json
        .get("data")
        .and_then(|d| d.as_array())
        .ok_or_else(|| EmbeddingError::MalformedResponse("missing data array".to_string()))?;

    let mut indexed: Vec<(i64, Vec<f32>)> = Vec::with_capacity(data.len());

    for (position, item) in data.iter().enumerate() {
        let embedding = item
            .get("embedding")
            .and_then(|e| e.as_array())
            .ok_or_else(|| {
                EmbeddingError::MalformedResponse("missing embedding field".to_string())
            })?;

        let mut vector = Vec::with_capacity(embedding.len());
        for value in embedding {
            let value = value.as_f64().ok_or_else(|| {
                EmbeddingError::MalformedResponse("non-numeric embedding element".to_string())
            })?;
            vector.push(value as f32);
        }

        let index = item
            .get("index")
            .and_then(|i| i.as_i64())
            .unwrap_or(position as i64);

        indexed.push((index, vector));
    }

    // The API may return entries out of order; input order is part of the
    // contract here.
    indexed.sort_by_key(|(index, _)| *index);
    Ok(indexed.into_iter().map(|(_, v)| v).collect())
}

/// Encode a vector as little-endian f32 bytes for BLOB storage.
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for &v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decode a BLOB produced by [`vec_to_blob`].
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Cosine similarity in `[-1.0, 1.0]`. Mismatched or empty vectors score 0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }
    dot / denom
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blob_roundtrip() {
        let vec = vec![1.0f32, -2.5, 3.125, 0.0, -0.001];
        assert_eq!(blob_to_vec(&vec_to_blob(&vec)), vec);
    }

    #[test]
    fn cosine_identical_and_opposite() {
        let v = vec![1.0, 2.0, 3.0];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
        let a = vec![1.0, 0.0];
        let b = vec![-1.0, 0.0];
        assert!((cosine_similarity(&a, &b) + 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_degenerate_inputs_score_zero() {
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&[1.0, 2.0], &[1.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
    }

    #[test]
    fn response_entries_sorted_by_index() {
        let json = serde_json::json!({
            "data": [
                { "index": 1, "embedding": [2.0, 2.0] },
                { "index": 0, "embedding": [1.0, 1.0] },
            ]
        });
        let vectors = parse_response(&json).unwrap();
        assert_eq!(vectors, vec![vec![1.0, 1.0], vec![2.0, 2.0]]);
    }

    #[test]
    fn non_numeric_embedding_element_is_malformed() {
        let json = serde_json::json!({
            "data": [
                { "index": 0, "embedding": [1.0, "oops", 3.0] },
            ]
        });
        assert!(matches!(
            parse_response(&json),
            Err(EmbeddingError::MalformedResponse(_))
        ));
    }

    #[test]
    fn missing_data_is_malformed() {
        let json = serde_json::json!({ "error": "nope" });
        assert!(matches!(
            parse_response(&json),
            Err(EmbeddingError::MalformedResponse(_))
        ));
    }

    #[tokio::test]
    async fn disabled_provider_always_errors() {
        let provider = DisabledProvider;
        let result = provider.embed(&["hello".to_string()]).await;
        assert!(matches!(result, Err(EmbeddingError::Disabled)));
    }
}
