//! Document sources.
//!
//! A [`DocumentSource`] enumerates the documents currently present at an
//! external origin. Listing is split from fetching so the ingestion
//! coordinator can diff `(key, fingerprint)` pairs against the index
//! without extracting text for documents that have not changed.
//!
//! The built-in [`FilesystemSource`] scans a directory with include/exclude
//! globs, mirroring the layout the chat application ingests at startup.

use async_trait::async_trait;
use globset::{Glob, GlobSet, GlobSetBuilder};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;
use walkdir::WalkDir;

use crate::config::SourceConfig;
use crate::extract::{self, ExtractError};
use crate::models::{Page, SourceEntry};

/// Per-document source failure. The scan itself keeps going; the failing
/// key is skipped and logged.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("source root does not exist: {0}")]
    MissingRoot(PathBuf),
    #[error("invalid glob pattern '{pattern}': {source}")]
    Glob {
        pattern: String,
        #[source]
        source: globset::Error,
    },
    #[error("failed to read {key}: {source}")]
    Read {
        key: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to extract {key}: {source}")]
    Extract {
        key: String,
        #[source]
        source: ExtractError,
    },
    #[error("unknown document key: {0}")]
    UnknownKey(String),
}

/// A finite, restartable sequence of documents from an external origin.
///
/// `list` must be cheap enough to run on every ingestion pass; `fetch`
/// performs the expensive extraction and is only called for keys the
/// coordinator decided are new or modified.
#[async_trait]
pub trait DocumentSource: Send + Sync {
    /// Short label for logs and reports.
    fn name(&self) -> &str;

    /// Enumerate current document keys with their content fingerprints.
    ///
    /// The returned order is deterministic (sorted by key). Individual
    /// unreadable files are logged and skipped without aborting the scan.
    async fn list(&self) -> Result<Vec<SourceEntry>, SourceError>;

    /// Read and extract one document's pages.
    async fn fetch(&self, key: &str) -> Result<Vec<Page>, SourceError>;
}

/// Directory-backed document source.
pub struct FilesystemSource {
    root: PathBuf,
    include: GlobSet,
    exclude: GlobSet,
    follow_symlinks: bool,
}

impl FilesystemSource {
    pub fn new(config: &SourceConfig) -> Result<Self, SourceError> {
        let include = build_globset(&config.include_globs)?;

        let mut exclude_globs = vec![
            "**/.git/**".to_string(),
            "**/target/**".to_string(),
            "**/node_modules/**".to_string(),
        ];
        exclude_globs.extend(config.exclude_globs.iter().cloned());
        let exclude = build_globset(&exclude_globs)?;

        Ok(Self {
            root: config.root.clone(),
            include,
            exclude,
            follow_symlinks: config.follow_symlinks,
        })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }

    fn key_for(&self, path: &Path) -> String {
        let relative = path.strip_prefix(&self.root).unwrap_or(path);
        // Normalize separators so keys are stable across platforms.
        relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/")
    }
}

#[async_trait]
impl DocumentSource for FilesystemSource {
    fn name(&self) -> &str {
        "filesystem"
    }

    async fn list(&self) -> Result<Vec<SourceEntry>, SourceError> {
        if !self.root.exists() {
            return Err(SourceError::MissingRoot(self.root.clone()));
        }

        let mut entries = Vec::new();

        let walker = WalkDir::new(&self.root).follow_links(self.follow_symlinks);
        for entry in walker {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    warn!(error = %e, "skipping unreadable directory entry");
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }

            let key = self.key_for(entry.path());
            if self.exclude.is_match(&key) || !self.include.is_match(&key) {
                continue;
            }

            match std::fs::read(entry.path()) {
                Ok(bytes) => entries.push(SourceEntry {
                    key,
                    fingerprint: fingerprint(&bytes),
                }),
                Err(e) => {
                    warn!(key = %key, error = %e, "skipping unreadable file");
                }
            }
        }

        entries.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(entries)
    }

    async fn fetch(&self, key: &str) -> Result<Vec<Page>, SourceError> {
        let path = self.path_for(key);
        let bytes = std::fs::read(&path).map_err(|source| SourceError::Read {
            key: key.to_string(),
            source,
        })?;

        let kind = extract::content_kind(&path).map_err(|source| SourceError::Extract {
            key: key.to_string(),
            source,
        })?;

        extract::extract_pages(&bytes, kind).map_err(|source| SourceError::Extract {
            key: key.to_string(),
            source,
        })
    }
}

/// SHA-256 over the raw bytes, hex-encoded. Stable across file copies and
/// clock skew, unlike mtime+size.
pub fn fingerprint(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

fn build_globset(patterns: &[String]) -> Result<GlobSet, SourceError> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern).map_err(|source| SourceError::Glob {
            pattern: pattern.clone(),
            source,
        })?;
        builder.add(glob);
    }
    builder.build().map_err(|source| SourceError::Glob {
        pattern: patterns.join(", "),
        source,
    })
}
