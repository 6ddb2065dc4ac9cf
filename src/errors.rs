// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the retrieval core.
//!
//! Every fallible library operation returns [`RagError`]. Collaborators
//! behind traits (embedding providers, chat clients) report `anyhow`
//! errors, which are folded into the matching variant at the boundary.

use std::path::PathBuf;
use thiserror::Error;

/// Result alias used throughout the library.
pub type Result<T> = std::result::Result<T, RagError>;

#[derive(Debug, Error)]
pub enum RagError {
    /// The source document could not be opened or parsed.
    #[error("failed to read document {}: {reason}", path.display())]
    DocumentRead { path: PathBuf, reason: String },

    /// A persisted artifact was requested but does not exist.
    #[error("artifact not found: {}", path.display())]
    ArtifactNotFound { path: PathBuf },

    /// A persisted artifact exists but cannot be decoded.
    #[error("invalid artifact {}: {reason}", path.display())]
    InvalidArtifact { path: PathBuf, reason: String },

    /// The external embedding call failed. No partial result is kept.
    #[error("embedding service failed on batch {batch}: {message}")]
    EmbeddingService { batch: usize, message: String },

    /// Vector dimensions or counts do not line up.
    #[error("index build error: {0}")]
    IndexBuild(String),

    #[error("unknown tokenizer '{0}' (expected cl100k_base, o200k_base, p50k_base, r50k_base or whitespace)")]
    Tokenizer(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("OCR unavailable: {0}")]
    Ocr(String),

    /// A collection built with one embedding model was queried with another.
    #[error("collection was embedded with '{expected}' but the query provider uses '{actual}'")]
    ModelMismatch { expected: String, actual: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl RagError {
    pub(crate) fn document_read(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::DocumentRead {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn invalid_artifact(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::InvalidArtifact {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// True when the error only means "nothing has been persisted yet".
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::ArtifactNotFound { .. })
    }
}
