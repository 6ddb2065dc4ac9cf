// SPDX-License-Identifier: MIT OR Apache-2.0

//! Index store - similarity index and persisted artifacts
//!
//! Three artifacts are persisted per course:
//! - the chunk list (pretty JSON, UTF-8)
//! - the embedding array (NPY, `<f4`, shape `[chunks, dim]`)
//! - the flat L2 index (own binary format, checksummed)

pub mod chunks;
pub mod flat;
pub mod npy;

pub use chunks::{load_chunks, save_chunks, try_load_chunks};
pub use flat::{FlatL2Index, Neighbor};
pub use npy::{load_embeddings, save_embeddings};

use std::fs;
use std::io::Write;
use std::path::Path;

use crate::errors::{RagError, Result};

/// Builds a flat L2 index over every row of `embeddings`.
pub fn create_index(embeddings: &crate::embedding::EmbeddingMatrix) -> Result<FlatL2Index> {
    FlatL2Index::build(embeddings)
}

pub fn save_index(index: &FlatL2Index, path: &Path) -> Result<()> {
    index.save(path)
}

pub fn load_index(path: &Path) -> Result<FlatL2Index> {
    FlatL2Index::load(path)
}

/// Writes `bytes` to a sibling temp file and renames it over `path`.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent)?;

    let mut tmp = tempfile::NamedTempFile::new_in(parent)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| RagError::Io(e.error))?;
    Ok(())
}

/// Reads a whole artifact, mapping a missing file to `ArtifactNotFound`.
pub(crate) fn read_artifact(path: &Path) -> Result<Vec<u8>> {
    if !path.is_file() {
        return Err(RagError::ArtifactNotFound {
            path: path.to_path_buf(),
        });
    }
    Ok(fs::read(path)?)
}
