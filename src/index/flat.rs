// SPDX-License-Identifier: MIT OR Apache-2.0

//! Exact nearest-neighbour index over squared Euclidean distance.
//!
//! Vectors are kept in one contiguous row-major buffer and every query
//! scans all of them. Persisted as:
//!
//! ```text
//! magic    8 bytes  "ARIAFL2\0"
//! version  u32 LE
//! dim      u32 LE
//! ntotal   u64 LE
//! data     ntotal * dim * f32 LE
//! checksum 32 bytes blake3(everything above)
//! ```

use std::path::Path;

use serde::Serialize;

use crate::embedding::EmbeddingMatrix;
use crate::errors::{RagError, Result};
use crate::index::{read_artifact, write_atomic};

const MAGIC: &[u8; 8] = b"ARIAFL2\0";
const FORMAT_VERSION: u32 = 1;
const HEADER_LEN: usize = 8 + 4 + 4 + 8;
const CHECKSUM_LEN: usize = 32;

/// One search hit: position of the stored vector and its distance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Neighbor {
    pub id: usize,
    /// Squared L2 distance to the query.
    pub distance: f32,
}

/// Flat (brute-force) L2 index.
#[derive(Debug, Clone, PartialEq)]
pub struct FlatL2Index {
    dim: usize,
    data: Vec<f32>,
}

impl FlatL2Index {
    /// Creates an empty index for vectors of `dim` components.
    pub fn new(dim: usize) -> Self {
        Self {
            dim,
            data: Vec::new(),
        }
    }

    /// Builds an index from all rows; the dimension is the column count.
    pub fn build(embeddings: &EmbeddingMatrix) -> Result<Self> {
        let mut index = Self::new(embeddings.dim());
        index.add(embeddings)?;
        tracing::info!("Index created with {} vectors.", index.ntotal());
        Ok(index)
    }

    /// Appends vectors. Their dimension must match the index.
    pub fn add(&mut self, embeddings: &EmbeddingMatrix) -> Result<()> {
        if embeddings.is_empty() {
            return Ok(());
        }
        if embeddings.dim() == 0 {
            return Err(RagError::IndexBuild(
                "cannot index zero-dimensional vectors".to_string(),
            ));
        }
        if embeddings.dim() != self.dim {
            return Err(RagError::IndexBuild(format!(
                "cannot add vectors of dimension {} to an index of dimension {}",
                embeddings.dim(),
                self.dim
            )));
        }
        self.data.extend_from_slice(embeddings.as_slice());
        Ok(())
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Number of stored vectors.
    pub fn ntotal(&self) -> usize {
        if self.dim == 0 {
            0
        } else {
            self.data.len() / self.dim
        }
    }

    pub fn is_empty(&self) -> bool {
        self.ntotal() == 0
    }

    /// Stored vector at `id`.
    pub fn vector(&self, id: usize) -> Option<&[f32]> {
        if id >= self.ntotal() {
            return None;
        }
        Some(&self.data[id * self.dim..(id + 1) * self.dim])
    }

    /// Returns up to `k` nearest vectors, closest first.
    ///
    /// Ties keep insertion order. `k` is clamped to the vector count. A NaN
    /// distance ranks after every finite one.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>> {
        if self.is_empty() || k == 0 {
            return Ok(Vec::new());
        }
        if query.len() != self.dim {
            return Err(RagError::IndexBuild(format!(
                "query has dimension {}, index has {}",
                query.len(),
                self.dim
            )));
        }

        let mut hits: Vec<Neighbor> = self
            .data
            .chunks_exact(self.dim)
            .enumerate()
            .map(|(id, stored)| Neighbor {
                id,
                distance: squared_l2(query, stored),
            })
            .collect();

        hits.sort_by(|a, b| {
            rank_key(a.distance)
                .total_cmp(&rank_key(b.distance))
                .then(a.id.cmp(&b.id))
        });
        hits.truncate(k);
        Ok(hits)
    }

    /// Serializes the index.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(HEADER_LEN + self.data.len() * 4 + CHECKSUM_LEN);
        bytes.extend_from_slice(MAGIC);
        bytes.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
        bytes.extend_from_slice(&(self.dim as u32).to_le_bytes());
        bytes.extend_from_slice(&(self.ntotal() as u64).to_le_bytes());
        for value in &self.data {
            bytes.extend_from_slice(&value.to_le_bytes());
        }
        let checksum = blake3::hash(&bytes);
        bytes.extend_from_slice(checksum.as_bytes());
        bytes
    }

    /// Deserializes an index; `path` only labels errors.
    pub fn from_bytes(bytes: &[u8], path: &Path) -> Result<Self> {
        let invalid = |reason: &str| RagError::invalid_artifact(path, reason);

        if bytes.len() < HEADER_LEN + CHECKSUM_LEN {
            return Err(invalid("file too short for an index header"));
        }
        if &bytes[..8] != MAGIC {
            return Err(invalid("not an aria index file (bad magic)"));
        }

        let (body, checksum) = bytes.split_at(bytes.len() - CHECKSUM_LEN);
        if blake3::hash(body).as_bytes() != checksum {
            return Err(invalid("checksum mismatch"));
        }

        let version = u32::from_le_bytes(read_array(&body[8..12]));
        if version != FORMAT_VERSION {
            return Err(invalid(&format!("unsupported index version {}", version)));
        }
        let dim = u32::from_le_bytes(read_array(&body[12..16])) as usize;
        let ntotal = u64::from_le_bytes(read_array(&body[16..24])) as usize;

        let payload = &body[HEADER_LEN..];
        let expected = ntotal
            .checked_mul(dim)
            .and_then(|n| n.checked_mul(4))
            .ok_or_else(|| invalid("header shape overflows"))?;
        if payload.len() != expected {
            return Err(invalid(&format!(
                "payload has {} bytes, header promises {}",
                payload.len(),
                expected
            )));
        }

        let data = payload
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect();
        Ok(Self { dim, data })
    }

    /// Persists the index at `path`.
    pub fn save(&self, path: &Path) -> Result<()> {
        write_atomic(path, &self.to_bytes())?;
        tracing::info!("Index saved to {}", path.display());
        Ok(())
    }

    /// Loads an index; a missing file is `ArtifactNotFound`, never an empty index.
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = read_artifact(path)?;
        let index = Self::from_bytes(&bytes, path)?;
        tracing::info!(
            "Loaded index from {}, with {} vectors.",
            path.display(),
            index.ntotal()
        );
        Ok(index)
    }
}

fn read_array<const N: usize>(bytes: &[u8]) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(&bytes[..N]);
    out
}

fn rank_key(distance: f32) -> f32 {
    if distance.is_nan() {
        f32::INFINITY
    } else {
        distance
    }
}

fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}
