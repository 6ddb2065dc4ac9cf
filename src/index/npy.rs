// SPDX-License-Identifier: MIT OR Apache-2.0

//! NPY serialization for embedding arrays.
//!
//! Writes format 1.0 with `<f4` data in C order, which `numpy.load` reads
//! directly. Reading also accepts formats 2.0/3.0 and `<f8` data.

use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::embedding::EmbeddingMatrix;
use crate::errors::{RagError, Result};
use crate::index::{read_artifact, write_atomic};

const MAGIC: &[u8; 6] = b"\x93NUMPY";
const ALIGN: usize = 64;

static DESCR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"['"]descr['"]\s*:\s*['"]([^'"]+)['"]"#).unwrap());
static FORTRAN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"['"]fortran_order['"]\s*:\s*(True|False)"#).unwrap());
static SHAPE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"['"]shape['"]\s*:\s*\(([^)]*)\)"#).unwrap());

/// Encodes a matrix as NPY bytes.
pub fn encode(matrix: &EmbeddingMatrix) -> Vec<u8> {
    let [rows, dim] = matrix.shape();
    let mut header = format!(
        "{{'descr': '<f4', 'fortran_order': False, 'shape': ({}, {}), }}",
        rows, dim
    );
    // magic(6) + version(2) + len(2) + header + '\n' must be 64-aligned
    let unpadded = MAGIC.len() + 2 + 2 + header.len() + 1;
    let padding = (ALIGN - unpadded % ALIGN) % ALIGN;
    header.push_str(&" ".repeat(padding));
    header.push('\n');

    let mut bytes = Vec::with_capacity(10 + header.len() + matrix.as_slice().len() * 4);
    bytes.extend_from_slice(MAGIC);
    bytes.extend_from_slice(&[1, 0]);
    bytes.extend_from_slice(&(header.len() as u16).to_le_bytes());
    bytes.extend_from_slice(header.as_bytes());
    for value in matrix.as_slice() {
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    bytes
}

/// Decodes NPY bytes; `path` only labels errors.
pub fn decode(bytes: &[u8], path: &Path) -> Result<EmbeddingMatrix> {
    let invalid = |reason: String| RagError::invalid_artifact(path, reason);

    if bytes.len() < 10 || &bytes[..6] != MAGIC {
        return Err(invalid("not an NPY file".to_string()));
    }
    let major = bytes[6];
    let (header_len, header_start) = match major {
        1 => (u16::from_le_bytes([bytes[8], bytes[9]]) as usize, 10),
        2 | 3 if bytes.len() >= 12 => (
            u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]) as usize,
            12,
        ),
        _ => return Err(invalid(format!("unsupported NPY version {}", major))),
    };
    let data_start = header_start + header_len;
    if bytes.len() < data_start {
        return Err(invalid("truncated NPY header".to_string()));
    }
    let header = String::from_utf8_lossy(&bytes[header_start..data_start]);

    let descr = DESCR
        .captures(&header)
        .map(|c| c[1].to_string())
        .ok_or_else(|| invalid("header has no descr".to_string()))?;
    if FORTRAN
        .captures(&header)
        .map(|c| &c[1] == "True")
        .unwrap_or(false)
    {
        return Err(invalid("Fortran-ordered arrays are not supported".to_string()));
    }
    let shape = SHAPE
        .captures(&header)
        .ok_or_else(|| invalid("header has no shape".to_string()))?[1]
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<usize>())
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| invalid(format!("bad shape: {}", e)))?;

    let (rows, dim) = match shape.as_slice() {
        [rows, dim] => (*rows, *dim),
        [0] => (0, 0),
        [dim] => (1, *dim),
        other => return Err(invalid(format!("expected a 2-D array, got shape {:?}", other))),
    };

    let payload = &bytes[data_start..];
    let count = rows
        .checked_mul(dim)
        .ok_or_else(|| invalid("shape overflows".to_string()))?;
    let data: Vec<f32> = match descr.as_str() {
        "<f4" => {
            check_len(payload.len(), count, 4).map_err(invalid)?;
            payload
                .chunks_exact(4)
                .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
                .collect()
        }
        "<f8" => {
            check_len(payload.len(), count, 8).map_err(invalid)?;
            payload
                .chunks_exact(8)
                .map(|b| {
                    let mut buf = [0u8; 8];
                    buf.copy_from_slice(b);
                    f64::from_le_bytes(buf) as f32
                })
                .collect()
        }
        other => return Err(invalid(format!("unsupported dtype {}", other))),
    };

    EmbeddingMatrix::new(rows, dim, data)
}

fn check_len(actual: usize, count: usize, width: usize) -> std::result::Result<(), String> {
    if count.checked_mul(width) == Some(actual) {
        Ok(())
    } else {
        Err(format!(
            "payload has {} bytes, shape needs {} values of {} bytes",
            actual, count, width
        ))
    }
}

/// Persists an embedding array at `path`.
pub fn save_embeddings(embeddings: &EmbeddingMatrix, path: &Path) -> Result<()> {
    write_atomic(path, &encode(embeddings))?;
    tracing::info!("Embeddings saved to {}", path.display());
    Ok(())
}

/// Loads an embedding array; a missing file is `ArtifactNotFound`.
pub fn load_embeddings(path: &Path) -> Result<EmbeddingMatrix> {
    let bytes = read_artifact(path)?;
    let matrix = decode(&bytes, path)?;
    tracing::info!(
        "Loaded embeddings from {}, shape: {:?}",
        path.display(),
        matrix.shape()
    );
    Ok(matrix)
}
