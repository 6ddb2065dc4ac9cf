// SPDX-License-Identifier: MIT OR Apache-2.0

//! Chunk list persistence as indented UTF-8 JSON.

use std::path::Path;

use crate::errors::{RagError, Result};
use crate::index::{read_artifact, write_atomic};

/// Writes chunks as a pretty-printed JSON array of strings.
///
/// Non-ASCII text is written as-is, not escaped.
pub fn save_chunks(chunks: &[String], path: &Path) -> Result<()> {
    let mut json = serde_json::to_string_pretty(chunks)?;
    json.push('\n');
    write_atomic(path, json.as_bytes())?;
    tracing::info!("Chunks saved to {}", path.display());
    Ok(())
}

/// Loads chunks, failing with `ArtifactNotFound` when the file is missing.
pub fn try_load_chunks(path: &Path) -> Result<Vec<String>> {
    let bytes = read_artifact(path)?;
    let chunks: Vec<String> = serde_json::from_slice(&bytes)
        .map_err(|e| RagError::invalid_artifact(path, format!("not a JSON string array: {}", e)))?;
    tracing::info!("Loaded {} chunks from {}.", chunks.len(), path.display());
    Ok(chunks)
}

/// Loads chunks, returning an empty list with a warning when the file is missing.
///
/// Other failures (unreadable or malformed file) are still errors.
pub fn load_chunks(path: &Path) -> Result<Vec<String>> {
    match try_load_chunks(path) {
        Err(RagError::ArtifactNotFound { .. }) => {
            tracing::warn!("{} not found. Returning empty list.", path.display());
            Ok(Vec::new())
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn round_trip_preserves_text() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("chunks.json");
        let chunks = vec![
            "def f(x):\n    return x".to_string(),
            "Café – naïve “quotes”.".to_string(),
            String::new(),
        ];

        save_chunks(&chunks, &path).unwrap();
        assert_eq!(load_chunks(&path).unwrap(), chunks);

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("Café"));
        assert!(raw.starts_with("[\n  \""));
    }

    #[test]
    fn missing_file_degrades_to_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("absent.json");
        assert!(load_chunks(&path).unwrap().is_empty());
        assert!(try_load_chunks(&path).unwrap_err().is_not_found());
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{\"not\": \"a list\"}").unwrap();
        assert!(matches!(
            load_chunks(&path),
            Err(RagError::InvalidArtifact { .. })
        ));
    }
}
