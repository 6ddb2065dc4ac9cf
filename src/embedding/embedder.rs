// SPDX-License-Identifier: MIT OR Apache-2.0

//! Batched embedding of chunk sequences.

use indicatif::ProgressBar;

use crate::embedding::matrix::EmbeddingMatrix;
use crate::embedding::provider::EmbeddingProvider;
use crate::errors::{RagError, Result};

/// Default number of chunks sent per embedding request.
pub const DEFAULT_BATCH_SIZE: usize = 20;

/// Embeds `chunks` in order, `batch_size` texts per provider call.
///
/// Row `i` of the result is the embedding of `chunks[i]`. Any failed batch
/// fails the whole call; nothing partial is returned.
pub fn embed_chunks(
    chunks: &[String],
    provider: &mut dyn EmbeddingProvider,
    batch_size: usize,
) -> Result<EmbeddingMatrix> {
    embed_chunks_with_progress(chunks, provider, batch_size, None)
}

/// Same as [`embed_chunks`], ticking `progress` once per embedded chunk.
pub fn embed_chunks_with_progress(
    chunks: &[String],
    provider: &mut dyn EmbeddingProvider,
    batch_size: usize,
    progress: Option<&ProgressBar>,
) -> Result<EmbeddingMatrix> {
    let batch_size = batch_size.max(1);
    tracing::info!(
        "Embedding {} chunks with model '{}'...",
        chunks.len(),
        provider.model_id()
    );

    let mut matrix = EmbeddingMatrix::default();
    for (batch_no, batch) in chunks.chunks(batch_size).enumerate() {
        let vectors = provider
            .embed_texts(batch)
            .map_err(|e| RagError::EmbeddingService {
                batch: batch_no,
                message: format!("{:#}", e),
            })?;

        if vectors.len() != batch.len() {
            return Err(RagError::EmbeddingService {
                batch: batch_no,
                message: format!(
                    "provider returned {} vectors for {} inputs",
                    vectors.len(),
                    batch.len()
                ),
            });
        }

        for vector in &vectors {
            matrix
                .push_row(vector)
                .map_err(|e| RagError::EmbeddingService {
                    batch: batch_no,
                    message: e.to_string(),
                })?;
        }

        if let Some(pb) = progress {
            pb.inc(batch.len() as u64);
        }
    }

    tracing::info!("Finished embedding. Shape: {:?}", matrix.shape());
    Ok(matrix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::provider::DummyProvider;

    /// Records batch sizes; each vector encodes the text's global position.
    struct Recording {
        calls: Vec<usize>,
        fail_on: Option<usize>,
    }

    impl EmbeddingProvider for Recording {
        fn model_id(&self) -> &str {
            "recording"
        }

        fn embed_texts(&mut self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
            if self.fail_on == Some(self.calls.len()) {
                anyhow::bail!("rate limited");
            }
            self.calls.push(texts.len());
            Ok(texts
                .iter()
                .map(|t| vec![t.trim_start_matches("chunk-").parse::<f32>().unwrap(), 1.0])
                .collect())
        }
    }

    fn numbered(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("chunk-{}", i)).collect()
    }

    #[test]
    fn batches_of_twenty_preserve_order() {
        let chunks = numbered(25);
        let mut provider = Recording {
            calls: Vec::new(),
            fail_on: None,
        };
        let matrix = embed_chunks(&chunks, &mut provider, DEFAULT_BATCH_SIZE).unwrap();

        assert_eq!(provider.calls, vec![20, 5]);
        assert_eq!(matrix.shape(), [25, 2]);
        for (i, row) in matrix.iter_rows().enumerate() {
            assert_eq!(row[0], i as f32);
        }
    }

    #[test]
    fn failed_batch_fails_everything() {
        let chunks = numbered(45);
        let mut provider = Recording {
            calls: Vec::new(),
            fail_on: Some(1),
        };
        let err = embed_chunks(&chunks, &mut provider, 20).unwrap_err();
        assert!(matches!(err, RagError::EmbeddingService { batch: 1, .. }));
    }

    #[test]
    fn short_response_is_an_error() {
        struct Short;
        impl EmbeddingProvider for Short {
            fn model_id(&self) -> &str {
                "short"
            }
            fn embed_texts(&mut self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
                Ok(vec![vec![0.0]; texts.len().saturating_sub(1)])
            }
        }
        let err = embed_chunks(&numbered(3), &mut Short, 20).unwrap_err();
        assert!(matches!(err, RagError::EmbeddingService { batch: 0, .. }));
    }

    #[test]
    fn empty_input_makes_no_calls() {
        let mut provider = Recording {
            calls: Vec::new(),
            fail_on: None,
        };
        let matrix = embed_chunks(&[], &mut provider, 20).unwrap();
        assert!(matrix.is_empty());
        assert!(provider.calls.is_empty());
    }

    #[test]
    fn zero_batch_size_still_progresses() {
        let mut provider = DummyProvider::new(4);
        let matrix = embed_chunks(&numbered(3), &mut provider, 0).unwrap();
        assert_eq!(matrix.shape(), [3, 4]);
    }
}
