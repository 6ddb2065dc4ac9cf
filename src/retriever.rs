// SPDX-License-Identifier: MIT OR Apache-2.0

//! Query-time retrieval over a course's chunks.
//!
//! [`SearchableCollection`] keeps the chunk list, the index built from
//! their embeddings and the embedding model id together, so a query can
//! only be embedded with the model the index was built with.

use serde::Serialize;

use crate::embedding::EmbeddingProvider;
use crate::errors::{RagError, Result};
use crate::index::FlatL2Index;

/// One retrieved chunk.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrievalHit {
    /// 1-based rank, closest first
    pub rank: usize,
    /// Position of the chunk in document order
    pub position: usize,
    pub chunk: String,
    /// Squared L2 distance between query and chunk embeddings
    pub distance: f32,
}

/// Embeds `query` and returns the `top_k` closest chunks, ascending by distance.
///
/// `index` and `chunks` must come from the same embedding run, and
/// `provider` must use the model the index was built with; neither is
/// checked here. Prefer [`SearchableCollection::search`].
pub fn search(
    query: &str,
    index: &FlatL2Index,
    chunks: &[String],
    provider: &mut dyn EmbeddingProvider,
    top_k: usize,
) -> Result<Vec<RetrievalHit>> {
    let vector = provider
        .embed_one(query)
        .map_err(|e| RagError::EmbeddingService {
            batch: 0,
            message: format!("{:#}", e),
        })?;
    search_by_vector(&vector, index, chunks, top_k)
}

/// Nearest chunks for an already embedded query.
pub fn search_by_vector(
    vector: &[f32],
    index: &FlatL2Index,
    chunks: &[String],
    top_k: usize,
) -> Result<Vec<RetrievalHit>> {
    let neighbors = index.search(vector, top_k)?;
    Ok(neighbors
        .into_iter()
        .filter_map(|n| chunks.get(n.id).map(|chunk| (n, chunk)))
        .enumerate()
        .map(|(i, (n, chunk))| RetrievalHit {
            rank: i + 1,
            position: n.id,
            chunk: chunk.clone(),
            distance: n.distance,
        })
        .collect())
}

/// Chunks, their index and the model that embedded them.
#[derive(Debug, Clone)]
pub struct SearchableCollection {
    chunks: Vec<String>,
    index: FlatL2Index,
    model_id: String,
}

impl SearchableCollection {
    /// Binds the parts together; chunk and vector counts must agree.
    pub fn new(chunks: Vec<String>, index: FlatL2Index, model_id: impl Into<String>) -> Result<Self> {
        if chunks.len() != index.ntotal() {
            return Err(RagError::IndexBuild(format!(
                "{} chunks but {} indexed vectors",
                chunks.len(),
                index.ntotal()
            )));
        }
        Ok(Self {
            chunks,
            index,
            model_id: model_id.into(),
        })
    }

    pub fn chunks(&self) -> &[String] {
        &self.chunks
    }

    pub fn index(&self) -> &FlatL2Index {
        &self.index
    }

    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    pub fn dim(&self) -> usize {
        self.index.dim()
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Embeds `query` with `provider` and returns the closest chunks.
    ///
    /// Fails with `ModelMismatch` when the provider is not the model the
    /// collection was built with.
    pub fn search(
        &self,
        provider: &mut dyn EmbeddingProvider,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<RetrievalHit>> {
        if provider.model_id() != self.model_id {
            return Err(RagError::ModelMismatch {
                expected: self.model_id.clone(),
                actual: provider.model_id().to_string(),
            });
        }
        let hits = search(query, &self.index, &self.chunks, provider, top_k)?;
        tracing::debug!(query, hits = hits.len(), "retrieved chunks");
        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::{embed_chunks, DummyProvider, EmbeddingMatrix};

    fn corpus() -> Vec<String> {
        vec![
            "Functions take inputs.".to_string(),
            "They return outputs.".to_string(),
            "Python uses def.".to_string(),
            "Loops repeat work.".to_string(),
        ]
    }

    fn collection(provider: &mut DummyProvider) -> SearchableCollection {
        let chunks = corpus();
        let embeddings = embed_chunks(&chunks, provider, 2).unwrap();
        let index = FlatL2Index::build(&embeddings).unwrap();
        SearchableCollection::new(chunks, index, provider.model_id()).unwrap()
    }

    #[test]
    fn exact_chunk_text_is_top_hit() {
        let mut provider = DummyProvider::new(32);
        let collection = collection(&mut provider);

        let hits = collection
            .search(&mut provider, "Python uses def.", 3)
            .unwrap();
        assert_eq!(hits.len(), 3);
        assert_eq!(hits[0].chunk, "Python uses def.");
        assert_eq!(hits[0].position, 2);
        assert_eq!(hits[0].rank, 1);
        assert!(hits[0].distance.abs() < 1e-6);
        assert!(hits.windows(2).all(|w| w[0].distance <= w[1].distance));
    }

    #[test]
    fn results_never_exceed_chunk_count() {
        let mut provider = DummyProvider::new(8);
        let collection = collection(&mut provider);
        let hits = collection.search(&mut provider, "anything", 10).unwrap();
        assert_eq!(hits.len(), collection.len());
    }

    #[test]
    fn model_mismatch_is_rejected() {
        let mut provider = DummyProvider::new(8);
        let collection = collection(&mut provider);
        let mut other = DummyProvider::new(16);
        let err = collection.search(&mut other, "q", 3).unwrap_err();
        assert!(matches!(err, RagError::ModelMismatch { .. }));
    }

    #[test]
    fn count_mismatch_is_rejected() {
        let index =
            FlatL2Index::build(&EmbeddingMatrix::from_rows(vec![vec![1.0]]).unwrap()).unwrap();
        let err = SearchableCollection::new(corpus(), index, "m").unwrap_err();
        assert!(matches!(err, RagError::IndexBuild(_)));
    }

    #[test]
    fn free_search_matches_collection() {
        let mut provider = DummyProvider::new(8);
        let collection = collection(&mut provider);
        let direct = search(
            "Loops repeat work.",
            collection.index(),
            collection.chunks(),
            &mut provider,
            2,
        )
        .unwrap();
        assert_eq!(direct[0].position, 3);
        assert_eq!(
            direct,
            collection.search(&mut provider, "Loops repeat work.", 2).unwrap()
        );
    }
}
