// SPDX-License-Identifier: MIT OR Apache-2.0

use tempfile::TempDir;

use aria::embedding::{embed_chunks, ChunkConfig, DummyProvider, EmbeddingMatrix, SentenceChunker};
use aria::index::{
    create_index, load_chunks, load_embeddings, load_index, save_chunks, save_embeddings,
    save_index,
};
use aria::retriever::{search, search_by_vector, SearchableCollection};
use aria::RagError;

/// 10 x 1536 vectors with distinct, deterministic components.
fn wide_matrix() -> EmbeddingMatrix {
    let rows = (0..10)
        .map(|r| {
            (0..1536)
                .map(|c| ((r * 1536 + c) as f32 * 0.618).sin())
                .collect()
        })
        .collect();
    EmbeddingMatrix::from_rows(rows).unwrap()
}

#[test]
fn saved_index_finds_stored_vector_at_zero_distance() {
    let dir = TempDir::new().unwrap();
    let embeddings = wide_matrix();
    let chunks: Vec<String> = (0..10).map(|i| format!("chunk {}", i)).collect();

    let index = create_index(&embeddings).unwrap();
    let index_path = dir.path().join("course.index");
    save_index(&index, &index_path).unwrap();
    let reloaded = load_index(&index_path).unwrap();
    assert_eq!(reloaded.ntotal(), 10);
    assert_eq!(reloaded.dim(), 1536);

    for row in [0usize, 4, 9] {
        let hits = search_by_vector(embeddings.row(row).unwrap(), &reloaded, &chunks, 3).unwrap();
        assert_eq!(hits[0].chunk, chunks[row]);
        assert!(hits[0].distance.abs() < 1e-4);
        assert!(hits.len() <= 3);
        assert!(hits.windows(2).all(|w| w[0].distance <= w[1].distance));
        assert_eq!(
            hits,
            search_by_vector(embeddings.row(row).unwrap(), &index, &chunks, 3).unwrap()
        );
    }
}

#[test]
fn artifacts_round_trip_together() {
    let dir = TempDir::new().unwrap();
    let chunker = SentenceChunker::new(ChunkConfig::new(5, "cl100k_base").unwrap()).unwrap();
    let chunks = chunker.chunk_text("Functions take inputs. They return outputs. Python uses def.");
    assert!(chunks.len() >= 2);
    assert!(chunks.iter().all(|c| c.ends_with('.')));
    assert_eq!(
        chunks.join(" "),
        "Functions take inputs. They return outputs. Python uses def."
    );

    let mut provider = DummyProvider::new(24);
    let embeddings = embed_chunks(&chunks, &mut provider, 20).unwrap();
    assert_eq!(embeddings.rows(), chunks.len());
    let index = create_index(&embeddings).unwrap();

    let chunks_path = dir.path().join("out").join("chunks.json");
    let npy_path = dir.path().join("out").join("embeddings.npy");
    let index_path = dir.path().join("out").join("index.bin");
    save_chunks(&chunks, &chunks_path).unwrap();
    save_embeddings(&embeddings, &npy_path).unwrap();
    save_index(&index, &index_path).unwrap();

    let chunks2 = load_chunks(&chunks_path).unwrap();
    let embeddings2 = load_embeddings(&npy_path).unwrap();
    let index2 = load_index(&index_path).unwrap();
    assert_eq!(chunks2, chunks);
    assert_eq!(embeddings2, embeddings);

    let collection = SearchableCollection::new(chunks2, index2, "dummy-24").unwrap();
    let hits = collection
        .search(&mut provider, "They return outputs.", 3)
        .unwrap();
    let direct = search("They return outputs.", &index, &chunks, &mut provider, 3).unwrap();
    assert_eq!(hits, direct);
    assert!(hits.iter().any(|h| h.chunk.contains("They return outputs.")));
}

#[test]
fn missing_artifacts() {
    let dir = TempDir::new().unwrap();
    assert!(load_chunks(&dir.path().join("none.json")).unwrap().is_empty());
    assert!(matches!(
        load_embeddings(&dir.path().join("none.npy")),
        Err(RagError::ArtifactNotFound { .. })
    ));
    assert!(matches!(
        load_index(&dir.path().join("none.index")),
        Err(RagError::ArtifactNotFound { .. })
    ));
}
