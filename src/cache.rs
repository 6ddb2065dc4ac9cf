// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-course artifact cache.
//!
//! Prepares the (chunks, embeddings, index) triple for a course, loading
//! persisted artifacts when they are fresh and rebuilding otherwise.
//! Freshness is recorded in a JSON manifest next to the chunk file that
//! holds a blake3 hash of the source document and the settings the
//! artifacts were built with. Embeddings and index are always rebuilt
//! together, and a rebuilt chunk list always rebuilds both.

use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::config::{Config, CourseConfig};
use crate::embedding::{
    embed_chunks_with_progress, ChunkConfig, EmbeddingMatrix, EmbeddingProvider, SentenceChunker,
};
use crate::errors::{RagError, Result};
use crate::extract::{process_document, DocumentExtractor};
use crate::index::{
    load_embeddings, load_index, save_chunks, save_embeddings, save_index, try_load_chunks,
    write_atomic, FlatL2Index,
};
use crate::retriever::SearchableCollection;

const MANIFEST_VERSION: u32 = 1;

/// Settings that determine the chunk list
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChunkKey {
    /// blake3 of the source document bytes
    pub source_hash: String,
    pub chunk_size: usize,
    pub tokenizer: String,
}

impl ChunkKey {
    /// Short hash of the key, for display and comparison
    pub fn hash(&self) -> String {
        let json = serde_json::to_string(self).unwrap_or_default();
        let hash = blake3::hash(json.as_bytes());
        hash.to_hex()[..32].to_string()
    }
}

/// What the persisted artifacts were built from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub version: u32,
    pub source_hash: String,
    pub chunk_size: usize,
    pub tokenizer: String,
    pub embedding_model: String,
    pub chunk_count: usize,
    pub dimension: usize,
    /// Unix epoch milliseconds
    pub created_at: u64,
}

impl Manifest {
    fn chunk_key(&self) -> ChunkKey {
        ChunkKey {
            source_hash: self.source_hash.clone(),
            chunk_size: self.chunk_size,
            tokenizer: self.tokenizer.clone(),
        }
    }

    /// Reads a manifest; missing or unreadable manifests are `None`.
    pub fn read(path: &Path) -> Option<Self> {
        let content = fs::read_to_string(path).ok()?;
        match serde_json::from_str::<Self>(&content) {
            Ok(manifest) if manifest.version == MANIFEST_VERSION => Some(manifest),
            Ok(manifest) => {
                tracing::warn!(
                    "Ignoring manifest {} with version {}",
                    path.display(),
                    manifest.version
                );
                None
            }
            Err(e) => {
                tracing::warn!("Ignoring unreadable manifest {}: {}", path.display(), e);
                None
            }
        }
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        let mut json = serde_json::to_string_pretty(self)?;
        json.push('\n');
        write_atomic(path, json.as_bytes())
    }
}

/// Where each part of a prepared course came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    Loaded,
    Built,
}

/// A ready-to-query course
#[derive(Debug, Clone)]
pub struct PreparedCourse {
    pub chunks: Vec<String>,
    pub embeddings: EmbeddingMatrix,
    pub index: FlatL2Index,
    pub model_id: String,
    pub chunks_origin: Origin,
    pub vectors_origin: Origin,
}

impl PreparedCourse {
    /// Binds chunks and index to the embedding model for querying.
    pub fn into_collection(self) -> Result<SearchableCollection> {
        SearchableCollection::new(self.chunks, self.index, self.model_id)
    }
}

/// Presence and freshness of one course's artifacts
#[derive(Debug, Clone, Serialize)]
pub struct CacheStatus {
    pub source: bool,
    pub chunks: bool,
    pub embeddings: bool,
    pub index: bool,
    pub manifest: Option<Manifest>,
    /// Hash of the chunk key for the current source and settings
    pub chunk_key: Option<String>,
    /// All artifacts present and matching the current source and settings
    pub fresh: bool,
}

/// Builds and loads course artifacts.
pub struct ArtifactCache {
    extractor: DocumentExtractor,
    chunker: SentenceChunker,
    batch_size: usize,
    show_progress: bool,
}

impl ArtifactCache {
    pub fn new(extractor: DocumentExtractor, chunker: SentenceChunker, batch_size: usize) -> Self {
        Self {
            extractor,
            chunker,
            batch_size,
            show_progress: false,
        }
    }

    /// Cache using the chunking, embedding and OCR sections of `config`.
    pub fn from_config(config: &Config) -> Result<Self> {
        let chunk_config =
            ChunkConfig::new(config.chunking.chunk_size(), config.chunking.tokenizer())?;
        Ok(Self::new(
            DocumentExtractor::from_config(&config.ocr),
            SentenceChunker::new(chunk_config)?,
            config.embeddings.batch_size(),
        ))
    }

    /// Show an embedding progress bar on stderr.
    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    fn chunk_key(&self, source_hash: String) -> ChunkKey {
        ChunkKey {
            source_hash,
            chunk_size: self.chunker.config().max_tokens,
            tokenizer: self.chunker.tokenizer().name().to_string(),
        }
    }

    /// Loads or builds the artifacts of `course`.
    ///
    /// `force` ignores every persisted artifact.
    pub fn prepare(
        &self,
        course: &CourseConfig,
        provider: &mut dyn EmbeddingProvider,
        force: bool,
    ) -> Result<PreparedCourse> {
        let source = &course.pdf_file_path;
        let source_hash = hash_file(source)?;
        let manifest = if force {
            None
        } else {
            Manifest::read(&course.manifest_path())
        };

        let chunks_fresh = !force
            && course.chunks_json_path.is_file()
            && match (&source_hash, &manifest) {
                (Some(hash), Some(m)) => m.chunk_key() == self.chunk_key(hash.clone()),
                (Some(_), None) => false,
                (None, m) => {
                    tracing::warn!(
                        "Source {} is missing, using cached artifacts",
                        source.display()
                    );
                    m.as_ref().map_or(true, |m| {
                        m.chunk_size == self.chunker.config().max_tokens
                            && m.tokenizer == self.chunker.tokenizer().name()
                    })
                }
            };

        let (chunks, chunks_origin) = if chunks_fresh {
            (try_load_chunks(&course.chunks_json_path)?, Origin::Loaded)
        } else {
            let chunks = process_document(source, &self.extractor, &self.chunker)?;
            save_chunks(&chunks, &course.chunks_json_path)?;
            (chunks, Origin::Built)
        };

        let vectors_fresh = chunks_origin == Origin::Loaded
            && course.embeddings_npy_path.is_file()
            && course.faiss_index_path.is_file()
            && manifest
                .as_ref()
                .map_or(source_hash.is_none(), |m| m.embedding_model == provider.model_id());

        let loaded = if vectors_fresh {
            let embeddings = load_embeddings(&course.embeddings_npy_path)?;
            let index = load_index(&course.faiss_index_path)?;
            if is_consistent(&chunks, &embeddings, &index) {
                Some((embeddings, index))
            } else {
                tracing::warn!(
                    "Cached artifacts disagree ({} chunks, {} embeddings, {} indexed); rebuilding embeddings and index",
                    chunks.len(),
                    embeddings.rows(),
                    index.ntotal()
                );
                None
            }
        } else {
            None
        };

        let (embeddings, index, vectors_origin) = match loaded {
            Some((embeddings, index)) => (embeddings, index, Origin::Loaded),
            None => {
                let embeddings = self.embed(&chunks, provider)?;
                save_embeddings(&embeddings, &course.embeddings_npy_path)?;
                let index = FlatL2Index::build(&embeddings)?;
                save_index(&index, &course.faiss_index_path)?;
                (embeddings, index, Origin::Built)
            }
        };

        if chunks_origin == Origin::Built || vectors_origin == Origin::Built {
            // loaded chunks of a missing source keep the hash they were built from
            let recorded_hash = source_hash
                .clone()
                .or_else(|| manifest.as_ref().map(|m| m.source_hash.clone()));
            match recorded_hash {
                Some(hash) => {
                    let key = self.chunk_key(hash);
                    Manifest {
                        version: MANIFEST_VERSION,
                        source_hash: key.source_hash,
                        chunk_size: key.chunk_size,
                        tokenizer: key.tokenizer,
                        embedding_model: provider.model_id().to_string(),
                        chunk_count: chunks.len(),
                        dimension: embeddings.dim(),
                        created_at: now_ms(),
                    }
                    .write(&course.manifest_path())?;
                }
                None => tracing::warn!(
                    "Not writing a manifest: source {} is missing",
                    source.display()
                ),
            }
        }

        tracing::info!(
            chunks = chunks.len(),
            dim = embeddings.dim(),
            "course ready (chunks {:?}, vectors {:?})",
            chunks_origin,
            vectors_origin
        );
        Ok(PreparedCourse {
            chunks,
            embeddings,
            index,
            model_id: provider.model_id().to_string(),
            chunks_origin,
            vectors_origin,
        })
    }

    fn embed(
        &self,
        chunks: &[String],
        provider: &mut dyn EmbeddingProvider,
    ) -> Result<EmbeddingMatrix> {
        if !self.show_progress {
            return embed_chunks_with_progress(chunks, provider, self.batch_size, None);
        }
        let pb = ProgressBar::new(chunks.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("[{bar:40.cyan/blue}] {pos}/{len} chunks | Embedding {msg}")
                .expect("valid progress bar template")
                .progress_chars("##."),
        );
        pb.set_message(provider.model_id().to_string());
        let result = embed_chunks_with_progress(chunks, provider, self.batch_size, Some(&pb));
        pb.finish_and_clear();
        result
    }

    /// Reports which artifacts exist and whether they are fresh for `model_id`.
    pub fn status(&self, course: &CourseConfig, model_id: &str) -> Result<CacheStatus> {
        let manifest = Manifest::read(&course.manifest_path());
        let source_hash = hash_file(&course.pdf_file_path)?;
        let chunks = course.chunks_json_path.is_file();
        let embeddings = course.embeddings_npy_path.is_file();
        let index = course.faiss_index_path.is_file();

        let key = source_hash.map(|hash| self.chunk_key(hash));
        let fresh = chunks
            && embeddings
            && index
            && match (&manifest, &key) {
                (Some(m), Some(key)) => m.chunk_key() == *key && m.embedding_model == model_id,
                _ => false,
            };

        Ok(CacheStatus {
            source: course.pdf_file_path.is_file(),
            chunks,
            embeddings,
            index,
            manifest,
            chunk_key: key.map(|k| k.hash()),
            fresh,
        })
    }
}

/// Deletes the cached artifacts of `course`; the source is left alone.
///
/// Returns the files that were removed.
pub fn clear(course: &CourseConfig) -> Result<Vec<PathBuf>> {
    let mut removed = Vec::new();
    for path in [
        course.chunks_json_path.clone(),
        course.embeddings_npy_path.clone(),
        course.faiss_index_path.clone(),
        course.manifest_path(),
    ] {
        match fs::remove_file(&path) {
            Ok(()) => removed.push(path),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(RagError::Io(e)),
        }
    }
    Ok(removed)
}

fn is_consistent(chunks: &[String], embeddings: &EmbeddingMatrix, index: &FlatL2Index) -> bool {
    chunks.len() == embeddings.rows()
        && embeddings.rows() == index.ntotal()
        && (index.is_empty() || embeddings.dim() == index.dim())
}

/// blake3 of the file at `path`, or `None` when it does not exist.
fn hash_file(path: &Path) -> Result<Option<String>> {
    if !path.is_file() {
        return Ok(None);
    }
    let bytes = fs::read(path).map_err(|e| RagError::document_read(path, e))?;
    Ok(Some(blake3::hash(&bytes).to_hex().to_string()))
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::DummyProvider;
    use tempfile::{tempdir, TempDir};

    const LESSON: &str = "Functions take inputs. They return outputs. Python uses def. \
                          Loops repeat work. Lists hold values.";

    struct Counting {
        inner: DummyProvider,
        texts: usize,
    }

    impl EmbeddingProvider for Counting {
        fn model_id(&self) -> &str {
            self.inner.model_id()
        }

        fn embed_texts(&mut self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
            self.texts += texts.len();
            self.inner.embed_texts(texts)
        }
    }

    fn counting(dim: usize) -> Counting {
        Counting {
            inner: DummyProvider::new(dim),
            texts: 0,
        }
    }

    fn setup() -> (TempDir, CourseConfig, ArtifactCache) {
        let dir = tempdir().unwrap();
        let source = dir.path().join("lesson.txt");
        fs::write(&source, LESSON).unwrap();
        let course = CourseConfig::in_dir(&source, &dir.path().join("cache"));
        let chunker = SentenceChunker::new(ChunkConfig::new(6, "whitespace").unwrap()).unwrap();
        let cache = ArtifactCache::new(DocumentExtractor::text_only(), chunker, 2);
        (dir, course, cache)
    }

    #[test]
    fn first_run_builds_then_second_run_loads() {
        let (_dir, course, cache) = setup();
        let mut provider = counting(8);

        let first = cache.prepare(&course, &mut provider, false).unwrap();
        assert_eq!(first.chunks_origin, Origin::Built);
        assert_eq!(first.vectors_origin, Origin::Built);
        assert_eq!(first.chunks.len(), first.embeddings.rows());
        assert_eq!(first.index.ntotal(), first.chunks.len());
        assert!(course.manifest_path().is_file());
        let embedded = provider.texts;
        assert_eq!(embedded, first.chunks.len());

        let second = cache.prepare(&course, &mut provider, false).unwrap();
        assert_eq!(second.chunks_origin, Origin::Loaded);
        assert_eq!(second.vectors_origin, Origin::Loaded);
        assert_eq!(second.chunks, first.chunks);
        assert_eq!(second.embeddings, first.embeddings);
        assert_eq!(provider.texts, embedded);

        let status = cache.status(&course, provider.model_id()).unwrap();
        assert!(status.fresh);
        let manifest = status.manifest.unwrap();
        assert_eq!(manifest.chunk_count, first.chunks.len());
        assert_eq!(status.chunk_key, Some(manifest.chunk_key().hash()));
    }

    #[test]
    fn changed_source_rebuilds_everything() {
        let (_dir, course, cache) = setup();
        let mut provider = counting(8);
        cache.prepare(&course, &mut provider, false).unwrap();

        fs::write(&course.pdf_file_path, "A new lesson. With new words.").unwrap();
        assert!(!cache.status(&course, provider.model_id()).unwrap().fresh);

        let prepared = cache.prepare(&course, &mut provider, false).unwrap();
        assert_eq!(prepared.chunks_origin, Origin::Built);
        assert_eq!(prepared.vectors_origin, Origin::Built);
        assert_eq!(prepared.chunks, vec!["A new lesson. With new words."]);
        assert_eq!(prepared.index.ntotal(), 1);
    }

    #[test]
    fn missing_index_rebuilds_embeddings_and_index_together() {
        let (_dir, course, cache) = setup();
        let mut provider = counting(8);
        let first = cache.prepare(&course, &mut provider, false).unwrap();
        fs::remove_file(&course.faiss_index_path).unwrap();

        let before = provider.texts;
        let second = cache.prepare(&course, &mut provider, false).unwrap();
        assert_eq!(second.chunks_origin, Origin::Loaded);
        assert_eq!(second.vectors_origin, Origin::Built);
        assert_eq!(provider.texts - before, first.chunks.len());
        assert!(course.faiss_index_path.is_file());
    }

    #[test]
    fn inconsistent_cache_is_repaired() {
        let (_dir, course, cache) = setup();
        let mut provider = counting(8);
        let first = cache.prepare(&course, &mut provider, false).unwrap();

        // an index from some other chunk list
        let stray = EmbeddingMatrix::from_rows(vec![vec![0.0; 8]]).unwrap();
        save_index(&FlatL2Index::build(&stray).unwrap(), &course.faiss_index_path).unwrap();

        let second = cache.prepare(&course, &mut provider, false).unwrap();
        assert_eq!(second.vectors_origin, Origin::Built);
        assert_eq!(second.index.ntotal(), first.chunks.len());
    }

    #[test]
    fn different_model_rebuilds_vectors_only() {
        let (_dir, course, cache) = setup();
        cache.prepare(&course, &mut counting(8), false).unwrap();

        let mut other = counting(16);
        let prepared = cache.prepare(&course, &mut other, false).unwrap();
        assert_eq!(prepared.chunks_origin, Origin::Loaded);
        assert_eq!(prepared.vectors_origin, Origin::Built);
        assert_eq!(prepared.embeddings.dim(), 16);
        assert_eq!(prepared.into_collection().unwrap().model_id(), "dummy-16");
    }

    #[test]
    fn force_rebuilds_and_clear_removes_artifacts() {
        let (_dir, course, cache) = setup();
        let mut provider = counting(8);
        cache.prepare(&course, &mut provider, false).unwrap();

        let forced = cache.prepare(&course, &mut provider, true).unwrap();
        assert_eq!(forced.chunks_origin, Origin::Built);
        assert_eq!(forced.vectors_origin, Origin::Built);

        let removed = clear(&course).unwrap();
        assert_eq!(removed.len(), 4);
        assert!(course.pdf_file_path.is_file());
        assert!(clear(&course).unwrap().is_empty());

        let status = cache.status(&course, provider.model_id()).unwrap();
        assert!(status.source);
        assert!(!status.chunks && !status.embeddings && !status.index);
        assert!(!status.fresh);
    }

    #[test]
    fn missing_source_uses_cache() {
        let (_dir, course, cache) = setup();
        let mut provider = counting(8);
        let first = cache.prepare(&course, &mut provider, false).unwrap();
        fs::remove_file(&course.pdf_file_path).unwrap();

        let second = cache.prepare(&course, &mut provider, false).unwrap();
        assert_eq!(second.chunks_origin, Origin::Loaded);
        assert_eq!(second.vectors_origin, Origin::Loaded);
        assert_eq!(second.chunks, first.chunks);

        let status = cache.status(&course, provider.model_id()).unwrap();
        assert!(!status.source);
        assert_eq!(status.chunk_key, None);
    }

    #[test]
    fn missing_source_model_change_is_recorded() {
        let (_dir, course, cache) = setup();
        let first = cache.prepare(&course, &mut counting(8), false).unwrap();
        let source_hash = Manifest::read(&course.manifest_path()).unwrap().source_hash;
        fs::remove_file(&course.pdf_file_path).unwrap();

        let mut other = counting(16);
        let rebuilt = cache.prepare(&course, &mut other, false).unwrap();
        assert_eq!(rebuilt.chunks_origin, Origin::Loaded);
        assert_eq!(rebuilt.vectors_origin, Origin::Built);

        let manifest = Manifest::read(&course.manifest_path()).unwrap();
        assert_eq!(manifest.embedding_model, "dummy-16");
        assert_eq!(manifest.source_hash, source_hash);
        assert_eq!(manifest.dimension, 16);

        let embedded = other.texts;
        let again = cache.prepare(&course, &mut other, false).unwrap();
        assert_eq!(again.vectors_origin, Origin::Loaded);
        assert_eq!(other.texts, embedded);
        assert_eq!(again.chunks, first.chunks);
    }

    #[test]
    fn missing_source_without_cache_is_document_read() {
        let (_dir, course, cache) = setup();
        fs::remove_file(&course.pdf_file_path).unwrap();
        assert!(matches!(
            cache.prepare(&course, &mut counting(8), false),
            Err(RagError::DocumentRead { .. })
        ));
    }

    #[test]
    fn chunk_key_hash_tracks_settings() {
        let key = ChunkKey {
            source_hash: "abc".to_string(),
            chunk_size: 500,
            tokenizer: "cl100k_base".to_string(),
        };
        let mut other = key.clone();
        other.chunk_size = 250;
        assert_eq!(key.hash().len(), 32);
        assert_ne!(key.hash(), other.hash());
    }
}
