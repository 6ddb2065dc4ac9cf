// SPDX-License-Identifier: MIT OR Apache-2.0

//! Embedding module - chunking, tokenization and vector embeddings
//!
//! Turns extracted text into token-bounded chunks and maps each chunk to a
//! dense vector through an injected [`EmbeddingProvider`].

pub mod chunker;
pub mod embedder;
pub mod matrix;
pub mod provider;
pub mod tokenizer;

pub use chunker::{split_sentences, ChunkConfig, SentenceChunker, DEFAULT_CHUNK_TOKENS};
pub use embedder::{embed_chunks, embed_chunks_with_progress, DEFAULT_BATCH_SIZE};
pub use matrix::EmbeddingMatrix;
pub use provider::{
    configured_model_id, create_provider, CommandProvider, DummyProvider, EmbeddingProvider,
    OpenAiProvider, BUILTIN_MODEL_ID,
};
pub use tokenizer::{Tokenizer, DEFAULT_TOKENIZER};
