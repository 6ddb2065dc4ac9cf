// SPDX-License-Identifier: MIT OR Apache-2.0

//! Sentence-aligned, token-bounded text chunker.
//!
//! Text is split into sentences at terminal punctuation (`.`, `!`, `?`)
//! followed by whitespace, then sentences are packed greedily into chunks
//! whose token count stays within a budget. A chunk boundary never falls
//! inside a sentence; a single sentence longer than the budget becomes a
//! chunk of its own rather than being cut.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::embedding::tokenizer::{Tokenizer, DEFAULT_TOKENIZER};
use crate::errors::{RagError, Result};

/// Default maximum tokens per chunk.
pub const DEFAULT_CHUNK_TOKENS: usize = 500;

static SENTENCE_BOUNDARY: Lazy<Regex> = Lazy::new(|| Regex::new(r"[.!?]\s+").unwrap());

/// Configuration for the sentence chunker.
#[derive(Debug, Clone)]
pub struct ChunkConfig {
    /// Token budget per chunk.
    pub max_tokens: usize,
    /// Tokenizer identifier (e.g. `cl100k_base`).
    pub tokenizer: String,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            max_tokens: DEFAULT_CHUNK_TOKENS,
            tokenizer: DEFAULT_TOKENIZER.to_string(),
        }
    }
}

impl ChunkConfig {
    /// Creates a new ChunkConfig with the specified parameters.
    pub fn new(max_tokens: usize, tokenizer: impl Into<String>) -> Result<Self> {
        if max_tokens == 0 {
            return Err(RagError::InvalidConfig(
                "chunk_size must be greater than 0".to_string(),
            ));
        }
        Ok(Self {
            max_tokens,
            tokenizer: tokenizer.into(),
        })
    }
}

/// Splits text into sentence-aligned chunks for embedding generation.
#[derive(Debug, Clone)]
pub struct SentenceChunker {
    config: ChunkConfig,
    tokenizer: Tokenizer,
}

impl SentenceChunker {
    /// Creates a new chunker, resolving the configured tokenizer.
    pub fn new(config: ChunkConfig) -> Result<Self> {
        let config = ChunkConfig::new(config.max_tokens, config.tokenizer)?;
        let tokenizer = Tokenizer::from_name(&config.tokenizer)?;
        Ok(Self { config, tokenizer })
    }

    /// Creates a chunker with default configuration.
    pub fn with_defaults() -> Result<Self> {
        Self::new(ChunkConfig::default())
    }

    /// Returns the current configuration.
    pub fn config(&self) -> &ChunkConfig {
        &self.config
    }

    pub fn tokenizer(&self) -> &Tokenizer {
        &self.tokenizer
    }

    /// Splits text into chunks.
    ///
    /// Algorithm:
    /// ```text
    /// current = ""
    /// for sentence in sentences(text):
    ///   if tokens(current) + tokens(sentence) > max_tokens:
    ///     emit trim(current) unless empty
    ///     current = sentence
    ///   else:
    ///     current = current + " " + sentence   (no space when current is empty)
    /// emit trim(current) unless empty
    /// ```
    pub fn chunk_text(&self, text: &str) -> Vec<String> {
        let mut chunks = Vec::new();
        let mut current = String::new();

        for sentence in split_sentences(text) {
            let current_tokens = self.tokenizer.count(&current);
            let sentence_tokens = self.tokenizer.count(sentence);

            if current_tokens + sentence_tokens > self.config.max_tokens {
                push_trimmed(&mut chunks, &current);
                current = sentence.to_string();
            } else {
                if !current.is_empty() {
                    current.push(' ');
                }
                current.push_str(sentence);
            }
        }
        push_trimmed(&mut chunks, &current);

        tracing::debug!(
            chunks = chunks.len(),
            max_tokens = self.config.max_tokens,
            tokenizer = self.tokenizer.name(),
            "chunked text"
        );
        chunks
    }
}

fn push_trimmed(chunks: &mut Vec<String>, chunk: &str) {
    let trimmed = chunk.trim();
    if !trimmed.is_empty() {
        chunks.push(trimmed.to_string());
    }
}

/// Splits text into sentences after `.`, `!` or `?` followed by whitespace.
///
/// The input is trimmed first; the whitespace run at each boundary is
/// dropped and the punctuation stays with its sentence.
pub fn split_sentences(text: &str) -> Vec<&str> {
    let text = text.trim();
    if text.is_empty() {
        return Vec::new();
    }

    let mut sentences = Vec::new();
    let mut start = 0;
    for m in SENTENCE_BOUNDARY.find_iter(text) {
        // punctuation is a single ASCII byte
        sentences.push(&text[start..m.start() + 1]);
        start = m.end();
    }
    sentences.push(&text[start..]);
    sentences
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "Functions take inputs. They return outputs. Python uses def.";

    fn words(max_tokens: usize) -> SentenceChunker {
        SentenceChunker::new(ChunkConfig::new(max_tokens, "whitespace").unwrap()).unwrap()
    }

    #[test]
    fn test_default_config() {
        let config = ChunkConfig::default();
        assert_eq!(config.max_tokens, 500);
        assert_eq!(config.tokenizer, "cl100k_base");
    }

    #[test]
    fn test_config_validation() {
        assert!(ChunkConfig::new(1, "whitespace").is_ok());
        assert!(ChunkConfig::new(0, "whitespace").is_err());
        assert!(SentenceChunker::new(ChunkConfig {
            max_tokens: 10,
            tokenizer: "nope".to_string()
        })
        .is_err());
    }

    #[test]
    fn test_split_sentences() {
        assert_eq!(
            split_sentences(SAMPLE),
            vec!["Functions take inputs.", "They return outputs.", "Python uses def."]
        );
        assert_eq!(split_sentences("Really?!  Yes.\n\nNo"), vec!["Really?!", "Yes.", "No"]);
        // no whitespace after the dot: not a boundary
        assert_eq!(split_sentences("Use os.path here."), vec!["Use os.path here."]);
        assert!(split_sentences("   \n ").is_empty());
    }

    #[test]
    fn test_empty_content() {
        assert!(words(10).chunk_text("").is_empty());
        assert!(words(10).chunk_text(" \n\t ").is_empty());
    }

    #[test]
    fn test_everything_fits_in_one_chunk() {
        let chunks = words(100).chunk_text(SAMPLE);
        assert_eq!(chunks, vec![SAMPLE.to_string()]);
    }

    #[test]
    fn test_tiny_budget_splits_on_sentences() {
        let chunks = words(5).chunk_text(SAMPLE);
        assert_eq!(
            chunks,
            vec!["Functions take inputs.", "They return outputs.", "Python uses def."]
        );
    }

    #[test]
    fn test_greedy_packing() {
        // 3 + 3 words fit in 6, the third sentence does not
        let chunks = words(6).chunk_text(SAMPLE);
        assert_eq!(
            chunks,
            vec!["Functions take inputs. They return outputs.", "Python uses def."]
        );
    }

    #[test]
    fn test_oversized_sentence_kept_whole() {
        let long = "one two three four five six seven eight.";
        let text = format!("Short one. {} Tail.", long);
        let chunks = words(3).chunk_text(&text);
        assert_eq!(chunks, vec!["Short one.", long, "Tail."]);
    }

    #[test]
    fn test_cl100k_forces_split() {
        let chunker = SentenceChunker::new(ChunkConfig::new(5, "cl100k_base").unwrap()).unwrap();
        let chunks = chunker.chunk_text(SAMPLE);
        assert!(chunks.len() >= 2);
        for chunk in &chunks {
            assert!(chunk.ends_with('.'));
        }
        assert_eq!(chunks.join(" "), SAMPLE);
    }

    #[test]
    fn test_rejoin_preserves_every_sentence_once() {
        let text = "Alpha beta. Gamma delta epsilon! Zeta? Eta theta iota kappa. Lambda.\nMu nu xi.";
        let sentences = split_sentences(text);
        for budget in 1..12 {
            let chunks = words(budget).chunk_text(text);
            assert_eq!(chunks.join(" "), sentences.join(" "), "budget {}", budget);
            for chunk in &chunks[..chunks.len() - 1] {
                let last = chunk.chars().last().unwrap();
                assert!(matches!(last, '.' | '!' | '?'), "chunk {:?}", chunk);
            }
        }
    }

    #[test]
    fn test_deterministic() {
        let chunker = words(4);
        assert_eq!(chunker.chunk_text(SAMPLE), chunker.chunk_text(SAMPLE));
    }
}
