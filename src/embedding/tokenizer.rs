// SPDX-License-Identifier: MIT OR Apache-2.0

//! Token counting for chunk budgets.

use std::fmt;
use std::sync::Arc;

use tiktoken_rs::CoreBPE;

use crate::errors::{RagError, Result};

/// Default tokenizer, the encoding used by ada-002 and the gpt-4 family.
pub const DEFAULT_TOKENIZER: &str = "cl100k_base";

/// Counts tokens the way the downstream models will see them.
#[derive(Clone)]
pub enum Tokenizer {
    /// Byte-pair encoding from tiktoken.
    Bpe { name: String, bpe: Arc<CoreBPE> },
    /// One token per whitespace-separated word. Offline and dependency-free.
    Whitespace,
}

impl Tokenizer {
    /// Resolves a tokenizer by encoding name.
    pub fn from_name(name: &str) -> Result<Self> {
        let normalized = name.trim().to_lowercase();
        let bpe = match normalized.as_str() {
            "whitespace" | "words" => return Ok(Self::Whitespace),
            "cl100k_base" => tiktoken_rs::cl100k_base(),
            "o200k_base" => tiktoken_rs::o200k_base(),
            "p50k_base" => tiktoken_rs::p50k_base(),
            "r50k_base" | "gpt2" => tiktoken_rs::r50k_base(),
            _ => return Err(RagError::Tokenizer(name.to_string())),
        }
        .map_err(|e| RagError::Tokenizer(format!("{}: {}", name, e)))?;

        Ok(Self::Bpe {
            name: normalized,
            bpe: Arc::new(bpe),
        })
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Bpe { name, .. } => name,
            Self::Whitespace => "whitespace",
        }
    }

    /// Number of tokens in `text`. Special-token markup counts as plain text.
    pub fn count(&self, text: &str) -> usize {
        if text.is_empty() {
            return 0;
        }
        match self {
            Self::Bpe { bpe, .. } => bpe.encode_ordinary(text).len(),
            Self::Whitespace => text.split_whitespace().count(),
        }
    }
}

impl fmt::Debug for Tokenizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Tokenizer").field(&self.name()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whitespace_counts_words() {
        let tok = Tokenizer::from_name("whitespace").unwrap();
        assert_eq!(tok.count(""), 0);
        assert_eq!(tok.count("Functions take inputs."), 3);
        assert_eq!(tok.count("  spaced   out\nwords "), 3);
    }

    #[test]
    fn unknown_tokenizer_is_rejected() {
        let err = Tokenizer::from_name("sentencepiece").unwrap_err();
        assert!(matches!(err, RagError::Tokenizer(_)));
    }

    #[test]
    fn cl100k_counts_are_positive_and_stable() {
        let tok = Tokenizer::from_name(DEFAULT_TOKENIZER).unwrap();
        assert_eq!(tok.name(), "cl100k_base");
        let n = tok.count("They return outputs.");
        assert!(n > 0);
        assert_eq!(n, tok.count("They return outputs."));
        assert_eq!(tok.count(""), 0);
    }
}
