// SPDX-License-Identifier: MIT OR Apache-2.0

//! Document text extraction
//!
//! A PDF yields its native text layer page by page, followed by the OCR
//! output of every rendered page. OCR segments are labelled with their
//! page number so they stay attributable even when they repeat the text
//! layer. Plain text and Markdown files are read as-is.

pub mod ocr;
pub mod pdf;

pub use ocr::{OcrEngine, PageText, TesseractOcr};

use std::path::Path;

use crate::config::{OcrConfig, OcrMode};
use crate::embedding::{ChunkConfig, SentenceChunker};
use crate::errors::{RagError, Result};

/// Turns a source document into one combined text string.
pub struct DocumentExtractor {
    mode: OcrMode,
    engine: Box<dyn OcrEngine>,
}

impl DocumentExtractor {
    pub fn new(mode: OcrMode, engine: Box<dyn OcrEngine>) -> Self {
        Self { mode, engine }
    }

    /// Extractor backed by `pdftoppm` and `tesseract`.
    pub fn from_config(config: &OcrConfig) -> Self {
        Self::new(config.enabled(), Box::new(TesseractOcr::from_config(config)))
    }

    /// Extractor that never runs OCR.
    pub fn text_only() -> Self {
        Self::from_config(&OcrConfig {
            enabled: Some(OcrMode::Off),
            ..Default::default()
        })
    }

    pub fn mode(&self) -> OcrMode {
        self.mode
    }

    /// Extracts all text from `path`.
    pub fn extract_text(&self, path: &Path) -> Result<String> {
        if is_plain_text(path) {
            return std::fs::read_to_string(path).map_err(|e| RagError::document_read(path, e));
        }

        let native = pdf::page_texts(path)?;
        let ocr = self.ocr_pages(path)?;
        tracing::info!(
            "Extracted {} text pages and {} OCR pages from {}",
            native.len(),
            ocr.len(),
            path.display()
        );
        Ok(combine_segments(&native, &ocr))
    }

    /// Only a missing engine is tolerated, and only in `Auto` mode. Once the
    /// engine runs, its failure is an `Ocr` error.
    fn ocr_pages(&self, path: &Path) -> Result<Vec<PageText>> {
        if self.mode == OcrMode::Off {
            return Ok(Vec::new());
        }
        match (self.mode, self.engine.check_available()) {
            (OcrMode::Auto, Err(e)) => {
                tracing::warn!("Skipping OCR ({}): {:#}", self.engine.name(), e);
                return Ok(Vec::new());
            }
            (_, Err(e)) => return Err(RagError::Ocr(format!("{:#}", e))),
            (_, Ok(())) => {}
        }
        self.engine
            .recognize(path)
            .map_err(|e| RagError::Ocr(format!("{:#}", e)))
    }
}

fn is_plain_text(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| matches!(ext.to_ascii_lowercase().as_str(), "txt" | "md" | "markdown"))
        .unwrap_or(false)
}

/// Joins native page texts, then labelled OCR pages, with newlines.
///
/// Blank OCR output is dropped.
pub fn combine_segments(native: &[String], ocr: &[PageText]) -> String {
    let labelled = ocr
        .iter()
        .filter(|p| !p.text.trim().is_empty())
        .map(|p| format!("[Image {} OCR]\n{}", p.page, p.text));
    native
        .iter()
        .cloned()
        .chain(labelled)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Extracts and chunks one document.
pub fn process_document(
    path: &Path,
    extractor: &DocumentExtractor,
    chunker: &SentenceChunker,
) -> Result<Vec<String>> {
    let text = extractor.extract_text(path)?;
    let chunks = chunker.chunk_text(&text);
    tracing::info!("Processed {} -> {} total chunks.", path.display(), chunks.len());
    Ok(chunks)
}

/// One-call ingestion entry point: OCR in `language`, cl100k_base chunks of
/// at most `chunk_size` tokens.
pub fn process_pdf_for_rag(path: &Path, language: &str, chunk_size: usize) -> Result<Vec<String>> {
    let extractor = DocumentExtractor::from_config(&OcrConfig {
        language: Some(language.to_string()),
        ..Default::default()
    });
    let chunker = SentenceChunker::new(ChunkConfig::new(
        chunk_size,
        crate::embedding::DEFAULT_TOKENIZER,
    )?)?;
    process_document(path, &extractor, &chunker)
}
