// SPDX-License-Identifier: MIT OR Apache-2.0

//! Native text layer extraction with lopdf.

use std::path::Path;

use crate::errors::{RagError, Result};

/// Text of every page that yields any, in page order.
///
/// A document that cannot be opened is `DocumentRead`. A single page whose
/// content stream cannot be decoded is skipped.
pub fn page_texts(path: &Path) -> Result<Vec<String>> {
    let doc = lopdf::Document::load(path).map_err(|e| RagError::document_read(path, e))?;
    let pages = doc.get_pages();
    let mut texts = Vec::with_capacity(pages.len());
    for page_number in pages.keys() {
        match doc.extract_text(&[*page_number]) {
            Ok(text) if !text.trim().is_empty() => texts.push(text),
            Ok(_) => {}
            Err(e) => {
                tracing::debug!(page = page_number, error = %e, "skipping unreadable page");
            }
        }
    }

    tracing::debug!(
        "{}: {} of {} pages have a text layer",
        path.display(),
        texts.len(),
        pages.len()
    );
    Ok(texts)
}
