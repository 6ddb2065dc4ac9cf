// SPDX-License-Identifier: MIT OR Apache-2.0

//! aria - retrieval core of a course recap and quiz assistant
//!
//! Extracts text from course documents, splits it into sentence-aligned
//! token-bounded chunks, embeds the chunks, and answers nearest-neighbour
//! queries over a flat L2 index. Artifacts are cached per course.

pub mod cache;
pub mod config;
pub mod embedding;
pub mod errors;
pub mod extract;
pub mod index;
pub mod output;
pub mod quiz;
pub mod retriever;

pub use errors::{RagError, Result};
