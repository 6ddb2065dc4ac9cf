// SPDX-License-Identifier: MIT OR Apache-2.0

//! Retrieve course chunks for a query

use anyhow::Result;
use colored::Colorize;
use serde::Serialize;

use crate::cli::OutputFormat;
use crate::commands::course;
use aria::cache::ArtifactCache;
use aria::config::Config;
use aria::embedding::create_provider;
use aria::output::{colorize_distance, colorize_dim, preview, print_json, use_colors};
use aria::retriever::RetrievalHit;

/// Search result envelope for JSON output
#[derive(Debug, Serialize)]
struct SearchOutput<'a> {
    course: &'a str,
    query: &'a str,
    top_k: usize,
    model: &'a str,
    results: &'a [RetrievalHit],
}

/// Run the search command
pub fn run(
    config: &Config,
    name: &str,
    query: &str,
    top_k: Option<usize>,
    format: OutputFormat,
    compact: bool,
) -> Result<()> {
    let course = course(config, name)?;
    let top_k = config.merge_top_k(top_k);

    let mut provider = create_provider(&config.embeddings)?;
    let collection = ArtifactCache::from_config(config)?
        .prepare(&course, provider.as_mut(), false)?
        .into_collection()?;
    let hits = collection.search(provider.as_mut(), query, top_k)?;

    match format {
        OutputFormat::Json => print_json(
            &SearchOutput {
                course: name,
                query,
                top_k,
                model: collection.model_id(),
                results: &hits,
            },
            compact,
        )?,
        OutputFormat::Text => {
            let use_color = use_colors();
            if hits.is_empty() {
                println!("{} No chunks in course: {}", "✗".red(), name.yellow());
                return Ok(());
            }
            for hit in &hits {
                println!(
                    "{:>2}. {} {}",
                    hit.rank,
                    colorize_distance(hit.distance, use_color),
                    colorize_dim(&format!("#{}", hit.position), use_color)
                );
                println!("    {}", preview(&hit.chunk, 240));
            }
        }
    }
    Ok(())
}
