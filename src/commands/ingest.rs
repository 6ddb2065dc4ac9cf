// SPDX-License-Identifier: MIT OR Apache-2.0

//! Build or refresh course artifacts

use anyhow::{bail, Result};
use colored::Colorize;
use rayon::prelude::*;
use serde::Serialize;

use crate::cli::OutputFormat;
use crate::commands::course;
use aria::cache::{ArtifactCache, Origin};
use aria::config::Config;
use aria::embedding::create_provider;
use aria::output::{colorize_course, colorize_dim, print_json, use_colors};

/// Per-course ingest outcome for JSON output
#[derive(Debug, Serialize)]
struct IngestReport {
    course: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    chunks: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    dimension: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    chunks_origin: Option<Origin>,
    #[serde(skip_serializing_if = "Option::is_none")]
    vectors_origin: Option<Origin>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

/// Run the ingest command
pub fn run(
    config: &Config,
    name: Option<&str>,
    all: bool,
    force: bool,
    format: OutputFormat,
    compact: bool,
) -> Result<()> {
    let names = if all {
        config.course_names()
    } else {
        name.map(|n| vec![n.to_string()]).unwrap_or_default()
    };
    if names.is_empty() {
        bail!("no courses configured");
    }
    let courses = names
        .iter()
        .map(|n| course(config, n).map(|c| (n.clone(), c)))
        .collect::<Result<Vec<_>>>()?;

    let cache = ArtifactCache::from_config(config)?
        .with_progress(format == OutputFormat::Text && courses.len() == 1);

    // courses own disjoint paths, so each can run on its own thread
    let reports: Vec<IngestReport> = courses
        .par_iter()
        .map(|(name, course)| {
            let outcome = create_provider(&config.embeddings).and_then(|mut provider| {
                Ok(cache.prepare(course, provider.as_mut(), force)?)
            });
            match outcome {
                Ok(prepared) => IngestReport {
                    course: name.clone(),
                    chunks: Some(prepared.chunks.len()),
                    dimension: Some(prepared.embeddings.dim()),
                    model: Some(prepared.model_id),
                    chunks_origin: Some(prepared.chunks_origin),
                    vectors_origin: Some(prepared.vectors_origin),
                    error: None,
                },
                Err(e) => IngestReport {
                    course: name.clone(),
                    chunks: None,
                    dimension: None,
                    model: None,
                    chunks_origin: None,
                    vectors_origin: None,
                    error: Some(format!("{:#}", e)),
                },
            }
        })
        .collect();

    match format {
        OutputFormat::Json => print_json(&reports, compact)?,
        OutputFormat::Text => {
            let use_color = use_colors();
            for report in &reports {
                let name = colorize_course(&report.course, use_color);
                match (&report.error, report.chunks) {
                    (Some(error), _) => {
                        eprintln!("{} {}: {}", "✗".red(), name, error);
                    }
                    (None, Some(chunks)) => {
                        let origin = match (report.chunks_origin, report.vectors_origin) {
                            (Some(Origin::Loaded), Some(Origin::Loaded)) => "cached",
                            (Some(Origin::Loaded), _) => "re-embedded",
                            _ => "built",
                        };
                        println!(
                            "{} {}: {} chunks, dim {} {}",
                            "✓".green(),
                            name,
                            chunks,
                            report.dimension.unwrap_or(0),
                            colorize_dim(&format!("({}, {})", origin, report.model.as_deref().unwrap_or("")), use_color)
                        );
                    }
                    (None, None) => {}
                }
            }
        }
    }

    let failed = reports.iter().filter(|r| r.error.is_some()).count();
    if failed > 0 {
        bail!("{} of {} courses failed to ingest", failed, reports.len());
    }
    Ok(())
}
