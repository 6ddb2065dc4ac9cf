// SPDX-License-Identifier: MIT OR Apache-2.0

//! Cache status, cleanup and course listing

use anyhow::Result;
use colored::Colorize;
use serde::Serialize;

use crate::cli::OutputFormat;
use crate::commands::course;
use aria::cache::{self, ArtifactCache, CacheStatus};
use aria::config::Config;
use aria::embedding::configured_model_id;
use aria::output::{colorize_course, colorize_dim, colorize_flag, print_json, use_colors};

#[derive(Debug, Serialize)]
struct CourseStatus {
    course: String,
    #[serde(flatten)]
    status: CacheStatus,
}

/// Run the status command
pub fn run(config: &Config, name: Option<&str>, format: OutputFormat, compact: bool) -> Result<()> {
    let names = match name {
        Some(n) => vec![n.to_string()],
        None => config.course_names(),
    };
    let cache = ArtifactCache::from_config(config)?;
    let model = configured_model_id(&config.embeddings);

    let mut statuses = Vec::with_capacity(names.len());
    for name in names {
        let course = course(config, &name)?;
        statuses.push(CourseStatus {
            status: cache.status(&course, &model)?,
            course: name,
        });
    }

    match format {
        OutputFormat::Json => print_json(&statuses, compact)?,
        OutputFormat::Text => {
            let use_color = use_colors();
            if statuses.is_empty() {
                println!("No courses configured");
            }
            for s in &statuses {
                let state = if s.status.fresh {
                    "fresh".green().to_string()
                } else {
                    "stale".yellow().to_string()
                };
                println!("{} [{}]", colorize_course(&s.course, use_color), state);
                println!(
                    "  source {}  chunks {}  embeddings {}  index {}",
                    colorize_flag(s.status.source, use_color),
                    colorize_flag(s.status.chunks, use_color),
                    colorize_flag(s.status.embeddings, use_color),
                    colorize_flag(s.status.index, use_color),
                );
                if let Some(key) = &s.status.chunk_key {
                    println!("  {}", colorize_dim(&format!("chunk key {}", key), use_color));
                }
                if let Some(m) = &s.status.manifest {
                    println!(
                        "  {}",
                        colorize_dim(
                            &format!(
                                "{} chunks x {} dims, {} / {} tokens / {}",
                                m.chunk_count, m.dimension, m.embedding_model, m.chunk_size, m.tokenizer
                            ),
                            use_color
                        )
                    );
                }
            }
        }
    }
    Ok(())
}

/// Run the clear command
pub fn clear(config: &Config, name: &str, format: OutputFormat, compact: bool) -> Result<()> {
    let course = course(config, name)?;
    let removed = cache::clear(&course)?;
    match format {
        OutputFormat::Json => print_json(&removed, compact)?,
        OutputFormat::Text => {
            if removed.is_empty() {
                println!("Nothing cached for {}", name);
            }
            for path in &removed {
                println!("removed {}", path.display());
            }
        }
    }
    Ok(())
}

/// Run the courses command
pub fn courses(config: &Config, format: OutputFormat, compact: bool) -> Result<()> {
    let names = config.course_names();
    match format {
        OutputFormat::Json => print_json(&names, compact)?,
        OutputFormat::Text => {
            let use_color = use_colors();
            for name in &names {
                if let Some(course) = config.course(name) {
                    println!(
                        "{}  {}",
                        colorize_course(name, use_color),
                        colorize_dim(&course.pdf_file_path.display().to_string(), use_color)
                    );
                }
            }
        }
    }
    Ok(())
}
