// SPDX-License-Identifier: MIT OR Apache-2.0

//! aria - course recap and quiz assistant
//!
//! Turns course documents into cached, searchable chunk collections and
//! builds quiz questions from the chunks retrieved for a topic.

mod cli;
mod commands;

use anyhow::Result;
use aria::config::Config;
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use cli::{Cli, Commands};
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    // Initialize tracing with ARIA_LOG env var (e.g., ARIA_LOG=info aria ingest python)
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_env("ARIA_LOG").unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    let format = cli.format;
    let compact = cli.compact;

    let config = match &cli.config {
        Some(path) => Config::load_file(path)?,
        None => Config::load(),
    };

    match cli.command {
        Commands::Ingest { course, all, force } => {
            commands::ingest::run(&config, course.as_deref(), all, force, format, compact)?;
        }
        Commands::Search {
            course,
            query,
            top_k,
        } => {
            commands::search::run(&config, &course, &query, top_k, format, compact)?;
        }
        Commands::Status { course } => {
            commands::status::run(&config, course.as_deref(), format, compact)?;
        }
        Commands::Clear { course } => {
            commands::status::clear(&config, &course, format, compact)?;
        }
        Commands::Summary {
            course,
            questions,
            feedback,
            topic,
            model,
        } => {
            commands::quiz::summary(
                &config,
                &course,
                &questions,
                &feedback,
                topic.as_deref(),
                model.as_deref(),
                format,
                compact,
            )?;
        }
        Commands::Models => {
            commands::quiz::models(&config, format, compact)?;
        }
        Commands::Courses => {
            commands::status::courses(&config, format, compact)?;
        }
        Commands::Quiz {
            course,
            kind,
            difficulty,
            topic,
            model,
        } => {
            commands::quiz::run(
                &config,
                &course,
                kind,
                &difficulty,
                topic.as_deref(),
                model.as_deref(),
                format,
                compact,
            )?;
        }
        Commands::Feedback {
            question,
            answer,
            model,
        } => {
            commands::quiz::feedback(&config, &question, &answer, model.as_deref(), format, compact)?;
        }
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "aria", &mut std::io::stdout());
        }
    }

    Ok(())
}
