// SPDX-License-Identifier: MIT OR Apache-2.0

//! Quiz questions, feedback, session summaries and chat model listing

use anyhow::Result;
use serde::Serialize;

use crate::cli::OutputFormat;
use crate::commands::course;
use aria::cache::ArtifactCache;
use aria::config::Config;
use aria::embedding::create_provider;
use aria::output::{colorize_dim, print_json, use_colors};
use aria::quiz::{ChatParams, OpenAiChat, QuestionKind, QuizMaster};

#[derive(Debug, Serialize)]
struct QuizOutput<'a> {
    course: &'a str,
    kind: QuestionKind,
    difficulty: &'a str,
    model: &'a str,
    /// Positions of the chunks used as context
    context: Vec<usize>,
    question: String,
}

#[derive(Debug, Serialize)]
struct FeedbackOutput<'a> {
    question: &'a str,
    answer: &'a str,
    feedback: String,
}

#[derive(Debug, Serialize)]
struct SummaryOutput<'a> {
    course: &'a str,
    context: Vec<usize>,
    questions: &'a [String],
    summary: String,
}

#[derive(Debug, Serialize)]
struct ModelEntry {
    name: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
    frequency_penalty: f32,
    default: bool,
}

fn chat_params(config: &Config, model: Option<&str>) -> ChatParams {
    ChatParams::from_config(&config.chat, model.unwrap_or_else(|| config.chat.model_name()))
}

/// Chunks retrieved for `topic`, or the first chunk, with their positions.
fn course_context(
    config: &Config,
    name: &str,
    topic: Option<&str>,
) -> Result<(Vec<usize>, Vec<String>)> {
    let course = course(config, name)?;
    let mut provider = create_provider(&config.embeddings)?;
    let collection = ArtifactCache::from_config(config)?
        .prepare(&course, provider.as_mut(), false)?
        .into_collection()?;
    anyhow::ensure!(!collection.is_empty(), "course '{}' has no content", name);

    Ok(match topic {
        Some(topic) => collection
            .search(provider.as_mut(), topic, config.retrieval.top_k())?
            .into_iter()
            .map(|hit| (hit.position, hit.chunk))
            .unzip(),
        None => (vec![0], collection.chunks()[..1].to_vec()),
    })
}

/// Run the quiz command
#[allow(clippy::too_many_arguments)]
pub fn run(
    config: &Config,
    name: &str,
    kind: QuestionKind,
    difficulty: &str,
    topic: Option<&str>,
    model: Option<&str>,
    format: OutputFormat,
    compact: bool,
) -> Result<()> {
    let (positions, context) = course_context(config, name, topic)?;

    let client = OpenAiChat::from_config(&config.chat)?;
    let params = chat_params(config, model);
    let quiz = QuizMaster::new(&client, params, config.chat.setup_instructions());
    let question = quiz.question(kind, &context, difficulty)?;

    match format {
        OutputFormat::Json => print_json(
            &QuizOutput {
                course: name,
                kind,
                difficulty,
                model: &quiz.params().model,
                context: positions,
                question,
            },
            compact,
        )?,
        OutputFormat::Text => {
            let header = format!("{} ({}, chunks {:?})", kind, difficulty, positions);
            println!("{}\n", colorize_dim(&header, use_colors()));
            println!("{}", question.trim());
        }
    }
    Ok(())
}

/// Run the feedback command
pub fn feedback(
    config: &Config,
    question: &str,
    answer: &str,
    model: Option<&str>,
    format: OutputFormat,
    compact: bool,
) -> Result<()> {
    let client = OpenAiChat::from_config(&config.chat)?;
    let quiz = QuizMaster::new(
        &client,
        chat_params(config, model),
        config.chat.setup_instructions(),
    );
    let feedback = quiz.feedback(question, answer)?;

    match format {
        OutputFormat::Json => print_json(
            &FeedbackOutput {
                question,
                answer,
                feedback,
            },
            compact,
        )?,
        OutputFormat::Text => println!("{}", feedback.trim()),
    }
    Ok(())
}

/// Run the summary command
#[allow(clippy::too_many_arguments)]
pub fn summary(
    config: &Config,
    name: &str,
    questions: &[String],
    feedback: &[String],
    topic: Option<&str>,
    model: Option<&str>,
    format: OutputFormat,
    compact: bool,
) -> Result<()> {
    anyhow::ensure!(!questions.is_empty(), "no questions to review; pass --question");
    let (positions, context) = course_context(config, name, topic)?;

    let client = OpenAiChat::from_config(&config.chat)?;
    let quiz = QuizMaster::new(
        &client,
        chat_params(config, model),
        config.chat.setup_instructions(),
    );
    let summary = quiz.summary(&context, questions, feedback)?;

    match format {
        OutputFormat::Json => print_json(
            &SummaryOutput {
                course: name,
                context: positions,
                questions,
                summary,
            },
            compact,
        )?,
        OutputFormat::Text => println!("{}", summary.trim()),
    }
    Ok(())
}

/// Run the models command
pub fn models(config: &Config, format: OutputFormat, compact: bool) -> Result<()> {
    let default = config.chat.model_name();
    let entries: Vec<ModelEntry> = config
        .chat
        .model_names()
        .into_iter()
        .map(|name| {
            let params = ChatParams::from_config(&config.chat, &name);
            ModelEntry {
                default: name == default,
                name,
                model: params.model,
                temperature: params.temperature,
                max_tokens: params.max_tokens,
                frequency_penalty: params.frequency_penalty,
            }
        })
        .collect();

    match format {
        OutputFormat::Json => print_json(&entries, compact)?,
        OutputFormat::Text => {
            let use_color = use_colors();
            for entry in &entries {
                let marker = if entry.default { "*" } else { " " };
                println!(
                    "{} {}  {}",
                    marker,
                    entry.name,
                    colorize_dim(
                        &format!(
                            "{} (temperature {}, max_tokens {}, frequency_penalty {})",
                            entry.model, entry.temperature, entry.max_tokens, entry.frequency_penalty
                        ),
                        use_color
                    )
                );
            }
        }
    }
    Ok(())
}
