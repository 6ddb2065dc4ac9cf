// SPDX-License-Identifier: MIT OR Apache-2.0

//! CLI argument parsing using clap

use std::path::PathBuf;

use aria::quiz::QuestionKind;
use clap::{Parser, Subcommand};
use clap_complete::Shell;

/// aria - course recap and quiz assistant
///
/// Ingests course documents into searchable chunk collections and
/// generates quiz questions from the retrieved content.
#[derive(Parser, Debug)]
#[command(name = "aria")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Config file (defaults to .ariarc.toml, then ~/.config/aria/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Output format (text or json)
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    /// Compact JSON output (no pretty formatting)
    #[arg(long, global = true)]
    pub compact: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Output format for results
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Extract, chunk, embed and index a course document
    Ingest {
        /// Course name from the config
        #[arg(required_unless_present = "all")]
        course: Option<String>,

        /// Ingest every configured course
        #[arg(long, conflicts_with = "course")]
        all: bool,

        /// Rebuild all artifacts even when the cache is fresh
        #[arg(short, long)]
        force: bool,
    },

    /// Retrieve the chunks closest to a query
    #[command(alias = "s")]
    Search {
        /// Course name from the config
        course: String,

        /// Query text
        query: String,

        /// Number of chunks to return
        #[arg(short = 'k', long = "top-k")]
        top_k: Option<usize>,
    },

    /// Show which artifacts exist and whether they are fresh
    Status {
        /// Course name (all courses when omitted)
        course: Option<String>,
    },

    /// Delete cached artifacts of a course
    Clear {
        /// Course name from the config
        course: String,
    },

    /// Generate one quiz question from course content
    Quiz {
        /// Course name from the config
        course: String,

        /// Question kind: mcq, code-tracing or code-completion
        #[arg(long)]
        kind: QuestionKind,

        /// Difficulty wording passed to the model
        #[arg(long, default_value = "medium")]
        difficulty: String,

        /// Topic to retrieve context for (defaults to the first chunk)
        #[arg(long)]
        topic: Option<String>,

        /// Chat model entry (defaults to chat.model)
        #[arg(long)]
        model: Option<String>,
    },

    /// Get tutor feedback on an answer
    Feedback {
        /// The question that was asked
        #[arg(long)]
        question: String,

        /// The student's answer
        #[arg(long)]
        answer: String,

        /// Chat model entry (defaults to chat.model)
        #[arg(long)]
        model: Option<String>,
    },

    /// Write an end-of-session review of the questions and feedback
    Summary {
        /// Course name from the config
        course: String,

        /// A question asked during the session (repeatable)
        #[arg(short, long = "question")]
        questions: Vec<String>,

        /// Feedback given during the session (repeatable)
        #[arg(short, long = "feedback")]
        feedback: Vec<String>,

        /// Topic to retrieve context for (defaults to the first chunk)
        #[arg(long)]
        topic: Option<String>,

        /// Chat model entry (defaults to chat.model)
        #[arg(long)]
        model: Option<String>,
    },

    /// List configured courses
    Courses,

    /// List chat model entries, presets included
    Models,

    /// Generate shell completions
    Completions {
        /// Shell type
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_search_and_quiz() {
        let cli = Cli::parse_from(["aria", "--format", "json", "search", "python", "loops", "-k", "5"]);
        assert_eq!(cli.format, OutputFormat::Json);
        match cli.command {
            Commands::Search { course, query, top_k } => {
                assert_eq!(course, "python");
                assert_eq!(query, "loops");
                assert_eq!(top_k, Some(5));
            }
            other => panic!("unexpected command: {:?}", other),
        }

        let cli = Cli::parse_from(["aria", "quiz", "python", "--kind", "mcq"]);
        match cli.command {
            Commands::Quiz { kind, difficulty, .. } => {
                assert_eq!(kind, QuestionKind::MultipleChoice);
                assert_eq!(difficulty, "medium");
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn summary_collects_repeated_flags() {
        let cli = Cli::parse_from([
            "aria", "summary", "python", "-q", "What is def?", "-f", "Correct.", "-q", "What is a loop?",
        ]);
        match cli.command {
            Commands::Summary {
                course,
                questions,
                feedback,
                topic,
                ..
            } => {
                assert_eq!(course, "python");
                assert_eq!(questions, vec!["What is def?", "What is a loop?"]);
                assert_eq!(feedback, vec!["Correct."]);
                assert_eq!(topic, None);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn ingest_needs_course_or_all() {
        assert!(Cli::try_parse_from(["aria", "ingest"]).is_err());
        assert!(Cli::try_parse_from(["aria", "ingest", "--all"]).is_ok());
        assert!(Cli::try_parse_from(["aria", "ingest", "python", "--all"]).is_err());
    }
}
