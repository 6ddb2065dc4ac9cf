// SPDX-License-Identifier: MIT OR Apache-2.0

//! Quiz generation over retrieved course content.
//!
//! A thin layer: [`QuizMaster`] turns retrieved chunks into a prompt for
//! the requested question kind and hands it to a [`ChatClient`].

use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};

use crate::config::ChatConfig;

/// Kind of question to generate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QuestionKind {
    MultipleChoice,
    CodeTracing,
    CodeCompletion,
}

impl QuestionKind {
    pub const ALL: [QuestionKind; 3] = [
        QuestionKind::MultipleChoice,
        QuestionKind::CodeTracing,
        QuestionKind::CodeCompletion,
    ];

    /// Display label used in menus.
    pub fn label(&self) -> &'static str {
        match self {
            QuestionKind::MultipleChoice => "Multiple-Choice Questions",
            QuestionKind::CodeTracing => "Code Tracing and Correction",
            QuestionKind::CodeCompletion => "Code Completion",
        }
    }

    fn task(&self) -> &'static str {
        match self {
            QuestionKind::MultipleChoice => {
                "The question must be multiple choice with four options labelled A) to D), one per line."
            }
            QuestionKind::CodeTracing => {
                "Provide a code snippet and ask the student either to find the error in it or to state its output and purpose."
            }
            QuestionKind::CodeCompletion => {
                "Provide a partial code snippet and ask the student to complete the missing parts."
            }
        }
    }
}

impl fmt::Display for QuestionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for QuestionKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace(['_', ' '], "-");
        match normalized.as_str() {
            "multiple-choice-questions" | "multiple-choice" | "mcq" => {
                Ok(QuestionKind::MultipleChoice)
            }
            "code-tracing-and-correction" | "code-tracing" | "tracing" => {
                Ok(QuestionKind::CodeTracing)
            }
            "code-completion" | "completion" => Ok(QuestionKind::CodeCompletion),
            _ => Err(format!(
                "unknown question kind '{}' (expected mcq, code-tracing or code-completion)",
                s
            )),
        }
    }
}

/// Sampling parameters for one chat request.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatParams {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub frequency_penalty: f32,
}

impl ChatParams {
    /// Parameters of the named model entry in `config`.
    pub fn from_config(config: &ChatConfig, name: &str) -> Self {
        let entry = config.model_entry(name);
        Self {
            model: entry.model.clone().unwrap_or_else(|| name.to_string()),
            temperature: entry.temperature(),
            max_tokens: entry.max_tokens(),
            frequency_penalty: entry.frequency_penalty(),
        }
    }
}

/// Chat completion endpoint.
pub trait ChatClient {
    fn complete(&self, system: &str, user: &str, params: &ChatParams) -> Result<String>;
}

/// Blocking client for OpenAI-compatible `/chat/completions` endpoints.
pub struct OpenAiChat {
    client: Client,
    endpoint: String,
}

impl OpenAiChat {
    pub fn new(api_key: &str, base_url: &str, timeout: Duration) -> Result<Self> {
        anyhow::ensure!(!api_key.trim().is_empty(), "missing chat API key");
        let mut headers = HeaderMap::new();
        let auth = format!("Bearer {}", api_key.trim());
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&auth).context("invalid chat API key")?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()
            .context("failed to build chat HTTP client")?;
        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", base_url.trim_end_matches('/')),
        })
    }

    pub fn from_config(config: &ChatConfig) -> Result<Self> {
        let key_var = config.api_key_env();
        let api_key =
            env::var(key_var).with_context(|| format!("{} is not set; required for chat", key_var))?;
        Self::new(&api_key, config.base_url(), Duration::from_secs(120))
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    max_tokens: u32,
    frequency_penalty: f32,
    messages: [ChatMessage<'a>; 2],
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: AssistantMessage,
}

#[derive(Debug, Deserialize)]
struct AssistantMessage {
    #[serde(default)]
    content: Option<String>,
}

impl ChatClient for OpenAiChat {
    fn complete(&self, system: &str, user: &str, params: &ChatParams) -> Result<String> {
        let body = ChatRequest {
            model: &params.model,
            temperature: params.temperature,
            max_tokens: params.max_tokens,
            frequency_penalty: params.frequency_penalty,
            messages: [
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
        };
        let resp = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .context("failed to call chat completions")?;
        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp
                .text()
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            bail!("chat completions returned {}: {}", status, text);
        }
        let parsed: ChatResponse = resp.json().context("failed to parse chat response")?;
        parsed
            .choices
            .into_iter()
            .find_map(|choice| choice.message.content)
            .context("chat response has no message content")
    }
}

/// Generates questions and feedback for one course.
pub struct QuizMaster<'a> {
    client: &'a dyn ChatClient,
    params: ChatParams,
    instructions: String,
}

impl<'a> QuizMaster<'a> {
    pub fn new(client: &'a dyn ChatClient, params: ChatParams, instructions: impl Into<String>) -> Self {
        Self {
            client,
            params,
            instructions: instructions.into(),
        }
    }

    pub fn params(&self) -> &ChatParams {
        &self.params
    }

    /// One question of `kind` about `context`, without its solution.
    pub fn question(&self, kind: QuestionKind, context: &[String], difficulty: &str) -> Result<String> {
        let prompt = format!(
            "Write one {difficulty} {kind} question about the course content below. {task} \
             Stay within the content and do not include the solution.\n\n\
             Content:\n{content}",
            difficulty = difficulty,
            kind = kind.label(),
            task = kind.task(),
            content = context.join("\n\n"),
        );
        tracing::debug!(%kind, difficulty, chunks = context.len(), "requesting question");
        self.client.complete(&self.instructions, &prompt, &self.params)
    }

    /// Tutor feedback on a student's answer.
    pub fn feedback(&self, question: &str, answer: &str) -> Result<String> {
        let prompt = format!(
            "Question: {}\nStudent's answer: {}\n\n\
             First say whether the answer is correct. Then explain briefly and correct it if needed.",
            question, answer
        );
        self.client.complete(&self.instructions, &prompt, &self.params)
    }

    /// End-of-session review of the questions asked and the feedback given.
    pub fn summary(&self, context: &[String], questions: &[String], feedback: &[String]) -> Result<String> {
        let prompt = format!(
            "Content:\n{}\n\nQuestions asked:\n{}\n\nFeedback given:\n{}\n\n\
             List the learning objectives of the content and, for each, assess the student's \
             strengths and gaps, or note that it was not practiced.",
            context.join("\n\n"),
            questions.join("\n"),
            feedback.join("\n"),
        );
        self.client.complete(&self.instructions, &prompt, &self.params)
    }
}
