// SPDX-License-Identifier: MIT OR Apache-2.0

//! Embedding provider interface and implementations.
//!
//! Providers are constructed by the orchestration layer from
//! [`EmbeddingConfig`] and passed into the embedder and retriever; nothing
//! here holds a process-wide client.

use anyhow::{bail, Context, Result};
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::env;
use std::io::Write;
use std::process::{Command, Stdio};
use std::time::Duration;

use crate::config::{EmbeddingConfig, EmbeddingProviderType};

const DEFAULT_COMMAND_BATCH_SIZE: usize = 64;

/// Model id reported by the builtin provider.
pub const BUILTIN_MODEL_ID: &str = "sentence-transformers/all-MiniLM-L6-v2";

/// Trait for embedding providers.
pub trait EmbeddingProvider: Send {
    /// Returns the model identifier.
    fn model_id(&self) -> &str;

    /// Generates embeddings for the given texts, one row per input, same order.
    fn embed_texts(&mut self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Generates an embedding for a single text.
    fn embed_one(&mut self, text: &str) -> Result<Vec<f32>> {
        let mut result = self.embed_texts(&[text.to_string()])?;
        result
            .pop()
            .ok_or_else(|| anyhow::anyhow!("No embedding returned"))
    }
}

/// Builds the provider selected in configuration.
pub fn create_provider(config: &EmbeddingConfig) -> Result<Box<dyn EmbeddingProvider>> {
    let provider: Box<dyn EmbeddingProvider> = match config.provider() {
        EmbeddingProviderType::Openai => Box::new(OpenAiProvider::from_config(config)?),
        EmbeddingProviderType::Command => Box::new(CommandProvider::new(
            config.command().to_string(),
            config.model().to_string(),
        )),
        EmbeddingProviderType::Dummy => Box::new(DummyProvider::new(config.dimension())),
        EmbeddingProviderType::Builtin => builtin_provider()?,
    };
    tracing::debug!(model = provider.model_id(), "embedding provider ready");
    Ok(provider)
}

/// Model id the configured provider will report, without constructing it.
pub fn configured_model_id(config: &EmbeddingConfig) -> String {
    match config.provider() {
        EmbeddingProviderType::Dummy => DummyProvider::model_name(config.dimension()),
        EmbeddingProviderType::Builtin => BUILTIN_MODEL_ID.to_string(),
        EmbeddingProviderType::Openai | EmbeddingProviderType::Command => {
            config.model().to_string()
        }
    }
}

#[cfg(not(all(target_os = "macos", target_arch = "x86_64")))]
fn builtin_provider() -> Result<Box<dyn EmbeddingProvider>> {
    Ok(Box::new(FastEmbedder::new()?))
}

#[cfg(all(target_os = "macos", target_arch = "x86_64"))]
fn builtin_provider() -> Result<Box<dyn EmbeddingProvider>> {
    bail!("The builtin embedding provider is not available on this platform")
}

/// Blocking client for OpenAI-compatible `/embeddings` endpoints.
///
/// One request per call; retry policy belongs to the caller.
pub struct OpenAiProvider {
    client: Client,
    endpoint: String,
    model: String,
}

impl OpenAiProvider {
    pub fn new(api_key: &str, base_url: &str, model: String, timeout: Duration) -> Result<Self> {
        anyhow::ensure!(!api_key.trim().is_empty(), "missing embedding API key");
        anyhow::ensure!(!model.trim().is_empty(), "missing embedding model name");
        let mut headers = HeaderMap::new();
        let auth = format!("Bearer {}", api_key.trim());
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&auth).context("invalid embedding API key")?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()
            .context("failed to build embedding HTTP client")?;
        let endpoint = format!("{}/embeddings", base_url.trim_end_matches('/'));
        Ok(Self {
            client,
            endpoint,
            model,
        })
    }

    pub fn from_config(config: &EmbeddingConfig) -> Result<Self> {
        let key_var = config.api_key_env();
        let api_key = env::var(key_var)
            .with_context(|| format!("{} is not set; required by the openai provider", key_var))?;
        Self::new(
            &api_key,
            config.base_url(),
            config.model().to_string(),
            Duration::from_secs(config.timeout_secs()),
        )
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}

impl EmbeddingProvider for OpenAiProvider {
    fn model_id(&self) -> &str {
        &self.model
    }

    fn embed_texts(&mut self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let request = EmbeddingRequest {
            model: &self.model,
            input: texts,
        };
        let resp = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .context("failed to call embeddings endpoint")?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp
                .text()
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            bail!("embeddings request failed ({}): {}", status, body);
        }

        let parsed: EmbeddingResponse = resp
            .json()
            .context("failed to parse embeddings response")?;
        order_rows(parsed.data, texts.len())
    }
}

/// Places each returned row at its `index`, which must cover `0..n` exactly once.
fn order_rows(data: Vec<EmbeddingData>, n: usize) -> Result<Vec<Vec<f32>>> {
    anyhow::ensure!(
        data.len() == n,
        "endpoint returned {} embeddings for {} inputs",
        data.len(),
        n
    );
    let mut rows: Vec<Option<Vec<f32>>> = vec![None; n];
    for entry in data {
        let slot = rows
            .get_mut(entry.index)
            .with_context(|| format!("embedding index {} out of range for {} inputs", entry.index, n))?;
        anyhow::ensure!(slot.is_none(), "duplicate embedding index {}", entry.index);
        *slot = Some(entry.embedding);
    }
    rows.into_iter()
        .enumerate()
        .map(|(i, row)| row.with_context(|| format!("missing embedding for input {}", i)))
        .collect()
}

/// Command provider that shells out to an external process.
///
/// The command receives `{"model": ..., "texts": [...]}` on stdin and prints
/// either a JSON array of vectors or an object with an `embeddings`,
/// `vectors` or `data` field.
pub struct CommandProvider {
    command: String,
    model: String,
}

impl CommandProvider {
    pub fn new(command: String, model: String) -> Self {
        Self { command, model }
    }

    fn run_command(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let payload = serde_json::json!({
            "model": self.model,
            "texts": texts,
        });

        let mut child = Command::new("sh")
            .arg("-c")
            .arg(&self.command)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("Failed to spawn embedding command: {}", self.command))?;

        if let Some(mut stdin) = child.stdin.take() {
            let payload_str = payload.to_string();
            stdin
                .write_all(payload_str.as_bytes())
                .context("Failed to write embeddings payload to stdin")?;
        }

        let output = child
            .wait_with_output()
            .context("Failed to read embeddings command output")?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!(
                "Embedding command failed (status {}): {}",
                output.status,
                stderr.trim()
            );
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let parsed: Value = serde_json::from_str(stdout.trim())
            .with_context(|| "Failed to parse embeddings command output as JSON")?;
        parse_vectors(parsed)
    }
}

fn parse_vectors(parsed: Value) -> Result<Vec<Vec<f32>>> {
    let embeddings_value = match parsed {
        Value::Array(arr) => Value::Array(arr),
        Value::Object(mut obj) => {
            match ["embeddings", "vectors", "data"]
                .iter()
                .find_map(|key| obj.remove(*key))
            {
                Some(value) => value,
                None => bail!("Embeddings command output missing 'embeddings' field"),
            }
        }
        _ => bail!("Embeddings command output must be JSON array or object"),
    };

    embeddings_value
        .as_array()
        .ok_or_else(|| anyhow::anyhow!("Embeddings output must be a JSON array"))?
        .iter()
        .map(|row| {
            row.as_array()
                .ok_or_else(|| anyhow::anyhow!("Embedding row must be an array"))?
                .iter()
                .map(|value| {
                    value
                        .as_f64()
                        .ok_or_else(|| anyhow::anyhow!("Embedding value must be a number"))
                        .map(|v| v as f32)
                })
                .collect::<Result<Vec<f32>>>()
        })
        .collect::<Result<Vec<Vec<f32>>>>()
}

impl EmbeddingProvider for CommandProvider {
    fn model_id(&self) -> &str {
        &self.model
    }

    fn embed_texts(&mut self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(DEFAULT_COMMAND_BATCH_SIZE) {
            vectors.extend(self.run_command(batch)?);
        }
        Ok(vectors)
    }
}

/// Local fastembed provider using sentence-transformers/all-MiniLM-L6-v2.
#[cfg(not(all(target_os = "macos", target_arch = "x86_64")))]
pub struct FastEmbedder {
    embedder: fastembed::TextEmbedding,
    model_id: String,
}

#[cfg(not(all(target_os = "macos", target_arch = "x86_64")))]
impl FastEmbedder {
    pub fn new() -> Result<Self> {
        let init = fastembed::InitOptions::new(fastembed::EmbeddingModel::AllMiniLML6V2);
        let embedder = fastembed::TextEmbedding::try_new(init)
            .context("Failed to initialize fastembed model")?;
        Ok(Self {
            embedder,
            model_id: BUILTIN_MODEL_ID.to_string(),
        })
    }
}

#[cfg(not(all(target_os = "macos", target_arch = "x86_64")))]
impl EmbeddingProvider for FastEmbedder {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn embed_texts(&mut self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        Ok(self.embedder.embed(texts, None)?)
    }
}

/// Offline provider producing deterministic pseudo-embeddings.
///
/// Each vector is expanded from a blake3 hash of the text, so identical text
/// always maps to an identical vector. Useful for tests and dry runs; the
/// geometry carries no meaning.
pub struct DummyProvider {
    model: String,
    dimension: usize,
}

impl DummyProvider {
    /// Creates a new dummy provider with specified dimension.
    pub fn new(dimension: usize) -> Self {
        Self {
            model: Self::model_name(dimension),
            dimension,
        }
    }

    /// Model id of a dummy provider with `dimension` components.
    pub fn model_name(dimension: usize) -> String {
        format!("dummy-{}", dimension)
    }

    fn vector_for(&self, text: &str) -> Vec<f32> {
        let mut reader = blake3::Hasher::new()
            .update(text.as_bytes())
            .finalize_xof();
        let mut bytes = vec![0u8; self.dimension * 2];
        reader.fill(&mut bytes);
        bytes
            .chunks_exact(2)
            .map(|b| u16::from_le_bytes([b[0], b[1]]) as f32 / u16::MAX as f32 * 2.0 - 1.0)
            .collect()
    }
}

impl EmbeddingProvider for DummyProvider {
    fn model_id(&self) -> &str {
        &self.model
    }

    fn embed_texts(&mut self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|text| self.vector_for(text)).collect())
    }
}
