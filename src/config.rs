// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration file support for aria
//!
//! Loads configuration from .ariarc.toml in current directory or ~/.config/aria/config.toml

use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// OCR enablement mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OcrMode {
    /// Never rasterize pages
    Off,
    /// Run OCR when the external tools are installed, skip otherwise
    #[default]
    Auto,
    /// Run OCR and fail when the tools are missing
    On,
}

/// Embedding provider type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProviderType {
    #[default]
    Openai,
    Command,
    Builtin,
    Dummy,
}

/// Chunking configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Maximum tokens per chunk
    pub chunk_size: Option<usize>,
    /// Tokenizer used to count tokens
    pub tokenizer: Option<String>,
}

impl ChunkingConfig {
    /// Get chunk size (defaults to 500)
    pub fn chunk_size(&self) -> usize {
        self.chunk_size.unwrap_or(500)
    }

    /// Get tokenizer (defaults to "cl100k_base")
    pub fn tokenizer(&self) -> &str {
        self.tokenizer.as_deref().unwrap_or("cl100k_base")
    }
}

/// Embedding configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Provider type (openai, command, builtin, dummy)
    pub provider: Option<EmbeddingProviderType>,
    /// Model identifier for the embedding provider
    pub model: Option<String>,
    /// Number of chunks per embedding request
    pub batch_size: Option<usize>,
    /// Base URL of an OpenAI-compatible API
    pub base_url: Option<String>,
    /// Environment variable holding the API key
    pub api_key_env: Option<String>,
    /// Command to execute for command provider
    pub command: Option<String>,
    /// Vector dimension for the dummy provider
    pub dimension: Option<usize>,
    /// HTTP timeout in seconds
    pub timeout_secs: Option<u64>,
}

impl EmbeddingConfig {
    /// Get provider type (defaults to Openai)
    pub fn provider(&self) -> EmbeddingProviderType {
        self.provider.unwrap_or_default()
    }

    /// Get model identifier (defaults to "text-embedding-ada-002")
    pub fn model(&self) -> &str {
        self.model.as_deref().unwrap_or("text-embedding-ada-002")
    }

    /// Get batch size (defaults to 20)
    pub fn batch_size(&self) -> usize {
        self.batch_size.filter(|size| *size > 0).unwrap_or(20)
    }

    pub fn base_url(&self) -> &str {
        self.base_url
            .as_deref()
            .unwrap_or("https://api.openai.com/v1")
    }

    pub fn api_key_env(&self) -> &str {
        self.api_key_env.as_deref().unwrap_or("OPENAI_API_KEY")
    }

    /// Get command (defaults to "embedder")
    pub fn command(&self) -> &str {
        self.command.as_deref().unwrap_or("embedder")
    }

    /// Get dummy dimension (defaults to 1536, matching ada-002)
    pub fn dimension(&self) -> usize {
        self.dimension.filter(|dim| *dim > 0).unwrap_or(1536)
    }

    pub fn timeout_secs(&self) -> u64 {
        self.timeout_secs.unwrap_or(60)
    }
}

/// OCR configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct OcrConfig {
    pub enabled: Option<OcrMode>,
    /// Tesseract language code
    pub language: Option<String>,
    /// Rasterization resolution
    pub dpi: Option<u32>,
    /// Rasterizer binary (poppler)
    pub pdftoppm: Option<String>,
    /// OCR binary
    pub tesseract: Option<String>,
}

impl OcrConfig {
    /// Get enabled mode (defaults to Auto)
    pub fn enabled(&self) -> OcrMode {
        self.enabled.unwrap_or_default()
    }

    /// Get language (defaults to "eng")
    pub fn language(&self) -> &str {
        self.language.as_deref().unwrap_or("eng")
    }

    /// Get DPI (defaults to 200)
    pub fn dpi(&self) -> u32 {
        self.dpi.unwrap_or(200)
    }

    pub fn pdftoppm(&self) -> &str {
        self.pdftoppm.as_deref().unwrap_or("pdftoppm")
    }

    pub fn tesseract(&self) -> &str {
        self.tesseract.as_deref().unwrap_or("tesseract")
    }
}

/// Retrieval configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    pub top_k: Option<usize>,
}

impl RetrievalConfig {
    /// Get top-k (defaults to 3)
    pub fn top_k(&self) -> usize {
        self.top_k.unwrap_or(3)
    }
}

/// Chat model settings
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ChatModelConfig {
    pub model: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub frequency_penalty: Option<f32>,
}

impl ChatModelConfig {
    fn preset(model: &str) -> Self {
        Self {
            model: Some(model.to_string()),
            temperature: Some(0.5),
            max_tokens: Some(150),
            frequency_penalty: Some(0.0),
        }
    }

    pub fn temperature(&self) -> f32 {
        self.temperature.unwrap_or(0.5)
    }

    pub fn max_tokens(&self) -> u32 {
        self.max_tokens.unwrap_or(150)
    }

    pub fn frequency_penalty(&self) -> f32 {
        self.frequency_penalty.unwrap_or(0.0)
    }
}

/// Chat completion configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Name of the model entry to use
    pub model: Option<String>,
    pub base_url: Option<String>,
    pub api_key_env: Option<String>,
    /// System instruction sent with every request
    pub setup_instructions: Option<String>,
    /// Named model entries (e.g., "gpt-4o")
    pub models: BTreeMap<String, ChatModelConfig>,
}

pub const DEFAULT_SETUP_INSTRUCTIONS: &str = "You are an AI Recap Interactive Assistant designed to help students review and understand educational content. Your tasks include generating questions, reviewing answers, and providing corrections and explanations when necessary. Always be positive and motivating.";

impl ChatConfig {
    /// Get model entry name (defaults to "gpt-4o")
    pub fn model_name(&self) -> &str {
        self.model.as_deref().unwrap_or("gpt-4o")
    }

    pub fn base_url(&self) -> &str {
        self.base_url
            .as_deref()
            .unwrap_or("https://api.openai.com/v1")
    }

    pub fn api_key_env(&self) -> &str {
        self.api_key_env.as_deref().unwrap_or("OPENAI_API_KEY")
    }

    pub fn setup_instructions(&self) -> &str {
        self.setup_instructions
            .as_deref()
            .unwrap_or(DEFAULT_SETUP_INSTRUCTIONS)
    }

    /// Get a model entry by name, falling back to built-in presets.
    ///
    /// Unknown names are treated as raw model identifiers.
    pub fn model_entry(&self, name: &str) -> ChatModelConfig {
        if let Some(entry) = self.models.get(name) {
            let mut entry = entry.clone();
            entry.model.get_or_insert_with(|| name.to_string());
            return entry;
        }
        ChatModelConfig::preset(name)
    }

    /// Names of all known model entries, presets included.
    pub fn model_names(&self) -> Vec<String> {
        let mut names: Vec<String> = ["gpt-4-turbo", "gpt-4o", "gpt-3.5-turbo"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        for name in self.models.keys() {
            if !names.contains(name) {
                names.push(name.clone());
            }
        }
        names
    }
}

/// File paths binding one course document to its derived artifacts
#[derive(Debug, Clone, Deserialize)]
pub struct CourseConfig {
    pub pdf_file_path: PathBuf,
    pub chunks_json_path: PathBuf,
    pub embeddings_npy_path: PathBuf,
    pub faiss_index_path: PathBuf,
    /// Defaults to `<chunks_json_path>.manifest.json`
    #[serde(default)]
    pub manifest_path: Option<PathBuf>,
}

impl CourseConfig {
    /// Derives all artifact paths from a source document and a cache directory.
    pub fn in_dir(source: impl Into<PathBuf>, cache_dir: &Path) -> Self {
        Self {
            pdf_file_path: source.into(),
            chunks_json_path: cache_dir.join("chunks.json"),
            embeddings_npy_path: cache_dir.join("embeddings.npy"),
            faiss_index_path: cache_dir.join("index.bin"),
            manifest_path: None,
        }
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.manifest_path.clone().unwrap_or_else(|| {
            let mut name = self.chunks_json_path.as_os_str().to_owned();
            name.push(".manifest.json");
            PathBuf::from(name)
        })
    }

    /// Resolves relative paths against `base`.
    pub fn resolved(&self, base: &Path) -> Self {
        let join = |p: &PathBuf| {
            if p.is_absolute() {
                p.clone()
            } else {
                base.join(p)
            }
        };
        Self {
            pdf_file_path: join(&self.pdf_file_path),
            chunks_json_path: join(&self.chunks_json_path),
            embeddings_npy_path: join(&self.embeddings_npy_path),
            faiss_index_path: join(&self.faiss_index_path),
            manifest_path: self.manifest_path.as_ref().map(join),
        }
    }
}

/// Configuration loaded from .ariarc.toml or ~/.config/aria/config.toml
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub chunking: ChunkingConfig,
    pub embeddings: EmbeddingConfig,
    pub ocr: OcrConfig,
    pub retrieval: RetrievalConfig,
    pub chat: ChatConfig,
    /// Courses keyed by name
    pub courses: BTreeMap<String, CourseConfig>,

    /// Directory the config was loaded from; relative course paths resolve here
    #[serde(skip)]
    base_dir: Option<PathBuf>,
}

impl Config {
    /// Load configuration from files
    ///
    /// Precedence (highest to lowest):
    /// 1. .ariarc.toml in current directory
    /// 2. ~/.config/aria/config.toml
    pub fn load() -> Self {
        if let Some(config) = Self::load_from_path(Path::new(".ariarc.toml")) {
            return config;
        }

        if let Some(home) = dirs::home_dir() {
            let config_path = home.join(".config").join("aria").join("config.toml");
            if let Some(config) = Self::load_from_path(&config_path) {
                return config;
            }
        }

        Self::default()
    }

    /// Load configuration from an explicit file.
    pub fn load_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read {}: {}", path.display(), e))?;
        let mut config = Self::parse(&content)
            .map_err(|e| anyhow::anyhow!("Failed to parse {}: {}", path.display(), e))?;
        config.base_dir = path.parent().map(Path::to_path_buf);
        Ok(config)
    }

    /// Parse configuration from TOML text.
    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    fn load_from_path(path: &Path) -> Option<Self> {
        let content = std::fs::read_to_string(path).ok()?;
        match Self::parse(&content) {
            Ok(mut config) => {
                config.base_dir = path.parent().map(Path::to_path_buf);
                Some(config)
            }
            Err(e) => {
                tracing::warn!("Failed to parse {}: {}", path.display(), e);
                None
            }
        }
    }

    /// Get a course by name with paths resolved against the config location.
    pub fn course(&self, name: &str) -> Option<CourseConfig> {
        let course = self.courses.get(name)?;
        Some(match self.base_dir.as_deref() {
            Some(base) if !base.as_os_str().is_empty() => course.resolved(base),
            _ => course.clone(),
        })
    }

    /// Names of all configured courses.
    pub fn course_names(&self) -> Vec<String> {
        self.courses.keys().cloned().collect()
    }

    /// Merge CLI top-k with config (CLI wins)
    pub fn merge_top_k(&self, cli_value: Option<usize>) -> usize {
        cli_value.unwrap_or_else(|| self.retrieval.top_k())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = Config::default();
        assert_eq!(config.chunking.chunk_size(), 500);
        assert_eq!(config.chunking.tokenizer(), "cl100k_base");
        assert_eq!(config.embeddings.model(), "text-embedding-ada-002");
        assert_eq!(config.embeddings.batch_size(), 20);
        assert_eq!(config.embeddings.provider(), EmbeddingProviderType::Openai);
        assert_eq!(config.ocr.enabled(), OcrMode::Auto);
        assert_eq!(config.ocr.language(), "eng");
        assert_eq!(config.retrieval.top_k(), 3);
    }

    #[test]
    fn parses_courses_and_sections() {
        let config = Config::parse(
            r#"
[chunking]
chunk_size = 64
tokenizer = "whitespace"

[embeddings]
provider = "dummy"
dimension = 8
batch_size = 0

[ocr]
enabled = "off"

[courses.python]
pdf_file_path = "docs/python.pdf"
chunks_json_path = "cache/python_chunks.json"
embeddings_npy_path = "cache/python_embeddings.npy"
faiss_index_path = "cache/python.index"
"#,
        )
        .unwrap();

        assert_eq!(config.chunking.chunk_size(), 64);
        assert_eq!(config.embeddings.provider(), EmbeddingProviderType::Dummy);
        assert_eq!(config.embeddings.dimension(), 8);
        // zero falls back to the default
        assert_eq!(config.embeddings.batch_size(), 20);
        assert_eq!(config.ocr.enabled(), OcrMode::Off);

        let course = config.course("python").unwrap();
        assert_eq!(course.pdf_file_path, PathBuf::from("docs/python.pdf"));
        assert_eq!(
            course.manifest_path(),
            PathBuf::from("cache/python_chunks.json.manifest.json")
        );
        assert!(config.course("missing").is_none());
    }

    #[test]
    fn relative_course_paths_resolve_against_config_dir() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".ariarc.toml");
        std::fs::write(
            &path,
            r#"
[courses.intro]
pdf_file_path = "intro.pdf"
chunks_json_path = "/abs/chunks.json"
embeddings_npy_path = "e.npy"
faiss_index_path = "i.bin"
"#,
        )
        .unwrap();

        let config = Config::load_file(&path).unwrap();
        let course = config.course("intro").unwrap();
        assert_eq!(course.pdf_file_path, dir.path().join("intro.pdf"));
        assert_eq!(course.chunks_json_path, PathBuf::from("/abs/chunks.json"));
    }

    #[test]
    fn chat_model_presets_and_overrides() {
        let config = Config::parse(
            r#"
[chat.models.tutor]
model = "gpt-4o-mini"
temperature = 0.2
"#,
        )
        .unwrap();

        let preset = config.chat.model_entry("gpt-4-turbo");
        assert_eq!(preset.model.as_deref(), Some("gpt-4-turbo"));
        assert_eq!(preset.max_tokens(), 150);

        let tutor = config.chat.model_entry("tutor");
        assert_eq!(tutor.model.as_deref(), Some("gpt-4o-mini"));
        assert!((tutor.temperature() - 0.2).abs() < f32::EPSILON);
        assert!(config.chat.model_names().contains(&"tutor".to_string()));
    }
}
