//! TOML configuration.
//!
//! Every section has defaults, so an empty file is a valid configuration
//! (describer = local Ollama, embeddings disabled, SQLite index under
//! `./data`). See [`load_config`] for the validation rules.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use veloindex_core::retrieval::{FallbackPolicy, DEFAULT_TOP_K};
use veloindex_core::sampling::SamplingInterval;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub input: InputConfig,
    #[serde(default)]
    pub sampling: SamplingConfig,
    #[serde(default)]
    pub extractor: ExtractorConfig,
    #[serde(default)]
    pub describer: DescriberConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub indexing: IndexingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

impl Config {
    /// Defaults for every section. Used when no config file exists.
    pub fn minimal() -> Self {
        Self::default()
    }

    /// The shared sampling interval. Falls back to the default for an
    /// unvalidated zero value.
    pub fn sampling_interval(&self) -> SamplingInterval {
        SamplingInterval::new(self.sampling.interval_secs).unwrap_or_default()
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct InputConfig {
    /// Directory input video labels are resolved against.
    #[serde(default = "default_input_dir")]
    pub dir: PathBuf,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            dir: default_input_dir(),
        }
    }
}

fn default_input_dir() -> PathBuf {
    PathBuf::from("input")
}

#[derive(Debug, Deserialize, Clone)]
pub struct SamplingConfig {
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
        }
    }
}

fn default_interval_secs() -> u64 {
    SamplingInterval::DEFAULT_SECS
}

#[derive(Debug, Deserialize, Clone)]
pub struct ExtractorConfig {
    /// Decoder executable (name on `PATH` or absolute path).
    #[serde(default = "default_ffmpeg")]
    pub ffmpeg: PathBuf,
    #[serde(default = "default_extract_timeout_secs")]
    pub timeout_secs: u64,
    /// Parent directory for scratch sessions. Defaults to the system temp dir.
    #[serde(default)]
    pub scratch_root: Option<PathBuf>,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            ffmpeg: default_ffmpeg(),
            timeout_secs: default_extract_timeout_secs(),
            scratch_root: None,
        }
    }
}

impl ExtractorConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn default_ffmpeg() -> PathBuf {
    PathBuf::from("ffmpeg")
}
fn default_extract_timeout_secs() -> u64 {
    600
}

#[derive(Debug, Deserialize, Clone)]
pub struct DescriberConfig {
    /// `ollama`, `openai`, or `disabled`.
    #[serde(default = "default_describer_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    /// Overrides the built-in frame prompt.
    #[serde(default)]
    pub prompt: Option<String>,
    #[serde(default = "default_describe_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for DescriberConfig {
    fn default() -> Self {
        Self {
            provider: default_describer_provider(),
            model: None,
            url: None,
            prompt: None,
            timeout_secs: default_describe_timeout_secs(),
        }
    }
}

fn default_describer_provider() -> String {
    "ollama".to_string()
}
fn default_describe_timeout_secs() -> u64 {
    120
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    /// `disabled`, `openai`, or `ollama`.
    #[serde(default = "default_embedding_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_embed_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            model: None,
            dims: None,
            url: None,
            max_retries: default_max_retries(),
            timeout_secs: default_embed_timeout_secs(),
        }
    }
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

fn default_embedding_provider() -> String {
    "disabled".to_string()
}
fn default_max_retries() -> u32 {
    3
}
fn default_embed_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct IndexConfig {
    /// SQLite database file backing the frame index.
    #[serde(default = "default_index_path")]
    pub path: PathBuf,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            path: default_index_path(),
        }
    }
}

fn default_index_path() -> PathBuf {
    PathBuf::from("./data/velo.sqlite")
}

#[derive(Debug, Deserialize, Clone)]
pub struct IndexingConfig {
    /// Frames described and submitted concurrently.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

impl Default for IndexingConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
        }
    }
}

fn default_concurrency() -> usize {
    1
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default)]
    pub fallback: FallbackPolicy,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            fallback: FallbackPolicy::default(),
        }
    }
}

fn default_top_k() -> usize {
    DEFAULT_TOP_K
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:7341".to_string()
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

pub fn validate(config: &Config) -> Result<()> {
    if config.sampling.interval_secs == 0 {
        anyhow::bail!("sampling.interval_secs must be > 0");
    }

    if config.extractor.timeout_secs == 0 {
        anyhow::bail!("extractor.timeout_secs must be > 0");
    }

    if config.retrieval.top_k < 1 || config.retrieval.top_k > DEFAULT_TOP_K {
        anyhow::bail!("retrieval.top_k must be between 1 and {}", DEFAULT_TOP_K);
    }

    if config.describer.timeout_secs == 0 {
        anyhow::bail!("describer.timeout_secs must be > 0");
    }

    if config.embedding.timeout_secs == 0 {
        anyhow::bail!("embedding.timeout_secs must be > 0");
    }

    if config.indexing.concurrency < 1 {
        anyhow::bail!("indexing.concurrency must be >= 1");
    }

    match config.describer.provider.as_str() {
        "disabled" | "ollama" | "openai" => {}
        other => anyhow::bail!(
            "Unknown describer provider: '{}'. Must be disabled, ollama, or openai.",
            other
        ),
    }

    if config.embedding.is_enabled() {
        if config.embedding.dims.is_none() || config.embedding.dims == Some(0) {
            anyhow::bail!(
                "embedding.dims must be > 0 when provider is '{}'",
                config.embedding.provider
            );
        }
        if config.embedding.model.is_none() {
            anyhow::bail!(
                "embedding.model must be specified when provider is '{}'",
                config.embedding.provider
            );
        }
    }

    match config.embedding.provider.as_str() {
        "disabled" | "openai" | "ollama" => {}
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be disabled, openai, or ollama.",
            other
        ),
    }

    Ok(())
}
