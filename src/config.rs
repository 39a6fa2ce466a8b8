use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::major::Major;

const CONFIG_FILE: &str = "boxchat";
const ENV_PREFIX: &str = "BOXCHAT";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub server: ServerSettings,
    pub ollama: OllamaSettings,
    pub embedding: EmbeddingSettings,
    pub corpus: CorpusSettings,
    pub retrieval: RetrievalSettings,
    pub prompt: PromptSettings,
}

impl Settings {
    /// Layered load: `.env`, then `boxchat.toml` (or `BOXCHAT_CONFIG`), then
    /// `BOXCHAT_*` environment variables with `__` between sections.
    pub fn load() -> Result<Self> {
        dotenv::dotenv().ok();

        let file = std::env::var("BOXCHAT_CONFIG").unwrap_or_else(|_| CONFIG_FILE.to_string());
        let settings = config::Config::builder()
            .add_source(config::File::with_name(&file).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to read configuration")?;

        settings
            .try_deserialize()
            .context("Invalid configuration")
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub bind: String,
    pub request_timeout_secs: u64,
}

impl ServerSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8000".to_string(),
            request_timeout_secs: 120,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OllamaSettings {
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub timeout_secs: u64,
}

impl Default for OllamaSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            model: "llama3".to_string(),
            temperature: 0.0,
            timeout_secs: 120,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProvider {
    #[default]
    Ollama,
    Local,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    pub provider: EmbeddingProvider,
    /// Ollama model name; ignored by the local provider.
    pub model: String,
    /// ONNX model directory for the local provider.
    pub model_dir: PathBuf,
    pub batch_size: usize,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            provider: EmbeddingProvider::Ollama,
            model: "llama3".to_string(),
            model_dir: PathBuf::from("models/bge-small-en-v1.5"),
            batch_size: 32,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CorpusSettings {
    pub document_root: PathBuf,
    pub storage_root: PathBuf,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl CorpusSettings {
    /// Storage directory holding the persisted index for `major`.
    pub fn storage_dir(&self, major: Major) -> PathBuf {
        self.storage_root.join(major.storage_dir_name())
    }

    /// Markdown curriculum document for `major`.
    pub fn document_path(&self, major: Major) -> PathBuf {
        self.document_root.join(major.document_file())
    }

    pub fn with_root(root: &Path) -> Self {
        Self {
            document_root: root.to_path_buf(),
            storage_root: root.to_path_buf(),
            ..Self::default()
        }
    }
}

impl Default for CorpusSettings {
    fn default() -> Self {
        Self {
            document_root: PathBuf::from("."),
            storage_root: PathBuf::from("."),
            chunk_size: 1000,
            chunk_overlap: 200,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetrievalMode {
    /// Rank chunks against the question embedding.
    #[default]
    Similarity,
    /// Prefix of the first stored document, whatever the question.
    Leading,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetrievalSettings {
    pub mode: RetrievalMode,
    pub top_k: usize,
    pub excerpt_chars: usize,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            mode: RetrievalMode::Similarity,
            top_k: 3,
            excerpt_chars: 1500,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PromptSettings {
    pub template: Option<String>,
    pub template_file: Option<PathBuf>,
}
