use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use fastembed::{InitOptionsUserDefined, TextEmbedding, TokenizerFiles, UserDefinedEmbeddingModel};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::config::{EmbeddingProvider, EmbeddingSettings, OllamaSettings};

#[async_trait]
pub trait Embedder: Send + Sync {
    /// Recorded in `index_meta.json` so a reload can spot a model switch.
    fn model_name(&self) -> &str;

    async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>>;

    async fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
        self.embed(vec![text.to_string()])
            .await?
            .into_iter()
            .next()
            .context("Embedding backend returned no vector")
    }
}

pub fn build_embedder(
    settings: &EmbeddingSettings,
    ollama: &OllamaSettings,
) -> Result<Arc<dyn Embedder>> {
    match settings.provider {
        EmbeddingProvider::Ollama => Ok(Arc::new(OllamaEmbedder::new(
            &ollama.base_url,
            &settings.model,
            Duration::from_secs(ollama.timeout_secs),
        )?)),
        EmbeddingProvider::Local => Ok(Arc::new(LocalEmbedder::new(&settings.model_dir)?)),
    }
}

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

/// Embeddings served by the same Ollama instance that generates answers.
pub struct OllamaEmbedder {
    client: Client,
    base_url: String,
    model: String,
}

impl OllamaEmbedder {
    pub fn new(base_url: &str, model: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
        })
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let url = format!("{}/api/embed", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&EmbedRequest {
                model: &self.model,
                input: &texts,
            })
            .send()
            .await
            .with_context(|| format!("Ollama embedding request to {} failed", url))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            anyhow::bail!("Ollama embedding request failed: {} - {}", status, error_text);
        }

        let body: EmbedResponse = response
            .json()
            .await
            .context("Failed to parse Ollama embedding response")?;

        if body.embeddings.len() != texts.len() {
            anyhow::bail!(
                "Ollama returned {} embeddings for {} inputs",
                body.embeddings.len(),
                texts.len()
            );
        }

        Ok(body.embeddings)
    }
}

/// In-process ONNX embeddings loaded from a local model directory.
pub struct LocalEmbedder {
    model: Arc<TextEmbedding>,
    name: String,
}

impl LocalEmbedder {
    pub fn new(model_dir: &Path) -> Result<Self> {
        tracing::info!("Initializing embedding model from {}", model_dir.display());

        if !model_dir.exists() {
            anyhow::bail!("Model directory not found: {}", model_dir.display());
        }

        let read = |name: &str| {
            std::fs::read(model_dir.join(name))
                .with_context(|| format!("Failed to read {}", name))
        };

        let user_model = UserDefinedEmbeddingModel {
            onnx_file: read("model.onnx")?,
            tokenizer_files: TokenizerFiles {
                tokenizer_file: read("tokenizer.json")?,
                config_file: read("config.json")?,
                special_tokens_map_file: read("special_tokens_map.json")?,
                tokenizer_config_file: read("tokenizer_config.json")?,
            },
        };

        let model =
            TextEmbedding::try_new_from_user_defined(user_model, InitOptionsUserDefined::default())
                .map_err(|e| anyhow::anyhow!("Failed to initialize embedding model: {}", e))?;

        let name = model_dir
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "local".to_string());

        tracing::info!("Embedding model {} ready", name);
        Ok(Self {
            model: Arc::new(model),
            name,
        })
    }
}

#[async_trait]
impl Embedder for LocalEmbedder {
    fn model_name(&self) -> &str {
        &self.name
    }

    async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        let model = Arc::clone(&self.model);
        tokio::task::spawn_blocking(move || model.embed(texts, None))
            .await
            .context("Embedding task failed")?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_ollama_embed_batch() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/embed"))
            .and(body_partial_json(json!({ "model": "llama3", "input": ["a", "b"] })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "model": "llama3",
                "embeddings": [[0.1, 0.2], [0.3, 0.4]]
            })))
            .mount(&server)
            .await;

        let embedder = OllamaEmbedder::new(&server.uri(), "llama3", Duration::from_secs(5)).unwrap();
        let vectors = embedder
            .embed(vec!["a".to_string(), "b".to_string()])
            .await
            .unwrap();
        assert_eq!(vectors, vec![vec![0.1, 0.2], vec![0.3, 0.4]]);
    }

    #[tokio::test]
    async fn test_ollama_embed_count_mismatch() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/embed"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "embeddings": [[1.0]] })))
            .mount(&server)
            .await;

        let embedder = OllamaEmbedder::new(&server.uri(), "llama3", Duration::from_secs(5)).unwrap();
        let err = embedder
            .embed(vec!["a".to_string(), "b".to_string()])
            .await
            .unwrap_err();
        assert!(err.to_string().contains("1 embeddings for 2 inputs"));
    }

    #[test]
    fn test_local_embedder_requires_model_dir() {
        let err = LocalEmbedder::new(Path::new("/nonexistent/bge-small")).err().unwrap();
        assert!(err.to_string().contains("Model directory not found"));
    }
}
