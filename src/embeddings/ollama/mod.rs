#[cfg(test)]
mod tests;

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

use super::retry::RetryPolicy;
use super::{Embedding, EmbeddingProvider, check_batch};
use crate::config::EmbeddingConfig;
use crate::{LoreError, Result};

#[derive(Debug, Clone)]
pub struct OllamaEmbedder {
    base_url: Url,
    model: String,
    batch_size: usize,
    agent: ureq::Agent,
    retry: RetryPolicy,
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

#[derive(Debug, Deserialize)]
pub struct ModelInfo {
    pub name: String,
    pub size: Option<u64>,
    pub digest: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ModelsResponse {
    models: Vec<ModelInfo>,
}

fn build_agent(timeout: Duration) -> ureq::Agent {
    ureq::Agent::config_builder()
        .timeout_global(Some(timeout))
        .build()
        .into()
}

impl OllamaEmbedder {
    #[inline]
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let base_url = config.ollama_url()?;

        Ok(Self {
            base_url,
            model: config.model.clone(),
            batch_size: config.batch_size.max(1) as usize,
            agent: build_agent(Duration::from_secs(config.timeout_secs)),
            retry: RetryPolicy::new(config.retry_attempts),
        })
    }

    #[inline]
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.agent = build_agent(timeout);
        self
    }

    #[inline]
    #[must_use]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Ping the Ollama server to check if it's responsive
    #[inline]
    pub fn ping(&self) -> Result<()> {
        let url = self.endpoint("/api/tags")?;
        debug!("Pinging Ollama server at {}", url);

        self.retry.run("Ollama", || {
            self.agent
                .get(url.as_str())
                .call()
                .and_then(|mut resp| resp.body_mut().read_to_string())
        })?;

        debug!("Server ping successful");
        Ok(())
    }

    /// Validate that the configured model is available
    #[inline]
    pub fn validate_model(&self) -> Result<()> {
        debug!("Validating model: {}", self.model);

        let models = self.list_models()?;

        if models.iter().any(|m| m.name == self.model) {
            debug!("Model {} is available", self.model);
            Ok(())
        } else {
            let available_models: Vec<&str> = models.iter().map(|m| m.name.as_str()).collect();
            warn!(
                "Model {} not found. Available models: {:?}",
                self.model, available_models
            );
            Err(LoreError::ProviderUnavailable(format!(
                "Model '{}' is not available. Available models: {:?}",
                self.model, available_models
            )))
        }
    }

    /// List all available models
    #[inline]
    pub fn list_models(&self) -> Result<Vec<ModelInfo>> {
        let url = self.endpoint("/api/tags")?;
        debug!("Fetching available models from {}", url);

        let response_text = self.retry.run("Ollama", || {
            self.agent
                .get(url.as_str())
                .call()
                .and_then(|mut resp| resp.body_mut().read_to_string())
        })?;

        let models_response: ModelsResponse = serde_json::from_str(&response_text)
            .map_err(|e| {
                LoreError::ProviderUnavailable(format!("Failed to parse models response: {}", e))
            })?;

        debug!("Found {} models", models_response.models.len());
        Ok(models_response.models)
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .map_err(|e| LoreError::Config(format!("Failed to build Ollama URL: {}", e)))
    }

    fn embed_single_batch(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        let url = self.endpoint("/api/embed")?;

        let request_json = serde_json::to_string(&EmbedRequest {
            model: &self.model,
            input: texts,
        })
        .map_err(|e| LoreError::Other(e.into()))?;

        let response_text = self.retry.run("Ollama", || {
            self.agent
                .post(url.as_str())
                .header("Content-Type", "application/json")
                .send(&request_json)
                .and_then(|mut resp| resp.body_mut().read_to_string())
        })?;

        let response: EmbedResponse = serde_json::from_str(&response_text).map_err(|e| {
            LoreError::ProviderUnavailable(format!("Failed to parse embedding response: {}", e))
        })?;

        check_batch(texts.len(), &response.embeddings)?;
        Ok(response.embeddings)
    }
}

impl EmbeddingProvider for OllamaEmbedder {
    #[inline]
    fn embed(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!("Generating embeddings for {} texts", texts.len());

        let mut results = Vec::with_capacity(texts.len());

        // Process in batches to avoid overwhelming the server
        for chunk in texts.chunks(self.batch_size) {
            results.extend(self.embed_single_batch(chunk)?);
        }

        debug!(
            "Generated {} embeddings with {} dimensions",
            results.len(),
            results.first().map_or(0, Vec::len)
        );
        Ok(results)
    }

    #[inline]
    fn model(&self) -> &str {
        &self.model
    }

    /// Ping the server, then make sure the model has been pulled
    #[inline]
    fn health_check(&self) -> Result<()> {
        debug!("Performing health check for Ollama at {}", self.base_url);

        self.ping()?;
        self.validate_model()?;

        info!(
            "Health check passed for Ollama server at {} with model {}",
            self.base_url, self.model
        );
        Ok(())
    }
}
