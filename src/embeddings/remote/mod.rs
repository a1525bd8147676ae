
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use super::retry::RetryPolicy;
use super::{Embedding, EmbeddingProvider, check_batch};
use crate::config::{EmbeddingConfig, api_key_from_env};
use crate::{LoreError, Result};

/// Embeddings from an OpenAI-compatible `/embeddings` endpoint
#[derive(Debug, Clone)]
pub struct RemoteEmbedder {
    endpoint: String,
    model: String,
    api_key: String,
    agent: ureq::Agent,
    retry: RetryPolicy,
}

#[derive(Debug, Serialize)]
struct EmbeddingsRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingDatum>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingDatum {
    index: usize,
    embedding: Vec<f32>,
}

impl RemoteEmbedder {
    /// Reads the API key from the environment variable named in `config`
    #[inline]
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let api_key = api_key_from_env(&config.api_key_env)?;
        Ok(Self::with_api_key(config, api_key))
    }

    #[inline]
    pub fn with_api_key(config: &EmbeddingConfig, api_key: String) -> Self {
        let agent = ureq::Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(config.timeout_secs)))
            .build()
            .into();

        Self {
            endpoint: format!("{}/embeddings", config.remote_url.trim_end_matches('/')),
            model: config.model.clone(),
            api_key,
            agent,
            retry: RetryPolicy::new(config.retry_attempts),
        }
    }

    #[inline]
    #[must_use]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

impl EmbeddingProvider for RemoteEmbedder {
    #[inline]
    fn embed(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!("Requesting {} remote embeddings from {}", texts.len(), self.endpoint);

        let request_json = serde_json::to_string(&EmbeddingsRequest {
            model: &self.model,
            input: texts,
        })
        .map_err(|e| LoreError::Other(e.into()))?;

        let response_text = self.retry.run("embedding API", || {
            self.agent
                .post(self.endpoint.as_str())
                .header("Content-Type", "application/json")
                .header("Authorization", format!("Bearer {}", self.api_key))
                .send(&request_json)
                .and_then(|mut resp| resp.body_mut().read_to_string())
        })?;

        let mut response: EmbeddingsResponse =
            serde_json::from_str(&response_text).map_err(|e| {
                LoreError::ProviderUnavailable(format!(
                    "Failed to parse embedding response: {}",
                    e
                ))
            })?;

        // The API may return items out of order; `index` refers to the input position
        response.data.sort_by_key(|datum| datum.index);
        if let Some((position, datum)) = response
            .data
            .iter()
            .enumerate()
            .find(|(position, datum)| datum.index != *position)
        {
            return Err(LoreError::ProviderUnavailable(format!(
                "Embedding response index {} does not match input position {}",
                datum.index, position
            )));
        }

        let vectors: Vec<Embedding> = response
            .data
            .into_iter()
            .map(|datum| datum.embedding)
            .collect();

        check_batch(texts.len(), &vectors)?;
        Ok(vectors)
    }

    #[inline]
    fn model(&self) -> &str {
        &self.model
    }
}
