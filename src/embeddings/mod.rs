// Embeddings module
// Turns lore text into vectors through a local Ollama model or a remote API

pub mod ollama;
pub mod remote;
pub mod retry;

use crate::config::{EmbeddingBackend, EmbeddingConfig};
use crate::{LoreError, Result};

pub use ollama::OllamaEmbedder;
pub use remote::RemoteEmbedder;
pub use retry::RetryPolicy;

/// A fixed-dimension vector produced by an [`EmbeddingProvider`]
pub type Embedding = Vec<f32>;

/// Batch size callers should use when embedding large corpora
pub const DEFAULT_BATCH_SIZE: usize = 100;

/// Capability shared by every embedding backend.
///
/// `embed` returns exactly one vector per input text, in input order. Vectors from the same
/// configured model always have the same dimension, so they can be compared across calls.
pub trait EmbeddingProvider: Send + Sync {
    fn embed(&self, texts: &[String]) -> Result<Vec<Embedding>>;

    /// Identifier of the model producing the vectors
    fn model(&self) -> &str;

    /// Verify the backend is reachable before a long ingestion run
    fn health_check(&self) -> Result<()> {
        Ok(())
    }
}

/// Build the backend selected in configuration
#[inline]
pub fn provider_from_config(config: &EmbeddingConfig) -> Result<Box<dyn EmbeddingProvider>> {
    config.validate()?;
    let provider: Box<dyn EmbeddingProvider> = match config.backend {
        EmbeddingBackend::Ollama => Box::new(OllamaEmbedder::new(config)?),
        EmbeddingBackend::Remote => Box::new(RemoteEmbedder::new(config)?),
    };
    Ok(provider)
}

/// Reject responses that do not line up with the request
pub(crate) fn check_batch(expected: usize, vectors: &[Embedding]) -> Result<()> {
    if vectors.len() != expected {
        return Err(LoreError::ProviderUnavailable(format!(
            "Mismatch between request and response counts: {} vs {}",
            expected,
            vectors.len()
        )));
    }

    if let Some(first) = vectors.first() {
        if first.is_empty() {
            return Err(LoreError::ProviderUnavailable(
                "Provider returned an empty embedding".to_string(),
            ));
        }
        if let Some(bad) = vectors.iter().find(|v| v.len() != first.len()) {
            return Err(LoreError::ProviderUnavailable(format!(
                "Inconsistent embedding dimensions in one batch: {} vs {}",
                first.len(),
                bad.len()
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_count_mismatch_is_rejected() {
        let vectors = vec![vec![0.1, 0.2]];
        assert!(matches!(
            check_batch(2, &vectors),
            Err(LoreError::ProviderUnavailable(_))
        ));
    }

    #[test]
    fn batch_dimension_mismatch_is_rejected() {
        let vectors = vec![vec![0.1, 0.2], vec![0.3]];
        assert!(check_batch(2, &vectors).is_err());
    }

    #[test]
    fn empty_vectors_are_not_accepted() {
        let vectors = vec![Vec::new()];
        assert!(check_batch(1, &vectors).is_err());
    }

    #[test]
    fn well_formed_batch_passes() {
        let vectors = vec![vec![0.1, 0.2], vec![0.3, 0.4]];
        assert!(check_batch(2, &vectors).is_ok());
        assert!(check_batch(0, &[]).is_ok());
    }

    #[test]
    fn remote_provider_requires_api_key() {
        let config = EmbeddingConfig {
            backend: EmbeddingBackend::Remote,
            api_key_env: "LORE_WHISPER_UNSET_EMBEDDING_KEY".to_string(),
            ..EmbeddingConfig::default()
        };
        assert!(matches!(
            provider_from_config(&config),
            Err(LoreError::Config(_))
        ));
    }
}
