use thiserror::Error;

pub type Result<T> = std::result::Result<T, LoreError>;

#[derive(Error, Debug)]
pub enum LoreError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Embedding provider unavailable: {0}")]
    ProviderUnavailable(String),

    #[error("Rate limited by embedding provider: {0}")]
    TransientRateLimit(String),

    #[error(
        "Generation failed (status {}): {body}",
        .status.map_or_else(|| "none".to_string(), |code| code.to_string())
    )]
    GenerationFailed { status: Option<u16>, body: String },

    #[error("Index error: {0}")]
    Index(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

pub mod commands;
pub mod config;
pub mod embeddings;
pub mod generation;
pub mod index;
pub mod notes;
pub mod pipeline;
pub mod retrieval;
