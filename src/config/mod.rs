// Configuration management module
// TOML settings plus the interactive setup flow

pub mod interactive;
pub mod settings;

pub use interactive::{run_interactive_config, show_config};
pub use settings::{
    BudgetScope, Config, ConfigError, EmbeddingBackend, EmbeddingConfig, GenerationConfig,
    IndexBackend, IndexConfig, RetrievalConfig, api_key_from_env,
};
