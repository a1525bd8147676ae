
use anyhow::{Context, Result};
use console::style;
use dialoguer::{Confirm, Input, Select};
use std::path::Path;

use super::{
    BudgetScope, Config, EmbeddingBackend, EmbeddingConfig, GenerationConfig, RetrievalConfig,
};
use crate::generation::{AutoAccept, GenerationClient};

#[inline]
pub fn run_interactive_config(base_dir: &Path) -> Result<()> {
    eprintln!("{}", style("🔧 Lore Whisper Configuration Setup").bold().cyan());
    eprintln!();

    let mut config = load_existing_config(base_dir)?;

    eprintln!("{}", style("Embedding Configuration").bold().yellow());
    eprintln!("Choose where lore notes are turned into vectors.");
    eprintln!();

    configure_embedding(&mut config.embedding)?;

    eprintln!();
    eprintln!("{}", style("Retrieval Configuration").bold().yellow());
    configure_retrieval(&mut config.retrieval)?;

    eprintln!();
    eprintln!("{}", style("Generation Configuration").bold().yellow());
    let model: String = Input::new()
        .with_prompt("Chat model")
        .default(config.generation.model.clone())
        .interact_text()?;
    config.generation.set_model(model)?;
    config.generation.auto_accept_cost = Confirm::new()
        .with_prompt("Send prompts without asking to confirm the estimated cost?")
        .default(config.generation.auto_accept_cost)
        .interact()?;

    eprintln!();
    eprintln!("{}", style("Testing configuration...").yellow());

    match check_chat_model(&config.generation) {
        Ok(()) => eprintln!(
            "{}",
            style(format!("✓ Chat model {} is available", config.generation.model)).green()
        ),
        Err(e) => {
            eprintln!(
                "{}",
                style(format!("⚠ Warning: Could not confirm chat model: {}", e)).yellow()
            );
        }
    }

    if config.embedding.backend == EmbeddingBackend::Ollama {

        if test_ollama_connection(&config.embedding) {
            eprintln!("{}", style("✓ Ollama connection successful!").green());
        } else {
            eprintln!(
                "{}",
                style("⚠ Warning: Could not connect to Ollama").yellow()
            );
            eprintln!("You can continue, but make sure Ollama is running before ingesting.");
        }
    }

    eprintln!();
    if Confirm::new()
        .with_prompt("Save configuration?")
        .default(true)
        .interact()?
    {
        config.save().context("Failed to save configuration")?;
        eprintln!("{}", style("✓ Configuration saved successfully!").green());
        eprintln!(
            "Configuration saved to: {}",
            style(config.config_file_path().display()).cyan()
        );
    } else {
        eprintln!("Configuration not saved.");
    }

    Ok(())
}

#[inline]
pub fn show_config(config: &Config) {
    eprintln!("{}", style("📋 Current Configuration").bold().cyan());
    eprintln!();

    eprintln!("{}", style("Embedding Settings:").bold().yellow());
    eprintln!(
        "  Backend: {}",
        style(format!("{:?}", config.embedding.backend)).cyan()
    );
    eprintln!("  Model: {}", style(&config.embedding.model).cyan());
    eprintln!("  Batch Size: {}", style(config.embedding.batch_size).cyan());
    match config.embedding.backend {
        EmbeddingBackend::Ollama => match config.embedding.ollama_url() {
            Ok(url) => eprintln!("  Ollama URL: {}", style(url).cyan()),
            Err(e) => eprintln!("  Ollama URL: {} ({})", style("Invalid").red(), e),
        },
        EmbeddingBackend::Remote => {
            eprintln!("  Endpoint: {}", style(&config.embedding.remote_url).cyan());
            eprintln!(
                "  API key: {}",
                style(key_status(&config.embedding.api_key_env)).cyan()
            );
        }
    }

    eprintln!();
    eprintln!("{}", style("Generation Settings:").bold().yellow());
    eprintln!("  Endpoint: {}", style(&config.generation.base_url).cyan());
    eprintln!("  Model: {}", style(&config.generation.model).cyan());
    eprintln!(
        "  API key: {}",
        style(key_status(&config.generation.api_key_env)).cyan()
    );
    eprintln!(
        "  Cost per 1k tokens: {}",
        style(config.generation.cost_per_1k_tokens).cyan()
    );
    eprintln!(
        "  Auto-accept cost: {}",
        style(config.generation.auto_accept_cost).cyan()
    );
    if super::api_key_from_env(&config.generation.api_key_env).is_ok() {
        match check_chat_model(&config.generation) {
            Ok(()) => eprintln!("  Model available: {}", style("yes").green()),
            Err(e) => eprintln!("  Model available: {} ({})", style("no").red(), e),
        }
    }

    eprintln!();
    eprintln!("{}", style("Retrieval Settings:").bold().yellow());
    eprintln!("  Top K: {}", style(config.retrieval.top_k).cyan());
    eprintln!(
        "  Context budget: {} chars ({:?} scope)",
        style(config.retrieval.context_budget).cyan(),
        config.retrieval.budget_scope
    );
    eprintln!(
        "  Relevance threshold: {}",
        style(config.retrieval.relevance_threshold).cyan()
    );

    eprintln!();
    eprintln!(
        "Config file: {}",
        style(config.config_file_path().display()).dim()
    );
}

fn key_status(var: &str) -> String {
    match super::api_key_from_env(var) {
        Ok(_) => format!("set ({var})"),
        Err(_) => format!("missing ({var})"),
    }
}

fn load_existing_config(base_dir: &Path) -> Result<Config> {
    if base_dir.join("config.toml").exists() {
        let config = Config::load(base_dir)?;
        eprintln!("{}", style("Found existing configuration.").green());
        Ok(config)
    } else {
        eprintln!(
            "{}",
            style("No existing configuration found. Using defaults.").yellow()
        );
        Config::load(base_dir)
    }
}

fn configure_embedding(embedding: &mut EmbeddingConfig) -> Result<()> {
    let backends = &["ollama", "remote"];
    let default_index = usize::from(embedding.backend == EmbeddingBackend::Remote);

    let backend_index = Select::new()
        .with_prompt("Embedding backend")
        .default(default_index)
        .items(backends)
        .interact()?;

    if backend_index == 0 {
        embedding.backend = EmbeddingBackend::Ollama;

        let host: String = Input::new()
            .with_prompt("Ollama host")
            .default(embedding.host.clone())
            .interact_text()?;

        let port: u16 = Input::new()
            .with_prompt("Ollama port")
            .default(embedding.port)
            .validate_with(|input: &u16| -> Result<(), &str> {
                if *input == 0 {
                    Err("Port must be greater than 0")
                } else {
                    Ok(())
                }
            })
            .interact_text()?;

        embedding.set_host(host)?;
        embedding.set_port(port)?;
    } else {
        embedding.backend = EmbeddingBackend::Remote;

        embedding.remote_url = Input::new()
            .with_prompt("Embeddings endpoint base URL")
            .default(embedding.remote_url.clone())
            .interact_text()?;
        embedding.api_key_env = Input::new()
            .with_prompt("Environment variable holding the API key")
            .default(embedding.api_key_env.clone())
            .interact_text()?;
    }

    let model: String = Input::new()
        .with_prompt("Embedding model")
        .default(embedding.model.clone())
        .validate_with(|input: &String| -> Result<(), &str> {
            if input.trim().is_empty() {
                Err("Model name cannot be empty")
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    let batch_size: u32 = Input::new()
        .with_prompt("Batch size for embedding generation")
        .default(embedding.batch_size)
        .validate_with(|input: &u32| -> Result<(), &str> {
            if *input == 0 {
                Err("Batch size must be greater than 0")
            } else if *input > 1000 {
                Err("Batch size must be 1000 or less")
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    embedding.set_model(model)?;
    embedding.set_batch_size(batch_size)?;

    Ok(())
}

fn configure_retrieval(retrieval: &mut RetrievalConfig) -> Result<()> {
    let top_k: usize = Input::new()
        .with_prompt("Number of notes to retrieve per query")
        .default(retrieval.top_k)
        .interact_text()?;

    let budget: usize = Input::new()
        .with_prompt("Context budget in characters")
        .default(retrieval.context_budget)
        .validate_with(|input: &usize| -> Result<(), &str> {
            if *input == 0 {
                Err("Budget must be greater than 0")
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    let scopes = &["context only", "whole prompt"];
    let scope_index = Select::new()
        .with_prompt("The budget bounds")
        .default(usize::from(retrieval.budget_scope == BudgetScope::Prompt))
        .items(scopes)
        .interact()?;

    retrieval.set_top_k(top_k)?;
    retrieval.set_context_budget(budget)?;
    retrieval.budget_scope = if scope_index == 0 {
        BudgetScope::Context
    } else {
        BudgetScope::Prompt
    };

    Ok(())
}

/// Ask the chat provider whether the configured model is offered
fn check_chat_model(generation: &GenerationConfig) -> crate::Result<()> {
    GenerationClient::new(generation, Box::new(AutoAccept))?.validate_model(None)
}

fn test_ollama_connection(embedding: &EmbeddingConfig) -> bool {
    let url = format!(
        "{}://{}:{}/api/version",
        embedding.protocol, embedding.host, embedding.port
    );

    let agent: ureq::Agent = ureq::Agent::config_builder()
        .timeout_global(Some(std::time::Duration::from_secs(5)))
        .build()
        .into();

    match agent.get(&url).call() {
        Ok(_) => true,
        Err(ureq::Error::StatusCode(code)) if (400..500).contains(&code) => true,
        Err(_) => false,
    }
}
