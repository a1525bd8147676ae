use anyhow::Context;
use clap::{Parser, Subcommand};
use lore_whisper::Result;
use lore_whisper::commands::{generate_with_lore, ingest_notes, search_lore};
use lore_whisper::config::{Config, run_interactive_config, show_config};
use lore_whisper::retrieval::PromptMode;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "lore-whisper")]
#[command(about = "Retrieval-grounded question answering and lore generation for campaign notes")]
#[command(version)]
struct Cli {
    /// Directory holding config.toml and the vector index
    #[arg(long, global = true)]
    base_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Configure embedding, generation and retrieval settings
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
    /// Load notes from a directory into the index
    Ingest {
        /// Directory with one subdirectory of markdown notes per category
        notes_dir: PathBuf,
        /// Generate tags for notes missing from the tag ledger
        #[arg(long)]
        tag: bool,
    },
    /// List the entries most similar to a query
    Search {
        query: String,
        /// Maximum number of entries to show
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    /// Answer a question from the indexed lore
    Ask {
        question: String,
        #[command(flatten)]
        options: GenerationArgs,
    },
    /// Create new lore consistent with the indexed lore
    Generate {
        request: String,
        #[command(flatten)]
        options: GenerationArgs,
    },
}

#[derive(clap::Args)]
struct GenerationArgs {
    /// Extra text appended to the retrieval query
    #[arg(long, default_value = "")]
    context: String,
    /// System instruction replacing the default for the mode
    #[arg(long)]
    instruction: Option<String>,
    /// Model to use instead of the configured one
    #[arg(long)]
    model: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    // A missing .env is fine; keys may already be in the environment
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let base_dir = match cli.base_dir {
        Some(dir) => dir,
        None => Config::default_dir()?,
    };

    if let Commands::Config { show } = cli.command {
        if show {
            let config = Config::load(&base_dir).context("Failed to load configuration")?;
            show_config(&config);
        } else {
            run_interactive_config(&base_dir)?;
        }
        return Ok(());
    }

    let config = Config::load(&base_dir).context("Failed to load configuration")?;

    match cli.command {
        Commands::Config { .. } => {}
        Commands::Ingest { notes_dir, tag } => {
            ingest_notes(&config, &notes_dir, tag).await?;
        }
        Commands::Search { query, limit } => {
            search_lore(&config, &query, limit).await?;
        }
        Commands::Ask { question, options } => {
            generate_with_lore(
                &config,
                PromptMode::Question,
                &question,
                &options.context,
                options.instruction.as_deref(),
                options.model.as_deref(),
            )
            .await?;
        }
        Commands::Generate { request, options } => {
            generate_with_lore(
                &config,
                PromptMode::Generator,
                &request,
                &options.context,
                options.instruction.as_deref(),
                options.model.as_deref(),
            )
            .await?;
        }
    }

    Ok(())
}
