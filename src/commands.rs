use anyhow::{Context, Result};
use console::style;
use std::path::Path;
use tracing::info;

use crate::config::Config;
use crate::generation::{GenerationClient, gate_from_config};
use crate::notes::{Note, load_notes};
use crate::pipeline::LorePipeline;
use crate::retrieval::PromptMode;

pub const QUESTION_INSTRUCTION: &str =
    "You are a Dungeon Master answering questions about your campaign world.";

pub const GENERATOR_INSTRUCTION: &str =
    "You are an expert Dungeon Master creating rich, interconnected campaign world content.";

/// Instruction used when the caller does not supply one
#[inline]
pub fn default_instruction(mode: PromptMode) -> &'static str {
    match mode {
        PromptMode::Question => QUESTION_INSTRUCTION,
        PromptMode::Generator => GENERATOR_INSTRUCTION,
    }
}

/// Load notes from `notes_dir` and write them into the index
#[inline]
pub async fn ingest_notes(config: &Config, notes_dir: &Path, tag: bool) -> Result<()> {
    info!("Ingesting notes from {}", notes_dir.display());

    let tagger = if tag {
        Some(
            GenerationClient::new(&config.generation, gate_from_config(&config.generation))
                .context("Tagging needs a generation API key")?,
        )
    } else {
        None
    };

    let notes = load_notes(notes_dir, tagger.as_ref())
        .with_context(|| format!("Failed to load notes from {}", notes_dir.display()))?;
    let untagged = notes.iter().filter(|note| note.tags.is_empty()).count();
    let entries: Vec<_> = notes.into_iter().map(Note::into_entry).collect();

    let pipeline = LorePipeline::from_config(config, false)
        .await
        .context("Failed to set up the pipeline")?;
    let written = pipeline.ingest(&entries).await?;
    let total = pipeline.index().count().await?;

    println!(
        "{} Ingested {} notes ({} in index)",
        style("✓").green(),
        written,
        total
    );
    if untagged > 0 {
        println!(
            "{} {} notes have no tags; run with --tag to generate them",
            style("⚠").yellow(),
            untagged
        );
    }

    Ok(())
}

/// Print the nearest entries for `query`
#[inline]
pub async fn search_lore(config: &Config, query: &str, limit: usize) -> Result<()> {
    let pipeline = LorePipeline::from_config(config, false)
        .await
        .context("Failed to set up the pipeline")?;
    let ranked = pipeline.search(query, limit).await?;

    if ranked.is_empty() {
        println!("No matching lore found.");
        return Ok(());
    }

    for (position, item) in ranked.iter().enumerate() {
        println!(
            "{:>2}. {} {}",
            position + 1,
            style(&item.title).bold(),
            style(format!("(relevance: {:.2})", item.relevance)).dim()
        );
        if !item.tags.is_empty() {
            println!("    Tags: {}", style(&item.tags).cyan());
        }
    }

    Ok(())
}

/// Retrieve context for `request` and send it to the generation model
#[inline]
pub async fn generate_with_lore(
    config: &Config,
    mode: PromptMode,
    request: &str,
    additional_context: &str,
    instruction: Option<&str>,
    model: Option<&str>,
) -> Result<()> {
    let pipeline = LorePipeline::from_config(config, true)
        .await
        .context("Failed to set up the pipeline")?;
    let instruction = instruction.unwrap_or_else(|| default_instruction(mode));

    let completion = pipeline
        .run(mode, instruction, request, additional_context, model)
        .await?;

    let rule = "=".repeat(70);
    println!("\n{}", rule);
    println!("{}", completion.into_text());
    println!("{}", rule);

    Ok(())
}
