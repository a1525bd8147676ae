// Notes module
// Loads markdown lore notes from `<notes_dir>/<category>/*.md` with tags from a ledger

#[cfg(test)]
mod tests;

use anyhow::Context;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::Result;
use crate::generation::{GenerationClient, or_fallback};
use crate::index::CorpusEntry;

/// Ledger file inside the notes directory, mapping title to tags
pub const TAGS_FILE: &str = "tags.toml";

const TAGGING_SYSTEM: &str =
    "You are a Dungeon Master's assistant, versed in vector databases and fantasy lore.";

const TAGGING_REQUEST: &str = "Create a list of up to 10 tags about this lore entry, for the \
purpose of training a vector database. Return only the tags, separated by |";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Note {
    /// Name of the directory the note was found in
    pub category: String,
    pub title: String,
    pub text: String,
    pub tags: String,
}

impl Note {
    #[inline]
    pub fn into_entry(self) -> CorpusEntry {
        CorpusEntry::new(self.title, self.text, self.tags)
    }
}

/// Tags recorded per note title, persisted as TOML
#[derive(Debug, Clone)]
pub struct TagLedger {
    path: PathBuf,
    tags: BTreeMap<String, String>,
}

impl TagLedger {
    /// A missing file is an empty ledger
    #[inline]
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let tags = if path.exists() {
            let content = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read tag ledger: {}", path.display()))?;
            toml::from_str(&content)
                .with_context(|| format!("Failed to parse tag ledger: {}", path.display()))?
        } else {
            BTreeMap::new()
        };

        Ok(Self { path, tags })
    }

    #[inline]
    pub fn get(&self, title: &str) -> Option<&str> {
        self.tags.get(title).map(String::as_str)
    }

    /// Store tags for `title` and write the ledger back to disk
    #[inline]
    pub fn record(&mut self, title: &str, tags: &str) -> Result<()> {
        self.tags.insert(title.to_string(), tags.to_string());
        let content = toml::to_string(&self.tags).context("Failed to serialize tag ledger")?;
        fs::write(&self.path, content)
            .with_context(|| format!("Failed to write tag ledger: {}", self.path.display()))?;
        Ok(())
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.tags.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }
}

/// Read every note under `notes_dir`, sorted by category then title.
///
/// Notes missing from the ledger are tagged through `tagger` when one is given; a failed or
/// declined tagging call leaves the note with empty tags and nothing is recorded for it.
#[inline]
pub fn load_notes(notes_dir: &Path, tagger: Option<&GenerationClient>) -> Result<Vec<Note>> {
    let mut ledger = TagLedger::load(notes_dir.join(TAGS_FILE))?;
    let mut notes = Vec::new();

    for category_dir in sorted_entries(notes_dir)? {
        if !category_dir.is_dir() {
            continue;
        }
        let category = file_name(&category_dir);

        for file in sorted_entries(&category_dir)? {
            if !file.is_file() || file.extension().is_none_or(|ext| ext != "md") {
                continue;
            }

            let title = file
                .file_stem()
                .map(|stem| stem.to_string_lossy().into_owned())
                .unwrap_or_default();
            let raw = fs::read_to_string(&file)
                .with_context(|| format!("Failed to read note: {}", file.display()))?;
            let text = raw.trim_matches('\n').to_string();

            let tags = match (ledger.get(&title), tagger) {
                (Some(tags), _) => tags.to_string(),
                (None, Some(client)) => {
                    info!("New note found, creating tags for {}", file.display());
                    let tags = tag_note(client, &text);
                    if !tags.is_empty() {
                        ledger.record(&title, &tags)?;
                    }
                    tags
                }
                (None, None) => String::new(),
            };

            notes.push(Note {
                category: category.clone(),
                title,
                text,
                tags,
            });
        }
    }

    debug!("Loaded {} notes from {}", notes.len(), notes_dir.display());
    Ok(notes)
}

fn tag_note(client: &GenerationClient, text: &str) -> String {
    let prompt = format!("{}\n\n{}", TAGGING_REQUEST, text);
    let result = client.simple_prompt(&prompt, Some(TAGGING_SYSTEM), None, 1.0);
    or_fallback(result, "").trim().to_string()
}

fn sorted_entries(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut paths = fs::read_dir(dir)
        .with_context(|| format!("Failed to read directory: {}", dir.display()))?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<std::io::Result<Vec<_>>>()?;
    paths.sort();
    Ok(paths)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}
