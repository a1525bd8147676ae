// Corpus index module
// Stores one vector per lore entry and answers nearest-neighbour queries


pub mod lance;
pub mod memory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::Result;
use crate::config::{Config, IndexBackend};
use crate::embeddings::Embedding;

pub use lance::LanceIndex;
pub use memory::MemoryIndex;

/// One lore note as stored in the index
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorpusEntry {
    /// ASCII-only key derived from the title, see [`sanitize_id`]
    pub id: String,
    pub title: String,
    pub text: String,
    pub tags: String,
}

impl CorpusEntry {
    #[inline]
    pub fn new(title: impl Into<String>, text: impl Into<String>, tags: impl Into<String>) -> Self {
        let title = title.into();
        Self {
            id: sanitize_id(&title),
            title,
            text: text.into(),
            tags: tags.into(),
        }
    }

    /// Text handed to the embedding provider for this entry
    #[inline]
    pub fn document(&self) -> String {
        format!(
            "NAME: {}\nENTRY: {}\nTAGS: {}",
            self.title, self.text, self.tags
        )
    }
}

/// One neighbour returned by [`CorpusIndex::query`]
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievalResult {
    pub title: String,
    pub tags: String,
    pub text: String,
    /// Cosine distance, nominally in `[0, 2]`
    pub distance: f32,
}

/// Strip every non-ASCII character from a title.
///
/// Characters are removed, not replaced, so two titles differing only in non-ASCII
/// characters share an id and overwrite each other on upsert.
#[inline]
pub fn sanitize_id(title: &str) -> String {
    title.chars().filter(char::is_ascii).collect()
}

#[async_trait]
pub trait CorpusIndex: Send + Sync {
    /// Write or overwrite entries by id; `vectors[i]` belongs to `entries[i]`
    async fn upsert(&self, entries: &[CorpusEntry], vectors: &[Embedding]) -> Result<()>;

    /// Up to `top_k` nearest entries, ascending by distance
    async fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<RetrievalResult>>;

    async fn count(&self) -> Result<usize>;
}

/// Open the index backend selected in configuration
#[inline]
pub async fn index_from_config(config: &Config) -> Result<Arc<dyn CorpusIndex>> {
    let index: Arc<dyn CorpusIndex> = match config.index.backend {
        IndexBackend::Lancedb => Arc::new(
            LanceIndex::open(config.vector_database_path(), &config.index.table).await?,
        ),
        IndexBackend::Memory => Arc::new(MemoryIndex::new()),
    };
    Ok(index)
}

pub(crate) fn check_parallel(entries: &[CorpusEntry], vectors: &[Embedding]) -> Result<()> {
    if entries.len() != vectors.len() {
        return Err(crate::LoreError::Index(format!(
            "Got {} entries but {} vectors",
            entries.len(),
            vectors.len()
        )));
    }
    Ok(())
}
