#[cfg(test)]
mod tests;

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;

use super::{CorpusEntry, CorpusIndex, RetrievalResult, check_parallel};
use crate::embeddings::Embedding;
use crate::{LoreError, Result};

/// Brute-force cosine index held in memory.
///
/// Suitable for tests and corpora of a few thousand notes. Rows keep their first-insertion
/// position, so equal distances come back in insertion order.
#[derive(Debug, Default)]
pub struct MemoryIndex {
    table: RwLock<Table>,
}

#[derive(Debug, Default)]
struct Table {
    rows: Vec<Row>,
    positions: HashMap<String, usize>,
    dimension: Option<usize>,
}

#[derive(Debug)]
struct Row {
    entry: CorpusEntry,
    vector: Embedding,
}

impl MemoryIndex {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Table {
    fn check_dimension(&self, len: usize) -> Result<()> {
        match self.dimension {
            Some(dimension) if dimension != len => Err(LoreError::Index(format!(
                "Vector dimension {} does not match index dimension {}",
                len, dimension
            ))),
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl CorpusIndex for MemoryIndex {
    #[inline]
    async fn upsert(&self, entries: &[CorpusEntry], vectors: &[Embedding]) -> Result<()> {
        check_parallel(entries, vectors)?;
        if entries.is_empty() {
            return Ok(());
        }

        let mut table = self.table.write().await;

        let dimension = table.dimension.unwrap_or(vectors[0].len());
        if let Some(bad) = vectors.iter().find(|v| v.len() != dimension) {
            return Err(LoreError::Index(format!(
                "Vector dimension {} does not match index dimension {}",
                bad.len(),
                dimension
            )));
        }
        table.dimension = Some(dimension);

        for (entry, vector) in entries.iter().zip(vectors) {
            let row = Row {
                entry: entry.clone(),
                vector: vector.clone(),
            };
            match table.positions.get(&entry.id).copied() {
                Some(position) => table.rows[position] = row,
                None => {
                    let position = table.rows.len();
                    table.positions.insert(entry.id.clone(), position);
                    table.rows.push(row);
                }
            }
        }

        debug!("Upserted {} entries into memory index", entries.len());
        Ok(())
    }

    #[inline]
    async fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<RetrievalResult>> {
        let table = self.table.read().await;
        if table.rows.is_empty() || top_k == 0 {
            return Ok(Vec::new());
        }
        table.check_dimension(vector.len())?;

        let mut scored: Vec<(f32, &Row)> = table
            .rows
            .iter()
            .map(|row| (cosine_distance(vector, &row.vector), row))
            .collect();
        scored.sort_by(|a, b| a.0.total_cmp(&b.0));
        scored.truncate(top_k);

        Ok(scored
            .into_iter()
            .map(|(distance, row)| RetrievalResult {
                title: row.entry.title.clone(),
                tags: row.entry.tags.clone(),
                text: row.entry.text.clone(),
                distance,
            })
            .collect())
    }

    #[inline]
    async fn count(&self) -> Result<usize> {
        Ok(self.table.read().await.rows.len())
    }
}

/// `1 - cosine_similarity`; a zero vector is treated as orthogonal to everything
pub(crate) fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (&x, &y) in a.iter().zip(b) {
        let (x, y) = (f64::from(x), f64::from(y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom <= f64::EPSILON {
        return 1.0;
    }
    (1.0 - dot / denom) as f32
}
