
use serde::Serialize;

use crate::index::RetrievalResult;

pub const DEFAULT_RELEVANCE_THRESHOLD: f32 = 0.7;
pub const DEFAULT_TOP_RELEVANT_CAP: usize = 5;

/// A retrieved entry scored by similarity, higher is more similar
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedItem {
    pub title: String,
    pub tags: String,
    pub text: String,
    pub relevance: f32,
}

impl From<RetrievalResult> for RankedItem {
    #[inline]
    fn from(result: RetrievalResult) -> Self {
        Self {
            title: result.title,
            tags: result.tags,
            text: result.text,
            relevance: 1.0 - result.distance,
        }
    }
}

/// Score results as `1 - distance` and order them by descending relevance.
///
/// The sort is stable, so ties keep the order the index returned them in.
#[inline]
pub fn rank(results: Vec<RetrievalResult>) -> Vec<RankedItem> {
    let mut items: Vec<RankedItem> = results.into_iter().map(RankedItem::from).collect();
    items.sort_by(|a, b| b.relevance.total_cmp(&a.relevance));
    items
}

/// The first `limit` items whose relevance is strictly above `threshold`
#[inline]
pub fn top_relevant(items: &[RankedItem], threshold: f32, limit: usize) -> Vec<&RankedItem> {
    items
        .iter()
        .filter(|item| item.relevance > threshold)
        .take(limit)
        .collect()
}
