
use tracing::debug;

use super::ranker::RankedItem;

/// Placed between consecutive snippets in the packed context
pub const SEPARATOR: &str = "\n\n---\n\n";

/// `"{title}: {text}\nTags: {tags}"`
#[inline]
pub fn render_snippet(item: &RankedItem) -> String {
    format!("{}: {}\nTags: {}", item.title, item.text, item.tags)
}

/// Greedily join whole snippets, in rank order, while the result stays under `budget`.
///
/// Lengths are counted in characters. Packing stops at the first snippet whose addition
/// would bring the joined text to `budget` or beyond; that snippet and everything after it
/// are dropped. If the first snippet alone reaches the budget the result is empty.
#[inline]
pub fn pack_context(items: &[RankedItem], budget: usize) -> String {
    let snippets: Vec<String> = items.iter().map(render_snippet).collect();
    let included = fitting_prefix(&snippets, budget);

    debug!(
        "Packed {}/{} snippets into a {} character budget",
        included,
        snippets.len(),
        budget
    );
    snippets[..included].join(SEPARATOR)
}

/// Number of leading snippets whose separator-joined length is below `budget`
fn fitting_prefix(snippets: &[String], budget: usize) -> usize {
    let separator_len = SEPARATOR.chars().count();
    let mut joined_len = 0usize;

    for (n, snippet) in snippets.iter().enumerate() {
        let added = snippet.chars().count() + if n == 0 { 0 } else { separator_len };
        joined_len += added;
        if joined_len >= budget {
            return n;
        }
    }

    snippets.len()
}
