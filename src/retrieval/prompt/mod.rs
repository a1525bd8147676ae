
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;

use super::packer::pack_context;
use super::ranker::RankedItem;
use crate::config::BudgetScope;

const QUESTION_PREFIX: &str = "Answer the question based on the context below.\n\nContext:\n";

const GENERATOR_PREFIX: &str = "Generate new content for this campaign world based on the existing lore below.

IMPORTANT INSTRUCTIONS:
- Ensure consistency with established lore, themes, and tone
- Reference specific existing elements when relevant
- Maintain the world's established rules and constraints
- Avoid contradicting established facts
- Create interconnections with existing content
- Match the writing style of existing entries

EXISTING LORE CONTEXT:
";

const QUALITY_GUIDELINES: &str = "QUALITY GUIDELINES:
1. Integrate smoothly with the most relevant existing elements
2. Maintain consistent tone and style with existing lore
3. Create meaningful connections and references
4. Avoid contradicting established facts
5. Match the depth and detail of existing entries
";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PromptMode {
    /// Answer from the retrieved context
    Question,
    /// Create new lore consistent with the retrieved context
    Generator,
}

impl PromptMode {
    #[inline]
    pub fn prefix(self) -> &'static str {
        match self {
            Self::Question => QUESTION_PREFIX,
            Self::Generator => GENERATOR_PREFIX,
        }
    }

    #[inline]
    pub fn suffix(self, request: &str) -> String {
        match self {
            Self::Question => format!("\n\nQuestion: {}\nAnswer:", request),
            Self::Generator => format!("\n\nGENERATION REQUEST: {}\n\nYOUR RESPONSE:", request),
        }
    }

    /// Characters the template adds around the packed context
    #[inline]
    pub fn frame_len(self, request: &str) -> usize {
        self.prefix().chars().count() + self.suffix(request).chars().count()
    }
}

/// Everything the generation client needs for one request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssembledPrompt {
    pub mode: PromptMode,
    /// System instruction supplied by the caller
    pub instruction: String,
    pub packed_context: String,
    pub user_request: String,
}

impl AssembledPrompt {
    /// Pack `items` under `budget` and frame them for `mode`.
    ///
    /// With [`BudgetScope::Prompt`] the template frame is charged against the budget first,
    /// so a non-empty context keeps the whole rendered prompt under `budget`.
    #[inline]
    pub fn build(
        mode: PromptMode,
        instruction: &str,
        user_request: &str,
        items: &[RankedItem],
        budget: usize,
        scope: BudgetScope,
    ) -> Self {
        let context_budget = match scope {
            BudgetScope::Context => budget,
            BudgetScope::Prompt => budget.saturating_sub(mode.frame_len(user_request)),
        };

        Self {
            mode,
            instruction: instruction.to_string(),
            packed_context: pack_context(items, context_budget),
            user_request: user_request.to_string(),
        }
    }

    /// `prefix + packed_context + suffix`
    #[inline]
    pub fn render(&self) -> String {
        let mut prompt = String::from(self.mode.prefix());
        prompt.push_str(&self.packed_context);
        prompt.push_str(&self.mode.suffix(&self.user_request));
        prompt
    }
}

/// System instruction for generator mode: the caller's instruction, the most relevant
/// existing titles with their scores, and fixed quality guidelines
#[inline]
pub fn enhance_instruction(instruction: &str, relevant: &[&RankedItem]) -> String {
    let mut enhanced = String::from(instruction);
    enhanced.push_str("\n\n");

    if !relevant.is_empty() {
        enhanced.push_str("MOST RELEVANT EXISTING ELEMENTS:\n");
        for item in relevant {
            let _ = writeln!(
                enhanced,
                "- {} (relevance: {:.2})",
                item.title, item.relevance
            );
        }
        enhanced.push('\n');
    }

    enhanced.push_str(QUALITY_GUIDELINES);
    enhanced
}
