// Retrieval module
// Ranking neighbours, packing them under a budget, and framing the prompt

pub mod packer;
pub mod prompt;
pub mod ranker;

pub use packer::{SEPARATOR, pack_context, render_snippet};
pub use prompt::{AssembledPrompt, PromptMode, enhance_instruction};
pub use ranker::{RankedItem, rank, top_relevant};
