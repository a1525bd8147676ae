
use console::style;
use dialoguer::Confirm;
use tracing::{info, warn};

/// Approximate price of sending one request
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CostEstimate {
    pub tokens: usize,
    pub cost: f64,
}

/// Estimate token count using a simple heuristic
#[inline]
pub fn estimate_token_count(text: &str) -> usize {
    // Rough heuristic: 1 token ≈ 0.75 words for English text
    let word_count = text.split_whitespace().count();
    let punct_count = text.chars().filter(|c| c.is_ascii_punctuation()).count();

    (punct_count as f64).mul_add(0.1, word_count as f64 / 0.75) as usize
}

/// `tokens / 1000 × cost_per_1k_tokens`
#[inline]
pub fn estimate_cost(text: &str, cost_per_1k_tokens: f64) -> CostEstimate {
    let tokens = estimate_token_count(text);
    CostEstimate {
        tokens,
        cost: tokens as f64 / 1000.0 * cost_per_1k_tokens,
    }
}

/// Decides whether a request may be sent given its estimated cost
pub trait CostGate: Send + Sync {
    fn should_proceed(&self, estimate: &CostEstimate) -> bool;
}

impl<F> CostGate for F
where
    F: Fn(&CostEstimate) -> bool + Send + Sync,
{
    #[inline]
    fn should_proceed(&self, estimate: &CostEstimate) -> bool {
        self(estimate)
    }
}

/// Accepts every request, logging the estimate
#[derive(Debug, Clone, Copy, Default)]
pub struct AutoAccept;

impl CostGate for AutoAccept {
    #[inline]
    fn should_proceed(&self, estimate: &CostEstimate) -> bool {
        info!(
            "Sending request: ~{} tokens, estimated cost ${:.4}",
            estimate.tokens, estimate.cost
        );
        true
    }
}

/// Asks on the terminal before every request
#[derive(Debug, Clone, Copy, Default)]
pub struct ConfirmPrompt;

impl CostGate for ConfirmPrompt {
    #[inline]
    fn should_proceed(&self, estimate: &CostEstimate) -> bool {
        let prompt = format!(
            "Prompt is ~{} tokens and will cost about {} to send. Continue?",
            estimate.tokens,
            style(format!("${:.4}", estimate.cost)).yellow()
        );

        match Confirm::new().with_prompt(prompt).default(false).interact() {
            Ok(accepted) => accepted,
            Err(e) => {
                warn!("Could not read cost confirmation, declining: {}", e);
                false
            }
        }
    }
}
