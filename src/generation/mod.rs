// Generation module
// Chat completion against an OpenAI-compatible endpoint, behind a cost gate


pub mod cost;

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::{GenerationConfig, api_key_from_env};
use crate::retrieval::ranker::{DEFAULT_RELEVANCE_THRESHOLD, DEFAULT_TOP_RELEVANT_CAP};
use crate::retrieval::{AssembledPrompt, PromptMode, RankedItem, enhance_instruction, top_relevant};
use crate::{LoreError, Result};

pub use cost::{AutoAccept, ConfirmPrompt, CostEstimate, CostGate, estimate_cost, estimate_token_count};

/// Text reported to the user when a request is declined at the cost gate
pub const DECLINED_MESSAGE: &str = "Declined Charges";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    #[inline]
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    #[inline]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

/// One entry of the provider's model listing
#[derive(Debug, Clone, Deserialize)]
pub struct ChatModelInfo {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub context_length: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct ModelsResponse {
    #[serde(default)]
    data: Vec<ChatModelInfo>,
}

/// Outcome of a generation call that reached the cost gate
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    Text(String),
    /// The gate refused; nothing was sent
    Declined,
}

impl Completion {
    #[inline]
    pub fn is_declined(&self) -> bool {
        matches!(self, Self::Declined)
    }

    /// Generated text, or [`DECLINED_MESSAGE`]
    #[inline]
    pub fn into_text(self) -> String {
        match self {
            Self::Text(text) => text,
            Self::Declined => DECLINED_MESSAGE.to_string(),
        }
    }
}

/// Replace a failed or declined completion with `fallback`.
///
/// The client never substitutes text on its own; callers that prefer a default over an
/// error opt in here.
#[inline]
pub fn or_fallback(result: Result<Completion>, fallback: impl Into<String>) -> String {
    match result {
        Ok(Completion::Text(text)) => text,
        Ok(Completion::Declined) => fallback.into(),
        Err(e) => {
            warn!("Generation failed, using fallback: {}", e);
            fallback.into()
        }
    }
}

/// Pick the gate configured for this session
#[inline]
pub fn gate_from_config(config: &GenerationConfig) -> Box<dyn CostGate> {
    if config.auto_accept_cost {
        Box::new(AutoAccept)
    } else {
        Box::new(ConfirmPrompt)
    }
}

pub struct GenerationClient {
    endpoint: String,
    models_endpoint: String,
    api_key: String,
    model: String,
    site_url: String,
    site_name: String,
    question_temperature: f32,
    generator_temperature: f32,
    max_tokens: Option<u32>,
    cost_per_1k_tokens: f64,
    relevance_threshold: f32,
    top_relevant_cap: usize,
    agent: ureq::Agent,
    gate: Box<dyn CostGate>,
}

impl GenerationClient {
    /// Reads the API key from the environment variable named in `config`.
    ///
    /// A missing key fails here, before any request is attempted.
    #[inline]
    pub fn new(config: &GenerationConfig, gate: Box<dyn CostGate>) -> Result<Self> {
        let api_key = api_key_from_env(&config.api_key_env)?;
        Ok(Self::with_api_key(config, api_key, gate))
    }

    #[inline]
    pub fn with_api_key(config: &GenerationConfig, api_key: String, gate: Box<dyn CostGate>) -> Self {
        // Non-2xx bodies are read and reported rather than turned into bare status errors
        let agent = ureq::Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(config.timeout_secs)))
            .http_status_as_error(false)
            .build()
            .into();

        let base_url = config.base_url.trim_end_matches('/');
        Self {
            endpoint: format!("{}/chat/completions", base_url),
            models_endpoint: format!("{}/models", base_url),
            api_key,
            model: config.model.clone(),
            site_url: config.site_url.clone(),
            site_name: config.site_name.clone(),
            question_temperature: config.question_temperature,
            generator_temperature: config.generator_temperature,
            max_tokens: config.max_tokens,
            cost_per_1k_tokens: config.cost_per_1k_tokens,
            relevance_threshold: DEFAULT_RELEVANCE_THRESHOLD,
            top_relevant_cap: DEFAULT_TOP_RELEVANT_CAP,
            agent,
            gate,
        }
    }

    /// Threshold and cap used to pick the titles listed in generator instructions
    #[inline]
    #[must_use]
    pub fn with_relevance(mut self, threshold: f32, cap: usize) -> Self {
        self.relevance_threshold = threshold;
        self.top_relevant_cap = cap;
        self
    }

    #[inline]
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Check that `model`, or the configured model, is offered by the provider
    #[inline]
    pub fn validate_model(&self, model: Option<&str>) -> Result<()> {
        let model = model.unwrap_or(&self.model);
        debug!("Validating chat model: {}", model);

        let models = self.list_models()?;

        if models.iter().any(|m| m.id == model) {
            debug!("Chat model {} is available", model);
            Ok(())
        } else {
            warn!("Chat model {} not found among {} models", model, models.len());
            Err(LoreError::Config(format!(
                "Model '{}' is not offered by {}",
                model, self.models_endpoint
            )))
        }
    }

    /// List the models the provider offers
    #[inline]
    pub fn list_models(&self) -> Result<Vec<ChatModelInfo>> {
        debug!("Fetching available chat models from {}", self.models_endpoint);

        let mut response = self
            .agent
            .get(self.models_endpoint.as_str())
            .header("Authorization", format!("Bearer {}", self.api_key))
            .call()
            .map_err(|e| LoreError::GenerationFailed {
                status: None,
                body: e.to_string(),
            })?;

        let status = response.status().as_u16();
        let body = response
            .body_mut()
            .read_to_string()
            .map_err(|e| LoreError::GenerationFailed {
                status: Some(status),
                body: format!("Failed to read response body: {}", e),
            })?;

        if !(200..300).contains(&status) {
            return Err(LoreError::GenerationFailed {
                status: Some(status),
                body,
            });
        }

        let models: ModelsResponse =
            serde_json::from_str(&body).map_err(|e| LoreError::GenerationFailed {
                status: Some(status),
                body: format!("Failed to parse models response: {}", e),
            })?;

        debug!("Found {} chat models", models.data.len());
        Ok(models.data)
    }

    /// System instruction (enhanced in generator mode) followed by the rendered prompt
    #[inline]
    pub fn build_messages(&self, prompt: &AssembledPrompt, ranked: &[RankedItem]) -> Vec<ChatMessage> {
        let system = match prompt.mode {
            PromptMode::Question => prompt.instruction.clone(),
            PromptMode::Generator => {
                let relevant = top_relevant(ranked, self.relevance_threshold, self.top_relevant_cap);
                enhance_instruction(&prompt.instruction, &relevant)
            }
        };

        vec![ChatMessage::system(system), ChatMessage::user(prompt.render())]
    }

    /// Send an assembled prompt, subject to the cost gate
    #[inline]
    pub fn complete(
        &self,
        prompt: &AssembledPrompt,
        ranked: &[RankedItem],
        model_override: Option<&str>,
    ) -> Result<Completion> {
        let temperature = match prompt.mode {
            PromptMode::Question => self.question_temperature,
            PromptMode::Generator => self.generator_temperature,
        };
        let messages = self.build_messages(prompt, ranked);
        self.send(&messages, model_override.unwrap_or(&self.model), temperature)
    }

    /// Single-turn request with an optional system message
    #[inline]
    pub fn simple_prompt(
        &self,
        prompt: &str,
        system: Option<&str>,
        model: Option<&str>,
        temperature: f32,
    ) -> Result<Completion> {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = system {
            messages.push(ChatMessage::system(system));
        }
        messages.push(ChatMessage::user(prompt));

        self.send(&messages, model.unwrap_or(&self.model), temperature)
    }

    /// Estimated price of sending `messages`
    #[inline]
    pub fn estimate(&self, messages: &[ChatMessage]) -> CostEstimate {
        let full_text: String = messages.iter().map(|m| m.content.as_str()).collect();
        estimate_cost(&full_text, self.cost_per_1k_tokens)
    }

    fn send(&self, messages: &[ChatMessage], model: &str, temperature: f32) -> Result<Completion> {
        let estimate = self.estimate(messages);
        if !self.gate.should_proceed(&estimate) {
            info!("Request declined at the cost gate (~{} tokens)", estimate.tokens);
            return Ok(Completion::Declined);
        }

        let request_json = serde_json::to_string(&ChatRequest {
            model,
            messages,
            temperature,
            max_tokens: self.max_tokens,
        })
        .map_err(|e| LoreError::Other(e.into()))?;

        debug!("Sending chat completion to {} with model {}", self.endpoint, model);

        let mut response = self
            .agent
            .post(self.endpoint.as_str())
            .header("Content-Type", "application/json")
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("HTTP-Referer", self.site_url.as_str())
            .header("X-Title", self.site_name.as_str())
            .send(&request_json)
            .map_err(|e| LoreError::GenerationFailed {
                status: None,
                body: e.to_string(),
            })?;

        let status = response.status().as_u16();
        let body = response
            .body_mut()
            .read_to_string()
            .map_err(|e| LoreError::GenerationFailed {
                status: Some(status),
                body: format!("Failed to read response body: {}", e),
            })?;

        if !(200..300).contains(&status) {
            return Err(LoreError::GenerationFailed {
                status: Some(status),
                body,
            });
        }

        let parsed: ChatResponse = match serde_json::from_str(&body) {
            Ok(parsed) => parsed,
            Err(_) => {
                return Err(LoreError::GenerationFailed {
                    status: Some(status),
                    body,
                });
            }
        };

        match parsed.choices.into_iter().next() {
            Some(choice) => Ok(Completion::Text(choice.message.content)),
            None => Err(LoreError::GenerationFailed {
                status: Some(status),
                body,
            }),
        }
    }
}
