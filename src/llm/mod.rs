//! Provider-neutral LLM adapter contract.
//!
//! Concrete vendor adapters (OpenAI, Anthropic, Gemini, ...) are not part of
//! this crate — only the contract and a [`MockLlmAdapter`] for tests ship
//! here. Real adapters live behind this trait in the binary that wires a
//! provider's SDK or HTTP client in.

mod mock;

pub use mock::MockLlmAdapter;

use crate::types::{ToolCall, UnifiedLlmResponse};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub content: String,
    pub tool_calls: Option<Vec<ToolCall>>,
    pub tool_call_id: Option<String>,
    pub name: Option<String>,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: MessageRole::System, content: content.into(), tool_calls: None, tool_call_id: None, name: None }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: MessageRole::User, content: content.into(), tool_calls: None, tool_call_id: None, name: None }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: MessageRole::Assistant, content: content.into(), tool_calls: None, tool_call_id: None, name: None }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
    Tool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ToolChoice {
    None,
    Auto,
    Function { function: ToolChoiceFunction },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolChoiceFunction {
    pub name: String,
}

/// Options recognized by every adapter. Providers ignore fields they don't
/// support rather than erroring.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompletionOptions {
    pub temperature: Option<f64>,
    pub top_p: Option<f64>,
    pub top_k: Option<u32>,
    pub max_tokens: Option<u32>,
    pub stop: Option<Vec<String>>,
    pub tools: Option<Vec<serde_json::Value>>,
    pub tool_choice: Option<ToolChoice>,
    pub safety_settings: Option<serde_json::Value>,
}

impl CompletionOptions {
    pub fn with_temperature(mut self, t: f64) -> Self {
        self.temperature = Some(t);
        self
    }
}

/// The single interface between agents and any LLM provider.
///
/// # Contract
/// - Must be `Send + Sync` (used behind `Arc<dyn LlmAdapter>`).
/// - Never returns `Err` for provider-level failures — those are mapped
///   into `UnifiedLlmResponse.error`. Only unexpected programming errors
///   (e.g. a poisoned lock) may panic.
/// - Message ordering is preserved; the system prompt, if any, is the
///   first system-role message.
/// - Chat-only providers must synthesize a single user turn for
///   `completion`.
#[async_trait]
pub trait LlmAdapter: Send + Sync {
    async fn chat_completion(
        &self,
        messages: &[ChatMessage],
        model: &str,
        opts: &CompletionOptions,
    ) -> UnifiedLlmResponse;

    async fn completion(
        &self,
        prompt: &str,
        model: &str,
        opts: &CompletionOptions,
    ) -> UnifiedLlmResponse {
        self.chat_completion(&[ChatMessage::user(prompt)], model, opts).await
    }
}
