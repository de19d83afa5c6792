use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A single turn in a conversation history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

impl Turn {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self { role, content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// A tool invocation requested by an LLM, in function-calling wire format.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String, // always "function"
    pub function: ToolCallFunction,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallFunction {
    pub name: String,
    /// Stringified JSON object matching the target tool's input schema.
    pub arguments: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UsageInfo {
    pub prompt: u32,
    pub completion: u32,
    pub total: u32,
}

/// Provider-independent LLM response shape.
///
/// Exactly one of `content`/`tool_calls`/`error` is semantically meaningful
/// in a given response. Callers must check `error` first.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UnifiedLlmResponse {
    pub content: Option<String>,
    pub tool_calls: Option<Vec<ToolCall>>,
    pub finish_reason: Option<String>,
    pub usage: Option<UsageInfo>,
    pub model: Option<String>,
    pub raw: Option<serde_json::Value>,
    pub error: Option<String>,
}

impl UnifiedLlmResponse {
    pub fn text(content: impl Into<String>) -> Self {
        Self { content: Some(content.into()), ..Default::default() }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self { error: Some(message.into()), ..Default::default() }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// Generic agent input envelope. Specialized agents extend this with
/// additional typed fields by embedding it or defining their own struct that
/// mirrors these base fields (matching `GenericInput`'s role in the source
/// library this is distilled from).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentInput {
    pub query: String,
    pub session_id: Option<String>,
    pub user_id: Option<String>,
    pub metadata: Option<HashMap<String, serde_json::Value>>,
}

impl AgentInput {
    pub fn new(query: impl Into<String>) -> Self {
        Self { query: query.into(), session_id: None, user_id: None, metadata: None }
    }

    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }
}

/// Generic agent output envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentOutput {
    pub response: String,
    pub confidence_score: Option<f64>,
    pub error_message: Option<String>,
    pub debug_info: Option<HashMap<String, serde_json::Value>>,
}

impl AgentOutput {
    pub fn ok(response: impl Into<String>) -> Self {
        Self { response: response.into(), confidence_score: None, error_message: None, debug_info: None }
    }

    pub fn error(message: impl Into<String>) -> Self {
        let message = message.into();
        Self { response: String::new(), confidence_score: None, error_message: Some(message), debug_info: None }
    }
}

/// Status produced by the divergence review agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DivergenceStatus {
    Equivalent,
    Divergent,
}

/// Output of the divergence review agent.
///
/// `response` is always a clone of `justification` when present — the
/// review agent's underlying prompt only ever produces one piece of free
/// text, and the source library surfaces it under both field names. Read
/// either; they agree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DivergenceVerdict {
    pub status: Option<DivergenceStatus>,
    pub justification: Option<String>,
    pub response: Option<String>,
    pub error: Option<String>,
}

impl DivergenceVerdict {
    pub fn ok(status: DivergenceStatus, justification: impl Into<String>) -> Self {
        let justification = justification.into();
        Self {
            status: Some(status),
            response: Some(justification.clone()),
            justification: Some(justification),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self { status: None, justification: None, response: None, error: Some(error.into()) }
    }
}

/// Verdict returned by the arbiter service, or synthesized locally when the
/// arbiter is unreachable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArbiterVerdict {
    A,
    B,
    Combine,
    CannotDecide,
    /// Not present in every variant of the enum this was distilled from —
    /// made canonical here since the arbiter client always needs a verdict
    /// to synthesize when the HTTP call itself fails.
    Fallback,
}

impl std::fmt::Display for ArbiterVerdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ArbiterVerdict::A => "a",
            ArbiterVerdict::B => "b",
            ArbiterVerdict::Combine => "combine",
            ArbiterVerdict::CannotDecide => "cannot_decide",
            ArbiterVerdict::Fallback => "fallback",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArbiterResponse {
    pub verdict: ArbiterVerdict,
    pub rationale: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArbiterRequest {
    pub report_a: String,
    pub report_b: String,
    pub justification: String,
    pub session_id: Option<String>,
}

/// A retrieved passage handed to the RAG agent by a `RetrievalClient`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievedChunk {
    pub source: String,
    pub content: String,
    pub score: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arbiter_verdict_wire_format_matches_the_external_contract() {
        assert_eq!(serde_json::to_string(&ArbiterVerdict::A).unwrap(), "\"a\"");
        assert_eq!(serde_json::to_string(&ArbiterVerdict::B).unwrap(), "\"b\"");
        assert_eq!(serde_json::to_string(&ArbiterVerdict::Combine).unwrap(), "\"combine\"");
        assert_eq!(serde_json::to_string(&ArbiterVerdict::CannotDecide).unwrap(), "\"cannot_decide\"");
        assert_eq!(serde_json::to_string(&ArbiterVerdict::Fallback).unwrap(), "\"fallback\"");

        let parsed: ArbiterVerdict = serde_json::from_str("\"cannot_decide\"").unwrap();
        assert_eq!(parsed, ArbiterVerdict::CannotDecide);
    }
}
