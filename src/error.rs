use thiserror::Error;

/// Unified error type surfaced by orchestrator-level operations.
///
/// Provider/transport failures are deliberately *not* variants here — they
/// are carried as data inside `UnifiedLLMResponse.error` or converted to a
/// `fallback` verdict at the arbiter boundary, never thrown across those
/// contracts. This enum covers the failures that are genuinely exceptional:
/// bad configuration, a missing tool, a malformed step.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("config error: {0}")]
    Config(String),

    #[error("tool '{0}' not found in registry")]
    ToolNotFound(String),

    #[error("invalid arguments for tool '{name}': {reason}")]
    ToolBadArgs { name: String, reason: String },

    #[error("step '{step}' failed: {source}")]
    StepExecution { step: String, source: String },

    #[error("LLM response was not valid JSON in the expected shape: {0}")]
    LlmFormat(String),

    #[error("session error: {0}")]
    Session(String),

    #[error("build error: {0}")]
    Build(String),

    #[error("cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, OrchestratorError>;
