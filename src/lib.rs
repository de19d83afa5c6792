pub mod agent;
pub mod agents;
pub mod arbiter;
pub mod config;
pub mod context;
pub mod error;
pub mod llm;
pub mod orchestrator;
pub mod retry;
pub mod tools;
pub mod types;

pub use agent::Agent;
pub use agents::{DivergenceReviewAgent, DivergenceReviewInput, MockRetrievalClient, RagAgent, RagAgentInput, RagAgentOutput, RetrievalClient};
pub use arbiter::{arbiter_router, send_to_arbiter, ArbiterClient, ArbiterState};
pub use config::{load_orchestration_config, resolve_config_root, OnError, OrchestrationConfig, Step};
pub use context::{ContextManager, ContextStore, InMemoryContextStore};
pub use error::{OrchestratorError, Result};
pub use llm::{ChatMessage, CompletionOptions, LlmAdapter, MessageRole, MockLlmAdapter, ToolChoice};
pub use orchestrator::OrchestratorPrincipal;
pub use retry::{retry, retry_always, RetryConfig};
pub use tools::{Tool, ToolError, ToolRegistry};
pub use types::{
    AgentInput, AgentOutput, ArbiterRequest, ArbiterResponse, ArbiterVerdict, DivergenceStatus, DivergenceVerdict, RetrievedChunk,
    Role, Turn, UnifiedLlmResponse, UsageInfo,
};
