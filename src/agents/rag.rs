//! Retrieval-augmented synthesis agent over an abstract retrieval contract.
//!
//! The concrete vector store and embeddings are out of scope — only the
//! [`RetrievalClient`] contract and a [`MockRetrievalClient`] for tests ship
//! here.

use crate::agent::Agent;
use crate::context::ContextManager;
use crate::llm::{ChatMessage, CompletionOptions, LlmAdapter};
use crate::types::{AgentInput, AgentOutput, RetrievedChunk};
use async_trait::async_trait;
use std::sync::Arc;

/// Abstract retrieval backend a RAG agent searches over.
#[async_trait]
pub trait RetrievalClient: Send + Sync {
    async fn search(&self, query: &str, top_k: usize, knowledge_base_id: Option<&str>) -> Vec<RetrievedChunk>;
}

/// Programmable `RetrievalClient` for tests: returns a fixed set of chunks
/// regardless of query, recording the last query issued.
pub struct MockRetrievalClient {
    chunks: Vec<RetrievedChunk>,
}

impl MockRetrievalClient {
    pub fn new(chunks: Vec<RetrievedChunk>) -> Self {
        Self { chunks }
    }
}

#[async_trait]
impl RetrievalClient for MockRetrievalClient {
    async fn search(&self, _query: &str, top_k: usize, _knowledge_base_id: Option<&str>) -> Vec<RetrievedChunk> {
        self.chunks.iter().take(top_k).cloned().collect()
    }
}

const PROMPT_TEMPLATE: &str = "You are an AI Medical Information Specialist. Answer the user's \
clinical query based solely on the provided medical context. If the context is insufficient, \
state that clearly. Cite the source id for each piece of information used.";

#[derive(Debug, Clone)]
pub struct RagAgentInput {
    pub query: String,
    pub knowledge_base_id: Option<String>,
    pub top_k: usize,
}

impl RagAgentInput {
    pub fn new(query: impl Into<String>) -> Self {
        Self { query: query.into(), knowledge_base_id: None, top_k: 3 }
    }
}

#[derive(Debug, Clone)]
pub struct RagAgentOutput {
    pub response: String,
    pub sources: Vec<String>,
    pub error_message: Option<String>,
}

pub struct RagAgent {
    llm: Arc<dyn LlmAdapter>,
    retrieval: Arc<dyn RetrievalClient>,
    model_name: String,
}

impl RagAgent {
    pub fn new(llm: Arc<dyn LlmAdapter>, retrieval: Arc<dyn RetrievalClient>) -> Self {
        Self { llm, retrieval, model_name: "gpt-4-turbo".to_string() }
    }

    pub async fn run(&self, input: RagAgentInput) -> RagAgentOutput {
        let chunks = self.retrieval.search(&input.query, input.top_k, input.knowledge_base_id.as_deref()).await;

        let sources: Vec<String> = chunks.iter().map(|c| c.source.clone()).collect();
        let context_str = if chunks.is_empty() {
            "No specific context was retrieved from the knowledge base for this query.".to_string()
        } else {
            chunks
                .iter()
                .map(|c| format!("Source ID: {}\nContent: {}", c.source, c.content))
                .collect::<Vec<_>>()
                .join("\n\n")
        };

        let prompt = format!(
            "{PROMPT_TEMPLATE}\n\nUser Query: \"{}\"\n\nProvided Medical Context:\n-------------------------\n{}\n-------------------------\n\nAnswer:",
            input.query, context_str
        );

        let response = self
            .llm
            .chat_completion(&[ChatMessage::user(prompt)], &self.model_name, &CompletionOptions::default().with_temperature(0.3))
            .await;

        match response.error {
            Some(err) => RagAgentOutput {
                response: format!("Error: LLM processing failed. Details: {err}"),
                sources: Vec::new(),
                error_message: Some(err),
            },
            None => {
                let content = response.content.unwrap_or_default();
                if content.is_empty() {
                    RagAgentOutput {
                        response: "Failed to synthesize answer: LLM returned empty content.".to_string(),
                        sources,
                        error_message: None,
                    }
                } else {
                    RagAgentOutput { response: content, sources, error_message: None }
                }
            }
        }
    }
}

#[async_trait]
impl Agent for RagAgent {
    fn name(&self) -> &str {
        "MedicalRAGAgent"
    }

    fn description(&self) -> &str {
        "Retrieves information from medical knowledge bases using RAG and synthesizes answers, citing sources."
    }

    async fn run(&self, input: AgentInput, _ctx: &ContextManager) -> AgentOutput {
        let output = RagAgent::run(self, RagAgentInput::new(input.query)).await;
        match output.error_message {
            Some(err) => AgentOutput::error(err),
            None => AgentOutput::ok(output.response),
        }
    }
}
