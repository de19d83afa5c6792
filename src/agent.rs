//! Agent contract: a typed `run(input, ctx) → output` unit backed by an
//! LLM adapter and an optional tool registry.

use crate::context::ContextManager;
use crate::llm::{ChatMessage, MessageRole};
use crate::types::{AgentInput, AgentOutput, Turn};
use async_trait::async_trait;

/// A typed unit with a declared prompt template that invokes an LLM (and
/// optionally tools) to produce a structured result.
#[async_trait]
pub trait Agent: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;

    async fn run(&self, input: AgentInput, ctx: &ContextManager) -> AgentOutput;
}

/// Default prompt assembly: `[system=prompt_template] + last-N history
/// turns + user message containing either `input.query` or the input
/// serialized as JSON`. Agents with richer prompting needs build their own
/// message list instead of calling this.
pub async fn default_prepare_prompt(
    prompt_template: &str,
    input: &AgentInput,
    ctx: &ContextManager,
    history_limit: usize,
) -> Vec<ChatMessage> {
    let mut messages = vec![ChatMessage::system(prompt_template)];

    for turn in ctx.get_history(Some(history_limit)).await {
        messages.push(turn_to_chat_message(&turn));
    }

    let user_content = if !input.query.is_empty() {
        input.query.clone()
    } else {
        serde_json::to_string(input).unwrap_or_default()
    };
    messages.push(ChatMessage::user(format!("Input: {user_content}")));

    messages
}

fn turn_to_chat_message(turn: &Turn) -> ChatMessage {
    match turn.role {
        crate::types::Role::System => ChatMessage::system(turn.content.clone()),
        crate::types::Role::User => ChatMessage::user(turn.content.clone()),
        crate::types::Role::Assistant => ChatMessage::assistant(turn.content.clone()),
        crate::types::Role::Tool => ChatMessage {
            role: MessageRole::Tool,
            content: turn.content.clone(),
            tool_calls: None,
            tool_call_id: None,
            name: None,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::InMemoryContextStore;
    use std::sync::Arc;

    #[tokio::test]
    async fn default_prompt_uses_query_and_recent_history() {
        let store: Arc<dyn crate::context::ContextStore> = Arc::new(InMemoryContextStore::new());
        let ctx = ContextManager::new(store, "s1").unwrap();
        ctx.add_message(crate::types::Role::User, "earlier turn").await;

        let input = AgentInput::new("what is the dosage?");
        let messages = default_prepare_prompt("You are a clinician.", &input, &ctx, 5).await;

        assert_eq!(messages[0].content, "You are a clinician.");
        assert_eq!(messages[1].content, "earlier turn");
        assert!(messages.last().unwrap().content.contains("what is the dosage?"));
    }

    #[tokio::test]
    async fn default_prompt_serializes_input_without_query() {
        let store: Arc<dyn crate::context::ContextStore> = Arc::new(InMemoryContextStore::new());
        let ctx = ContextManager::new(store, "s2").unwrap();

        let input = AgentInput { query: String::new(), session_id: None, user_id: None, metadata: None };
        let messages = default_prepare_prompt("sys", &input, &ctx, 5).await;

        assert!(messages.last().unwrap().content.starts_with("Input: {"));
    }
}
