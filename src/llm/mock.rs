use super::{ChatMessage, CompletionOptions, LlmAdapter};
use crate::types::UnifiedLlmResponse;
use async_trait::async_trait;
use std::sync::Mutex;

/// Programmable `LlmAdapter` for tests: returns a queue of canned responses
/// in order, recording every call for later assertions.
pub struct MockLlmAdapter {
    responses: Mutex<Vec<UnifiedLlmResponse>>,
    calls: Mutex<Vec<(String, Vec<ChatMessage>)>>,
}

impl MockLlmAdapter {
    pub fn new(responses: Vec<UnifiedLlmResponse>) -> Self {
        Self { responses: Mutex::new(responses), calls: Mutex::new(Vec::new()) }
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn model_for_call(&self, n: usize) -> Option<String> {
        self.calls.lock().unwrap().get(n).map(|(model, _)| model.clone())
    }
}

#[async_trait]
impl LlmAdapter for MockLlmAdapter {
    async fn chat_completion(
        &self,
        messages: &[ChatMessage],
        model: &str,
        _opts: &CompletionOptions,
    ) -> UnifiedLlmResponse {
        self.calls.lock().unwrap().push((model.to_string(), messages.to_vec()));

        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            return UnifiedLlmResponse::error("MockLlmAdapter: no more programmed responses");
        }
        responses.remove(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn replays_responses_in_order_and_records_calls() {
        let mock = MockLlmAdapter::new(vec![
            UnifiedLlmResponse::text("first"),
            UnifiedLlmResponse::text("second"),
        ]);

        let r1 = mock.chat_completion(&[ChatMessage::user("a")], "gpt-x", &CompletionOptions::default()).await;
        let r2 = mock.chat_completion(&[ChatMessage::user("b")], "gpt-x", &CompletionOptions::default()).await;

        assert_eq!(r1.content.unwrap(), "first");
        assert_eq!(r2.content.unwrap(), "second");
        assert_eq!(mock.call_count(), 2);
        assert_eq!(mock.model_for_call(0).unwrap(), "gpt-x");
    }

    #[tokio::test]
    async fn errors_once_exhausted() {
        let mock = MockLlmAdapter::new(vec![]);
        let r = mock.chat_completion(&[ChatMessage::user("a")], "gpt-x", &CompletionOptions::default()).await;
        assert!(r.is_error());
    }
}
