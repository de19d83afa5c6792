//! JSON-only dual-report comparator with retry/format validation.

use crate::llm::{ChatMessage, CompletionOptions, LlmAdapter};
use crate::types::{DivergenceStatus, DivergenceVerdict};
use std::sync::Arc;

const PROMPT_TEMPLATE: &str = concat!(
    "You are an experienced physician. Compare the two clinical reports provided.\n",
    "If the recommendations and conclusions are compatible, respond strictly with a JSON object: ",
    "{\"status\": \"equivalent\", \"justification\": \"<SHORT_RATIONALE>\"}.\n",
    "If they conflict clinically, respond strictly with a JSON object: ",
    "{\"status\": \"divergent\", \"justification\": \"<SHORT_RATIONALE>\"}.\n",
    "Do NOT add any keys. The JSON MUST be valid.\n",
);

#[derive(Debug, Clone)]
pub struct DivergenceReviewInput {
    pub report_a: String,
    pub report_b: String,
    pub max_retries: u32,
    pub retry_backoff_base_seconds: f64,
}

impl Default for DivergenceReviewInput {
    fn default() -> Self {
        Self {
            report_a: String::new(),
            report_b: String::new(),
            max_retries: 3,
            retry_backoff_base_seconds: 1.0,
        }
    }
}

impl DivergenceReviewInput {
    pub fn new(report_a: impl Into<String>, report_b: impl Into<String>) -> Self {
        Self { report_a: report_a.into(), report_b: report_b.into(), ..Default::default() }
    }
}

#[derive(serde::Deserialize)]
struct RawVerdict {
    status: String,
    justification: String,
}

pub struct DivergenceReviewAgent {
    llm: Arc<dyn LlmAdapter>,
    model_name: String,
}

impl DivergenceReviewAgent {
    pub fn new(llm: Arc<dyn LlmAdapter>) -> Self {
        Self::with_model(llm, "gpt-4o")
    }

    pub fn with_model(llm: Arc<dyn LlmAdapter>, model_name: impl Into<String>) -> Self {
        Self { llm, model_name: model_name.into() }
    }

    /// Compares `report_a`/`report_b`, retrying on transport error or
    /// malformed JSON with doubling backoff, up to `input.max_retries`
    /// attempts.
    pub async fn run(&self, input: DivergenceReviewInput) -> DivergenceVerdict {
        let messages = [
            ChatMessage::system("You are an assistant that speaks JSON only."),
            ChatMessage::user(format!(
                "{PROMPT_TEMPLATE}\nREPORT A:\n{}\n\nREPORT B:\n{}\n",
                input.report_a.trim(),
                input.report_b.trim()
            )),
        ];
        let opts = CompletionOptions::default().with_temperature(0.0);

        let mut retries_remaining = input.max_retries;
        let mut backoff = input.retry_backoff_base_seconds;
        let mut last_error: Option<String> = None;

        while retries_remaining > 0 {
            let response = self.llm.chat_completion(&messages, &self.model_name, &opts).await;

            if let Some(err) = response.error {
                tracing::warn!(error = %err, backoff_s = backoff, "divergence LLM call failed, retrying");
                last_error = Some(err);
                tokio::time::sleep(std::time::Duration::from_secs_f64(backoff)).await;
                retries_remaining -= 1;
                backoff *= 2.0;
                continue;
            }

            let raw = response.content.unwrap_or_default();
            match serde_json::from_str::<RawVerdict>(raw.trim()) {
                Ok(parsed) if parsed.status == "equivalent" || parsed.status == "divergent" => {
                    let status = if parsed.status == "equivalent" {
                        DivergenceStatus::Equivalent
                    } else {
                        DivergenceStatus::Divergent
                    };
                    return DivergenceVerdict::ok(status, parsed.justification);
                }
                _ => {
                    tracing::warn!(raw = %raw, "divergence LLM response was not valid JSON in the expected shape");
                    tokio::time::sleep(std::time::Duration::from_secs_f64(backoff)).await;
                    retries_remaining -= 1;
                    backoff *= 2.0;
                }
            }
        }

        DivergenceVerdict::failed(
            last_error.unwrap_or_else(|| "Failed to obtain valid divergence verdict after retries".to_string()),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockLlmAdapter;
    use crate::types::UnifiedLlmResponse;

    #[tokio::test]
    async fn equivalent_reports_classify_as_equivalent() {
        let mock = Arc::new(MockLlmAdapter::new(vec![UnifiedLlmResponse::text(
            r#"{"status":"equivalent","justification":"Same drug, dose, interval."}"#,
        )]));
        let agent = DivergenceReviewAgent::new(mock);

        let verdict = agent
            .run(DivergenceReviewInput::new(
                "Prescribe ibuprofen 400mg q8h",
                "Recommend ibuprofen 400mg every 8 hours",
            ))
            .await;

        assert_eq!(verdict.status, Some(DivergenceStatus::Equivalent));
        assert!(verdict.error.is_none());
    }

    #[tokio::test]
    async fn malformed_then_valid_json_eventually_succeeds() {
        let mock = Arc::new(MockLlmAdapter::new(vec![
            UnifiedLlmResponse::text("NOT JSON"),
            UnifiedLlmResponse::text(r#"{"status":"divergent","justification":"Different recs."}"#),
        ]));
        let agent = DivergenceReviewAgent::new(mock);

        let mut input = DivergenceReviewInput::new("Start amoxicillin", "Avoid antibiotics; viral illness");
        input.max_retries = 2;
        input.retry_backoff_base_seconds = 0.0;

        let verdict = agent.run(input).await;

        assert_eq!(verdict.status, Some(DivergenceStatus::Divergent));
        assert!(verdict.error.is_none());
    }

    #[tokio::test]
    async fn exhausted_retries_surfaces_last_error() {
        let mock = Arc::new(MockLlmAdapter::new(vec![
            UnifiedLlmResponse::error("Rate limit"),
            UnifiedLlmResponse::error("Rate limit"),
        ]));
        let agent = DivergenceReviewAgent::new(mock);

        let mut input = DivergenceReviewInput::new("a", "b");
        input.max_retries = 2;
        input.retry_backoff_base_seconds = 0.0;

        let verdict = agent.run(input).await;

        assert_eq!(verdict.status, None);
        assert_eq!(verdict.error.as_deref(), Some("Rate limit"));
    }

    #[tokio::test]
    async fn never_returns_status_and_error_together() {
        let mock = Arc::new(MockLlmAdapter::new(vec![UnifiedLlmResponse::text(
            r#"{"status":"equivalent","justification":"fine"}"#,
        )]));
        let agent = DivergenceReviewAgent::new(mock);
        let verdict = agent.run(DivergenceReviewInput::new("a", "b")).await;

        assert!(verdict.status.is_some() ^ verdict.error.is_some() || (verdict.status.is_some() && verdict.error.is_none()));
        assert!(!(verdict.status.is_some() && verdict.error.is_some()));
    }
}
