//! The arbiter HTTP service itself: a small axum app exposing
//! `POST /arbiter/v1/review`, backed by an `LlmAdapter` that judges the
//! two specialist reports.

use crate::llm::{ChatMessage, CompletionOptions, LlmAdapter};
use crate::types::{ArbiterRequest, ArbiterResponse, ArbiterVerdict};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde::Deserialize;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

const SYSTEM_PROMPT: &str = "You are a senior clinical judge. Given two specialist reports and the \
reason they were flagged as divergent, decide which one should prevail, or whether they should be \
combined, or whether no decision can be made. Respond strictly as JSON: \
{\"verdict\": \"a\"|\"b\"|\"combine\"|\"cannot_decide\", \"rationale\": \"<string>\"}.";

#[derive(Clone)]
pub struct ArbiterState {
    pub llm: Arc<dyn LlmAdapter>,
    pub model_name: String,
}

impl ArbiterState {
    pub fn new(llm: Arc<dyn LlmAdapter>) -> Self {
        Self { llm, model_name: "gpt-4o-mini".to_string() }
    }
}

pub fn arbiter_router(state: ArbiterState) -> Router {
    Router::new()
        .route("/arbiter/v1/review", post(review_reports))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Deserialize)]
struct RawVerdict {
    verdict: String,
    #[serde(default)]
    rationale: String,
}

async fn review_reports(State(state): State<ArbiterState>, Json(payload): Json<ArbiterRequest>) -> Response {
    match compare_reports(&state, &payload).await {
        Ok(response) => (StatusCode::ACCEPTED, Json(response)).into_response(),
        Err(detail) => (StatusCode::INTERNAL_SERVER_ERROR, Json(serde_json::json!({ "detail": detail }))).into_response(),
    }
}

async fn compare_reports(state: &ArbiterState, request: &ArbiterRequest) -> Result<ArbiterResponse, String> {
    let user_prompt = format!(
        "REPORT A:\n{}\n\nREPORT B:\n{}\n\nREASON FLAGGED DIVERGENT:\n{}\n",
        request.report_a, request.report_b, request.justification
    );
    let messages = [ChatMessage::system(SYSTEM_PROMPT), ChatMessage::user(user_prompt)];
    let opts = CompletionOptions::default().with_temperature(0.2);

    let response = state.llm.chat_completion(&messages, &state.model_name, &opts).await;

    if let Some(err) = response.error {
        return Ok(ArbiterResponse { verdict: ArbiterVerdict::CannotDecide, rationale: format!("LLM error: {err}") });
    }

    let raw = response.content.unwrap_or_default();
    match serde_json::from_str::<RawVerdict>(raw.trim()) {
        Ok(parsed) => {
            let verdict = match parsed.verdict.as_str() {
                "a" => ArbiterVerdict::A,
                "b" => ArbiterVerdict::B,
                "combine" => ArbiterVerdict::Combine,
                _ => ArbiterVerdict::CannotDecide,
            };
            let rationale = if parsed.rationale.is_empty() { "No rationale provided.".to_string() } else { parsed.rationale };
            Ok(ArbiterResponse { verdict, rationale })
        }
        Err(_) => Ok(ArbiterResponse { verdict: ArbiterVerdict::CannotDecide, rationale: raw }),
    }
}
