//! HTTP client for escalating a divergent report pair to the external
//! arbiter service.

use crate::types::{ArbiterRequest, ArbiterResponse, ArbiterVerdict};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const ARBITER_URL_ENV: &str = "ARBITER_O3_URL";
const DEFAULT_ARBITER_URL: &str = "http://localhost:8089/arbiter/v1/review";

pub struct ArbiterClient {
    client: reqwest::Client,
    url: String,
}

impl ArbiterClient {
    pub fn new() -> Self {
        let url = std::env::var(ARBITER_URL_ENV).unwrap_or_else(|_| DEFAULT_ARBITER_URL.to_string());
        Self::with_url(url)
    }

    pub fn with_url(url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(5))
                .build()
                .expect("reqwest client builder should never fail with these options"),
            url: url.into(),
        }
    }

    /// Posts the request to the arbiter service. Never returns an `Err` —
    /// any transport failure, timeout, non-2xx status, or cancellation is
    /// folded into an `ArbiterResponse` carrying `ArbiterVerdict::Fallback`,
    /// matching how callers in the orchestrator treat arbiter unavailability
    /// as data rather than an exceptional condition.
    ///
    /// `cancellation` is raced against the in-flight HTTP call so a cancelled
    /// orchestrator doesn't wait out a slow or hung arbiter request.
    pub async fn send(&self, request: &ArbiterRequest, cancellation: &CancellationToken) -> ArbiterResponse {
        let call = self.client.post(&self.url).json(request).send();

        let result = tokio::select! {
            result = call => result,
            _ = cancellation.cancelled() => return fallback("Arbiter call cancelled".to_string()),
        };

        match result {
            Ok(response) => match response.error_for_status() {
                Ok(response) => {
                    let parse = response.json::<ArbiterResponse>();
                    tokio::select! {
                        parsed = parse => match parsed {
                            Ok(parsed) => parsed,
                            Err(err) => fallback(format!("Arbiter unreachable: {err}")),
                        },
                        _ = cancellation.cancelled() => fallback("Arbiter call cancelled".to_string()),
                    }
                }
                Err(err) => fallback(format!("Arbiter unreachable: {err}")),
            },
            Err(err) => fallback(format!("Arbiter unreachable: {err}")),
        }
    }
}

impl Default for ArbiterClient {
    fn default() -> Self {
        Self::new()
    }
}

fn fallback(rationale: String) -> ArbiterResponse {
    ArbiterResponse { verdict: ArbiterVerdict::Fallback, rationale }
}

/// Convenience free function used by the orchestrator's retry-wrapped
/// escalation path: builds a default `ArbiterClient` from the environment
/// for each call.
pub async fn send_to_arbiter(request: &ArbiterRequest, cancellation: &CancellationToken) -> ArbiterResponse {
    ArbiterClient::new().send(request, cancellation).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn parses_a_successful_arbiter_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/arbiter/v1/review"))
            .respond_with(ResponseTemplate::new(202).set_body_json(serde_json::json!({
                "verdict": "b",
                "rationale": "Viral picture, antibiotics contraindicated."
            })))
            .mount(&server)
            .await;

        let client = ArbiterClient::with_url(format!("{}/arbiter/v1/review", server.uri()));
        let request = ArbiterRequest {
            report_a: "start antibiotics".to_string(),
            report_b: "avoid antibiotics".to_string(),
            justification: "conflicting antibiotic recommendation".to_string(),
            session_id: None,
        };
        let cancellation = CancellationToken::new();

        let response = client.send(&request, &cancellation).await;

        assert_eq!(response.verdict, ArbiterVerdict::B);
        assert_eq!(response.rationale, "Viral picture, antibiotics contraindicated.");
    }

    #[tokio::test]
    async fn unreachable_service_yields_fallback_verdict() {
        let client = ArbiterClient::with_url("http://127.0.0.1:1/arbiter/v1/review");
        let request = ArbiterRequest {
            report_a: "a".to_string(),
            report_b: "b".to_string(),
            justification: "j".to_string(),
            session_id: None,
        };
        let cancellation = CancellationToken::new();

        let response = client.send(&request, &cancellation).await;

        assert_eq!(response.verdict, ArbiterVerdict::Fallback);
        assert!(response.rationale.starts_with("Arbiter unreachable:"));
    }

    #[tokio::test]
    async fn server_error_status_yields_fallback_verdict() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/arbiter/v1/review"))
            .respond_with(ResponseTemplate::new(500).set_body_json(serde_json::json!({"detail": "boom"})))
            .mount(&server)
            .await;

        let client = ArbiterClient::with_url(format!("{}/arbiter/v1/review", server.uri()));
        let request = ArbiterRequest {
            report_a: "a".to_string(),
            report_b: "b".to_string(),
            justification: "j".to_string(),
            session_id: None,
        };
        let cancellation = CancellationToken::new();

        let response = client.send(&request, &cancellation).await;

        assert_eq!(response.verdict, ArbiterVerdict::Fallback);
        assert!(response.rationale.starts_with("Arbiter unreachable:"));
    }

    #[tokio::test]
    async fn cancellation_before_response_yields_fallback_verdict() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/arbiter/v1/review"))
            .respond_with(ResponseTemplate::new(202).set_body_json(serde_json::json!({
                "verdict": "a",
                "rationale": "should never be observed"
            })).set_delay(Duration::from_secs(3600)))
            .mount(&server)
            .await;

        let client = ArbiterClient::with_url(format!("{}/arbiter/v1/review", server.uri()));
        let request = ArbiterRequest {
            report_a: "a".to_string(),
            report_b: "b".to_string(),
            justification: "j".to_string(),
            session_id: None,
        };
        let cancellation = CancellationToken::new();
        cancellation.cancel();

        let response = client.send(&request, &cancellation).await;

        assert_eq!(response.verdict, ArbiterVerdict::Fallback);
        assert_eq!(response.rationale, "Arbiter call cancelled");
    }
}
