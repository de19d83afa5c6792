//! # Dual-LLM Specialist Review Example
//!
//! Demonstrates the divergence-review-and-arbiter protocol standalone,
//! without a configured flow: two specialist reports go in, a single
//! unified recommendation (or an arbiter-escalated verdict) comes out.
//!
//! # Usage
//! ```bash
//! RUST_LOG=info cargo run --example dual_llm_review
//! ```

use medflowai::{ArbiterClient, InMemoryContextStore, MockLlmAdapter, OrchestratorPrincipal, ToolRegistry, UnifiedLlmResponse};
use std::collections::HashMap;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    println!("=== MedflowAI Dual-LLM Review Example ===\n");
    let started_at = chrono::Utc::now();

    // In production this would be a real provider adapter; for the demo we
    // program the judge's response directly.
    let judge = Arc::new(MockLlmAdapter::new(vec![UnifiedLlmResponse::text(
        r#"{"status":"divergent","justification":"One report starts antibiotics, the other calls for a viral picture."}"#,
    )]));

    let mut adapters: HashMap<String, Arc<dyn medflowai::LlmAdapter>> = HashMap::new();
    adapters.insert("judge".to_string(), judge);

    let orchestrator = OrchestratorPrincipal::new(
        adapters,
        HashMap::new(),
        ToolRegistry::new(),
        Arc::new(InMemoryContextStore::new()),
        None,
        None,
        None,
    )?;

    let report_a = "Start amoxicillin 500mg TID for suspected bacterial sinusitis.";
    let report_b = "Symptoms are consistent with a viral upper respiratory infection; antibiotics are not indicated.";

    let output = orchestrator.process_specialists(report_a, report_b, None).await;

    println!("Report A: {report_a}");
    println!("Report B: {report_b}");
    println!("Outcome:  {}", output.response);
    if let Some(err) = &output.error_message {
        println!("Error:    {err}");
    }
    println!("\n(elapsed: {}ms)", (chrono::Utc::now() - started_at).num_milliseconds());

    // Touched here only to keep the demo's wiring obvious — the arbiter
    // client the orchestrator used internally is constructed from the
    // `ARBITER_O3_URL` environment variable the same way.
    let _ = ArbiterClient::new();

    Ok(())
}
