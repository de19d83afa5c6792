//! The flow engine: drives a configured DAG of agent/tool/parallel steps,
//! or a single default agent when no flow is configured, and hosts the
//! divergence-review/arbiter-escalation protocol.

use crate::agent::Agent;
use crate::agents::divergence::{DivergenceReviewAgent, DivergenceReviewInput};
use crate::arbiter::client::ArbiterClient;
use crate::config::{OnError, OrchestrationConfig, Step};
use crate::context::{ContextManager, ContextStore};
use crate::error::{OrchestratorError, Result};
use crate::llm::LlmAdapter;
use crate::retry::{retry, RetryConfig};
use crate::tools::ToolRegistry;
use crate::types::{AgentInput, AgentOutput, ArbiterRequest, DivergenceStatus, DivergenceVerdict, Role};
use futures::future::join_all;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

pub struct OrchestratorPrincipal {
    llm_adapter_map: HashMap<String, Arc<dyn LlmAdapter>>,
    agent_map: HashMap<String, Arc<dyn Agent>>,
    tool_registry: ToolRegistry,
    context_store: Arc<dyn ContextStore>,
    orchestration_config: Option<OrchestrationConfig>,
    default_llm_adapter_name: Option<String>,
    default_agent_name: Option<String>,
    /// Reused by `review_divergence` instead of going through `agent_map`:
    /// `Agent::run` only returns a free-text `AgentOutput`, which cannot
    /// carry the structured `status` a divergence verdict needs, so a
    /// concretely-typed slot is kept alongside the generic registry.
    divergence_agent: Option<Arc<DivergenceReviewAgent>>,
    arbiter: ArbiterClient,
    flow_context: Mutex<HashMap<String, serde_json::Value>>,
    /// Propagated down into the flow loop and each parallel branch; callers
    /// cancel in-flight work by holding a clone (via `cancellation_token`)
    /// and calling `.cancel()` on it.
    cancellation: CancellationToken,
}

impl OrchestratorPrincipal {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        llm_adapter_map: HashMap<String, Arc<dyn LlmAdapter>>,
        agent_map: HashMap<String, Arc<dyn Agent>>,
        tool_registry: ToolRegistry,
        context_store: Arc<dyn ContextStore>,
        orchestration_config: Option<OrchestrationConfig>,
        default_llm_adapter_name: Option<String>,
        default_agent_name: Option<String>,
    ) -> Result<Self> {
        if let Some(name) = &default_llm_adapter_name {
            if !llm_adapter_map.contains_key(name) {
                return Err(OrchestratorError::Build(format!("default LLM adapter '{name}' is not in llm_adapter_map")));
            }
        }
        if let Some(name) = &default_agent_name {
            if !agent_map.contains_key(name) {
                return Err(OrchestratorError::Build(format!("default agent '{name}' is not in agent_map")));
            }
        }

        Ok(Self {
            llm_adapter_map,
            agent_map,
            tool_registry,
            context_store,
            orchestration_config,
            default_llm_adapter_name,
            default_agent_name,
            divergence_agent: None,
            arbiter: ArbiterClient::new(),
            flow_context: Mutex::new(HashMap::new()),
            cancellation: CancellationToken::new(),
        })
    }

    /// Registers a concretely-typed `DivergenceReviewAgent` for
    /// `review_divergence` to reuse instead of constructing a fresh one
    /// from the default LLM adapter on every call.
    pub fn with_divergence_agent(mut self, agent: Arc<DivergenceReviewAgent>) -> Self {
        self.divergence_agent = Some(agent);
        self
    }

    /// A clone of this orchestrator's cancellation token. Call `.cancel()`
    /// on it from another task to abort the in-flight flow/parallel
    /// execution at its next step boundary.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation.clone()
    }

    fn context_manager_for(&self, session_id: Option<String>) -> Result<ContextManager> {
        let session_id = match session_id {
            Some(s) if !s.trim().is_empty() => s,
            _ => format!("default_session_{}", Uuid::new_v4()),
        };
        ContextManager::new(self.context_store.clone(), session_id)
    }

    /// Runs the configured flow if one is present, otherwise a single
    /// default agent — exactly one path runs, never both.
    pub async fn process_query(&self, user_query: &str, session_id: Option<String>, target_agent_name: Option<&str>) -> AgentOutput {
        let ctx = match self.context_manager_for(session_id) {
            Ok(ctx) => ctx,
            Err(err) => return AgentOutput::error(err.to_string()),
        };
        ctx.add_message(Role::User, user_query).await;

        let has_flow = self.orchestration_config.as_ref().is_some_and(|c| !c.flow.is_empty());

        let output = if has_flow {
            match self.execute_flow(user_query, &ctx).await {
                Ok(()) => {
                    let last = self.flow_context.lock().await.get("last_output").cloned();
                    match last {
                        Some(value) => AgentOutput::ok(value.as_str().map(str::to_string).unwrap_or_else(|| value.to_string())),
                        None => AgentOutput::ok(""),
                    }
                }
                Err(err) => AgentOutput::error(err.to_string()),
            }
        } else {
            self.run_single_agent(user_query, &ctx, target_agent_name).await
        };

        if output.error_message.is_none() {
            ctx.add_message(Role::Assistant, output.response.clone()).await;
        } else {
            ctx.add_message(Role::Assistant, format!("Error: {}", output.error_message.clone().unwrap_or_default())).await;
        }

        output
    }

    async fn run_single_agent(&self, user_query: &str, ctx: &ContextManager, target_agent_name: Option<&str>) -> AgentOutput {
        let agent_name = target_agent_name
            .map(str::to_string)
            .or_else(|| self.default_agent_name.clone())
            .or_else(|| self.agent_map.keys().next().cloned());

        let Some(agent_name) = agent_name else {
            return AgentOutput {
                response: "Orchestrator has no agents configured.".to_string(),
                confidence_score: None,
                error_message: Some("No agents available.".to_string()),
                debug_info: None,
            };
        };

        let Some(agent) = self.agent_map.get(&agent_name).cloned() else {
            return AgentOutput::error(format!("agent '{agent_name}' not found"));
        };

        let input = AgentInput::new(user_query).with_session(ctx.session_id());
        let config = RetryConfig::new(2);
        let result = retry(config, &self.cancellation, |_: &String| true, || {
            let agent = agent.clone();
            let input = input.clone();
            let ctx = ctx.clone();
            async move {
                let output = agent.run(input, &ctx).await;
                match output.error_message {
                    Some(err) => Err(err),
                    None => Ok(output),
                }
            }
        })
        .await;

        match result {
            Ok(output) => output,
            Err(err) => AgentOutput::error(err),
        }
    }

    pub async fn execute_flow(&self, user_query: &str, ctx: &ContextManager) -> Result<()> {
        let flow = self
            .orchestration_config
            .as_ref()
            .ok_or_else(|| OrchestratorError::Config("no orchestration config loaded".to_string()))?
            .flow
            .clone();

        for step in &flow {
            if self.cancellation.is_cancelled() {
                return Err(OrchestratorError::Cancelled);
            }
            self.execute_step(step, user_query, ctx).await?;
        }
        Ok(())
    }

    async fn execute_step(&self, step: &Step, user_query: &str, ctx: &ContextManager) -> Result<()> {
        {
            let vars = self.flow_context.lock().await;
            if !OrchestrationConfig::should_run(step, &vars) {
                return Ok(());
            }
        }

        match step {
            Step::Agent { .. } | Step::Tool { .. } => self.run_single(step, user_query, ctx).await,
            Step::Parallel { agents, .. } => self.run_parallel(agents, user_query, ctx).await,
        }
    }

    async fn run_single(&self, step: &Step, user_query: &str, ctx: &ContextManager) -> Result<()> {
        match step {
            Step::Agent { name, on_error, .. } => self.run_single_agent_step(name, *on_error, user_query, ctx).await,
            Step::Tool { name, on_error, .. } => self.run_single_tool_step(name, *on_error, user_query, ctx).await,
            Step::Parallel { .. } => unreachable!("run_single is never called with a parallel step"),
        }
    }

    async fn run_single_agent_step(&self, name: &str, on_error: OnError, user_query: &str, ctx: &ContextManager) -> Result<()> {
        let Some(agent) = self.agent_map.get(name).cloned() else {
            return self.apply_on_error(name, on_error, format!("agent '{name}' not found")).await;
        };
        let input = AgentInput::new(user_query).with_session(ctx.session_id());

        let attempt = || {
            let agent = agent.clone();
            let input = input.clone();
            let ctx = ctx.clone();
            async move {
                let output = agent.run(input, &ctx).await;
                match output.error_message {
                    Some(err) => Err(err),
                    None => Ok(output),
                }
            }
        };

        let outcome = match on_error {
            OnError::Retry => retry(RetryConfig::default(), &self.cancellation, |_: &String| true, attempt).await,
            OnError::Skip | OnError::Abort => attempt().await,
        };

        match outcome {
            Ok(output) => {
                self.set_flow_var(format!("{name}_output"), serde_json::Value::String(output.response.clone())).await;
                self.set_flow_var("last_output".to_string(), serde_json::Value::String(output.response)).await;
                Ok(())
            }
            Err(err) => self.apply_on_error(name, on_error, err).await,
        }
    }

    async fn run_single_tool_step(&self, name: &str, on_error: OnError, user_query: &str, ctx: &ContextManager) -> Result<()> {
        let args = serde_json::json!({ "query": user_query, "session_id": ctx.session_id() });

        let attempt = || {
            let args = args.clone();
            async move { self.tool_registry.execute_tool_call(name, args).await.map_err(|e| e.to_string()) }
        };

        let outcome = match on_error {
            OnError::Retry => retry(RetryConfig::default(), &self.cancellation, |_: &String| true, attempt).await,
            OnError::Skip | OnError::Abort => attempt().await,
        };

        match outcome {
            Ok(result) => {
                self.set_flow_var(format!("{name}_output"), serde_json::Value::String(result.clone())).await;
                self.set_flow_var("last_output".to_string(), serde_json::Value::String(result)).await;
                Ok(())
            }
            Err(err) => self.apply_on_error(name, on_error, err).await,
        }
    }

    async fn apply_on_error(&self, step_name: &str, on_error: OnError, reason: String) -> Result<()> {
        match on_error {
            OnError::Skip => Ok(()),
            OnError::Retry | OnError::Abort => Err(OrchestratorError::StepExecution { step: step_name.to_string(), source: reason }),
        }
    }

    async fn run_parallel(&self, steps: &[Step], user_query: &str, ctx: &ContextManager) -> Result<()> {
        if self.cancellation.is_cancelled() {
            return Err(OrchestratorError::Cancelled);
        }
        let futures = steps.iter().map(|step| self.run_single(step, user_query, ctx));
        let results = join_all(futures).await;

        let mut first_error = None;
        for result in results {
            if let Err(err) = result {
                first_error.get_or_insert(err);
            }
        }

        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn set_flow_var(&self, key: String, value: serde_json::Value) {
        self.flow_context.lock().await.insert(key, value);
    }

    fn default_llm_adapter(&self) -> Result<Arc<dyn LlmAdapter>> {
        if let Some(name) = &self.default_llm_adapter_name {
            return self
                .llm_adapter_map
                .get(name)
                .cloned()
                .ok_or_else(|| OrchestratorError::Build(format!("default LLM adapter '{name}' missing")));
        }
        self.llm_adapter_map
            .values()
            .next()
            .cloned()
            .ok_or_else(|| OrchestratorError::Build("no LLM adapters configured".to_string()))
    }

    /// Reuses the registered `DivergenceReviewAgent` if one was set via
    /// `with_divergence_agent`, else constructs one from the default LLM
    /// adapter.
    pub async fn review_divergence(&self, report_a: &str, report_b: &str, session_id: Option<String>) -> DivergenceVerdict {
        let ctx = match self.context_manager_for(session_id) {
            Ok(ctx) => ctx,
            Err(err) => return DivergenceVerdict::failed(err.to_string()),
        };

        let config = RetryConfig::new(2);
        let input = DivergenceReviewInput::new(report_a, report_b);

        let verdict = match &self.divergence_agent {
            Some(agent) => {
                let agent = agent.clone();
                let attempt = || {
                    let agent = agent.clone();
                    let input = input.clone();
                    async move { agent.run(input).await }
                };
                retry_divergence(config, attempt).await
            }
            None => {
                let llm = match self.default_llm_adapter() {
                    Ok(llm) => llm,
                    Err(err) => return DivergenceVerdict::failed(err.to_string()),
                };
                let agent = DivergenceReviewAgent::new(llm);
                let attempt = || {
                    let agent = &agent;
                    let input = input.clone();
                    async move { agent.run(input).await }
                };
                retry_divergence(config, attempt).await
            }
        };

        if let Some(justification) = &verdict.justification {
            ctx.add_message(Role::Assistant, justification.clone()).await;
        }

        verdict
    }

    /// Escalates a divergent pair to the external arbiter and formats the
    /// summary string the rest of the orchestrator surfaces as output.
    pub async fn escalate_to_arbiter(&self, report_a: &str, report_b: &str, divergence: &DivergenceVerdict, session_id: Option<String>) -> AgentOutput {
        let request = ArbiterRequest {
            report_a: report_a.to_string(),
            report_b: report_b.to_string(),
            justification: divergence.justification.clone().unwrap_or_default(),
            session_id,
        };

        // `ArbiterClient::send` already folds every transport failure into a
        // `Fallback` verdict rather than an `Err`, so there is nothing left
        // for the retry utility to act on here — a single call always
        // "succeeds" from the retry loop's point of view.
        let response = self.arbiter.send(&request, &self.cancellation).await;

        let summary = format!("[ARB] Veredicto: {}. Racional: {}", response.verdict, response.rationale);
        AgentOutput::ok(summary)
    }

    /// Runs the full divergence-and-arbiter protocol over a pair of
    /// specialist reports.
    pub async fn process_specialists(&self, report_a: &str, report_b: &str, session_id: Option<String>) -> AgentOutput {
        let divergence = self.review_divergence(report_a, report_b, session_id.clone()).await;

        if let Some(err) = &divergence.error {
            return AgentOutput::error(err.clone());
        }

        match divergence.status {
            Some(DivergenceStatus::Divergent) => self.escalate_to_arbiter(report_a, report_b, &divergence, session_id).await,
            Some(DivergenceStatus::Equivalent) => AgentOutput::ok("Specialist recommendations are equivalent."),
            None => AgentOutput::error("divergence review produced neither a status nor an error".to_string()),
        }
    }
}

async fn retry_divergence<F, Fut>(config: RetryConfig, attempt: F) -> DivergenceVerdict
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = DivergenceVerdict>,
{
    // `DivergenceReviewAgent::run` already implements its own internal
    // backoff/retry against transport and JSON-format failures, so the
    // orchestrator-level wrap here only re-runs on the rare case the agent
    // itself reports exhaustion, once more, to honor the flow-level retry
    // budget.
    let mut attempts_left = config.retries + 1;
    let mut last = DivergenceVerdict::failed("unreachable");
    while attempts_left > 0 {
        last = attempt().await;
        if last.error.is_none() {
            return last;
        }
        attempts_left -= 1;
    }
    last
}
