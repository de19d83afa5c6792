//! YAML-backed, validated orchestration flow configuration.

use crate::error::{OrchestratorError, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OnError {
    Retry,
    Skip,
    Abort,
}

impl Default for OnError {
    fn default() -> Self {
        OnError::Retry
    }
}

/// One step in the orchestration flow. Parallel steps may only contain
/// `Agent`/`Tool` leaves — no nested `parallel`.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Step {
    Agent {
        name: String,
        #[serde(default)]
        on_error: OnError,
        condition: Option<String>,
    },
    Tool {
        name: String,
        #[serde(default)]
        on_error: OnError,
        condition: Option<String>,
    },
    Parallel {
        agents: Vec<Step>,
        condition: Option<String>,
    },
}

impl Step {
    fn condition(&self) -> Option<&str> {
        match self {
            Step::Agent { condition, .. } | Step::Tool { condition, .. } => condition.as_deref(),
            Step::Parallel { condition, .. } => condition.as_deref(),
        }
    }

    fn validate(&self) -> Result<()> {
        match self {
            Step::Agent { name, .. } | Step::Tool { name, .. } => {
                if name.trim().is_empty() {
                    return Err(OrchestratorError::Config("agent/tool step has an empty name".to_string()));
                }
            }
            Step::Parallel { agents, .. } => {
                if agents.is_empty() {
                    return Err(OrchestratorError::Config("parallel step has no leaves".to_string()));
                }
                for leaf in agents {
                    match leaf {
                        Step::Agent { .. } | Step::Tool { .. } => leaf.validate()?,
                        Step::Parallel { .. } => {
                            return Err(OrchestratorError::Config("parallel steps cannot nest".to_string()));
                        }
                    }
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct OrchestrationConfig {
    pub id: String,
    pub description: String,
    pub flow: Vec<Step>,
    #[serde(default)]
    pub llm_overrides: HashMap<String, HashMap<String, serde_json::Value>>,
    pub env: Option<Vec<String>>,
    pub version: Option<String>,
}

impl OrchestrationConfig {
    fn validate(&self) -> Result<()> {
        let valid_id = !self.id.is_empty()
            && self.id.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-');
        if !valid_id {
            return Err(OrchestratorError::Config(format!("config id '{}' must match [a-z0-9_-]+", self.id)));
        }

        if let Some(version) = &self.version {
            if semver::Version::parse(version).is_err() {
                return Err(OrchestratorError::Config(format!("config version '{version}' is not valid semver")));
            }
        }

        if self.flow.is_empty() {
            return Err(OrchestratorError::Config("`flow` must contain at least one step".to_string()));
        }
        for step in &self.flow {
            step.validate()?;
        }

        Ok(())
    }

    /// Returns the condition expression for a step, evaluated against `vars`
    /// as a Jinja-style `{{ key }}` template. A falsy rendered result (empty
    /// string, `"false"`, `"0"`) suppresses the step.
    pub fn should_run(step: &Step, vars: &HashMap<String, serde_json::Value>) -> bool {
        match step.condition() {
            None => true,
            Some(expr) => render_condition(expr, vars),
        }
    }

    pub fn llm_override_for(&self, agent_name: &str) -> Option<&HashMap<String, serde_json::Value>> {
        self.llm_overrides.get(agent_name)
    }
}

/// Minimal `{{ key }}` substitution against the flow-context variable map,
/// mirroring the subset of Jinja2 templating the source orchestrator relies
/// on for step conditions (a single variable reference, optionally negated
/// with `not `).
fn render_condition(expr: &str, vars: &HashMap<String, serde_json::Value>) -> bool {
    let trimmed = expr.trim();
    let (negate, inner) = match trimmed.strip_prefix("not ") {
        Some(rest) => (true, rest.trim()),
        None => (false, trimmed),
    };

    let key = inner.trim_start_matches("{{").trim_end_matches("}}").trim();
    let truthy = match vars.get(key) {
        Some(serde_json::Value::Bool(b)) => *b,
        Some(serde_json::Value::String(s)) => !s.is_empty() && s != "false" && s != "0",
        Some(serde_json::Value::Null) => false,
        Some(_) => true,
        None => false,
    };

    if negate {
        !truthy
    } else {
        truthy
    }
}

const ORCHESTRATION_ID_ENV: &str = "ORCHESTRATION_ID";
const DEFAULT_ORCHESTRATION_ID: &str = "dual_llm_v1";
const SKIP_ENV_VALIDATION: &str = "SKIP_ORCH_ENV_VALIDATION";

/// Walks parent directories of `start` looking for a `config/orchestrations`
/// directory. This is the canonical resolution strategy — a fixed-depth
/// offset from the binary's location is fragile across build layouts.
pub fn resolve_config_root(start: &Path) -> Option<PathBuf> {
    let mut dir = Some(start);
    while let Some(d) = dir {
        let candidate = d.join("config").join("orchestrations");
        if candidate.is_dir() {
            return Some(candidate);
        }
        dir = d.parent();
    }
    None
}

fn default_config_root() -> Result<PathBuf> {
    let exe_dir = std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(Path::to_path_buf));

    if let Some(dir) = exe_dir.as_deref() {
        if let Some(root) = resolve_config_root(dir) {
            return Ok(root);
        }
    }

    let cwd = std::env::current_dir()
        .map_err(|e| OrchestratorError::Config(format!("could not determine current directory: {e}")))?;
    resolve_config_root(&cwd)
        .ok_or_else(|| OrchestratorError::Config("could not locate a config/orchestrations directory".to_string()))
}

/// Loads and validates an orchestration config by id, selected in order:
/// explicit argument, `ORCHESTRATION_ID` env var, then `"dual_llm_v1"`.
pub fn load_orchestration_config(config_id: Option<&str>) -> Result<OrchestrationConfig> {
    let root = default_config_root()?;
    load_orchestration_config_from(&root, config_id)
}

pub fn load_orchestration_config_from(root: &Path, config_id: Option<&str>) -> Result<OrchestrationConfig> {
    let selected_id = config_id
        .map(str::to_string)
        .or_else(|| std::env::var(ORCHESTRATION_ID_ENV).ok())
        .unwrap_or_else(|| DEFAULT_ORCHESTRATION_ID.to_string());

    let file_path = root.join(format!("{selected_id}.yaml"));
    let raw = std::fs::read_to_string(&file_path).map_err(|e| {
        OrchestratorError::Config(format!("orchestration config '{selected_id}' not found at {}: {e}", file_path.display()))
    })?;

    let config: OrchestrationConfig = serde_yaml::from_str(&raw)
        .map_err(|e| OrchestratorError::Config(format!("invalid orchestration config '{selected_id}': {e}")))?;

    config.validate()?;

    if let Some(required) = &config.env {
        let skip = std::env::var(SKIP_ENV_VALIDATION).is_ok();
        if !skip {
            let missing: Vec<&String> = required.iter().filter(|var| std::env::var(var).is_err()).collect();
            if !missing.is_empty() {
                let missing_list = missing.iter().map(|s| s.as_str()).collect::<Vec<_>>().join(", ");
                return Err(OrchestratorError::Config(format!(
                    "missing required environment variables for orchestration '{selected_id}': {missing_list}"
                )));
            }
        }
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(dir: &Path, id: &str, body: &str) {
        let orch_dir = dir.join("config").join("orchestrations");
        std::fs::create_dir_all(&orch_dir).unwrap();
        let mut f = std::fs::File::create(orch_dir.join(format!("{id}.yaml"))).unwrap();
        f.write_all(body.as_bytes()).unwrap();
    }

    #[test]
    fn loads_a_valid_config() {
        let dir = tempfile::tempdir().unwrap();
        write_config(
            dir.path(),
            "dual_llm_v1",
            r#"
id: dual_llm_v1
description: test
flow:
  - type: agent
    name: SpecialistA
  - type: parallel
    agents:
      - type: agent
        name: A1
      - type: tool
        name: T1
"#,
        );

        let config = load_orchestration_config_from(dir.path(), Some("dual_llm_v1")).unwrap();
        assert_eq!(config.id, "dual_llm_v1");
        assert_eq!(config.flow.len(), 2);
    }

    #[test]
    fn rejects_nested_parallel() {
        let dir = tempfile::tempdir().unwrap();
        write_config(
            dir.path(),
            "bad",
            r#"
id: bad
description: test
flow:
  - type: parallel
    agents:
      - type: parallel
        agents:
          - type: agent
            name: A1
"#,
        );

        let err = load_orchestration_config_from(dir.path(), Some("bad")).unwrap_err();
        assert!(matches!(err, OrchestratorError::Config(_)));
    }

    #[test]
    fn rejects_bad_id() {
        let dir = tempfile::tempdir().unwrap();
        write_config(
            dir.path(),
            "Bad_ID",
            r#"
id: Bad_ID
description: test
flow:
  - type: agent
    name: A
"#,
        );

        let err = load_orchestration_config_from(dir.path(), Some("Bad_ID")).unwrap_err();
        assert!(matches!(err, OrchestratorError::Config(_)));
    }

    #[test]
    fn missing_env_var_fails_unless_skipped() {
        let dir = tempfile::tempdir().unwrap();
        write_config(
            dir.path(),
            "needs_env",
            r#"
id: needs_env
description: test
env:
  - SOME_TOTALLY_UNSET_VAR_FOR_TEST
flow:
  - type: agent
    name: A
"#,
        );

        std::env::remove_var("SOME_TOTALLY_UNSET_VAR_FOR_TEST");
        let err = load_orchestration_config_from(dir.path(), Some("needs_env")).unwrap_err();
        assert!(matches!(err, OrchestratorError::Config(_)));

        std::env::set_var(SKIP_ENV_VALIDATION, "1");
        let config = load_orchestration_config_from(dir.path(), Some("needs_env"));
        std::env::remove_var(SKIP_ENV_VALIDATION);
        assert!(config.is_ok());
    }

    #[test]
    fn condition_rendering_reads_flow_context() {
        let mut vars = HashMap::new();
        vars.insert("diverged".to_string(), serde_json::json!(true));

        assert!(render_condition("{{ diverged }}", &vars));
        assert!(!render_condition("not {{ diverged }}", &vars));
        assert!(!render_condition("{{ missing }}", &vars));
    }
}
