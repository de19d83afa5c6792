//! Typed tool invocation with schema validation and LLM-facing schema export.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("tool '{0}' not found in registry")]
    NotFound(String),

    #[error("invalid arguments for tool '{name}': {reason}")]
    BadArgs { name: String, reason: String },

    #[error("tool '{name}' execution failed: {reason}")]
    ExecutionFailed { name: String, reason: String },
}

/// A typed, schema-validated callable exposable to an LLM via
/// function-calling descriptors.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    /// JSON Schema object describing the tool's input arguments.
    fn input_schema(&self) -> &Value;
    async fn execute(&self, args: Value) -> Result<String, String>;
}

pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self { tools: HashMap::new() }
    }

    /// Registers a tool. Re-registration under an existing name replaces
    /// silently — no warning, no error.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Function-calling descriptors for every registered tool, in the
    /// shape LLM providers expect: `{type:"function", function:{name,
    /// description, parameters}}`.
    pub fn schemas_for_llm(&self) -> Vec<Value> {
        self.tools
            .values()
            .map(|tool| {
                serde_json::json!({
                    "type": "function",
                    "function": {
                        "name": tool.name(),
                        "description": tool.description(),
                        "parameters": tool.input_schema(),
                    }
                })
            })
            .collect()
    }

    /// 1. Look up by name; fail with `NotFound` if absent.
    /// 2. Validate `args` against the tool's input schema; fail with
    ///    `BadArgs` on mismatch.
    /// 3. Invoke `execute` with the validated arguments.
    pub async fn execute_tool_call(&self, name: &str, args: Value) -> Result<String, ToolError> {
        let tool = self.get(name).ok_or_else(|| ToolError::NotFound(name.to_string()))?;
        validate_against_schema(name, &args, tool.input_schema())?;
        tool.execute(args)
            .await
            .map_err(|reason| ToolError::ExecutionFailed { name: name.to_string(), reason })
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Minimal structural validation: the arguments must be a JSON object, and
/// every property named in the schema's `required` array must be present.
/// This is not a full JSON Schema validator — it checks the invariant the
/// registry actually depends on before invoking `execute`.
fn validate_against_schema(tool_name: &str, args: &Value, schema: &Value) -> Result<(), ToolError> {
    let Some(obj) = args.as_object() else {
        return Err(ToolError::BadArgs { name: tool_name.to_string(), reason: "arguments must be a JSON object".to_string() });
    };

    if let Some(required) = schema.get("required").and_then(Value::as_array) {
        for field in required {
            let Some(field_name) = field.as_str() else { continue };
            if !obj.contains_key(field_name) {
                return Err(ToolError::BadArgs {
                    name: tool_name.to_string(),
                    reason: format!("missing required field '{field_name}'"),
                });
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }

        fn description(&self) -> &str {
            "Echoes the message argument back."
        }

        fn input_schema(&self) -> &Value {
            static SCHEMA: std::sync::OnceLock<Value> = std::sync::OnceLock::new();
            SCHEMA.get_or_init(|| json!({"type": "object", "properties": {"message": {"type": "string"}}, "required": ["message"]}))
        }

        async fn execute(&self, args: Value) -> Result<String, String> {
            Ok(args["message"].as_str().unwrap_or_default().to_string())
        }
    }

    #[tokio::test]
    async fn registers_and_executes() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool));

        let result = registry.execute_tool_call("echo", json!({"message": "hi"})).await.unwrap();
        assert_eq!(result, "hi");
    }

    #[tokio::test]
    async fn missing_tool_is_not_found() {
        let registry = ToolRegistry::new();
        let err = registry.execute_tool_call("nope", json!({})).await.unwrap_err();
        assert!(matches!(err, ToolError::NotFound(_)));
    }

    #[tokio::test]
    async fn missing_required_field_is_bad_args() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool));

        let err = registry.execute_tool_call("echo", json!({})).await.unwrap_err();
        assert!(matches!(err, ToolError::BadArgs { .. }));
    }

    #[test]
    fn schema_export_matches_llm_descriptor_shape() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool));

        let schemas = registry.schemas_for_llm();
        assert_eq!(schemas.len(), 1);
        assert_eq!(schemas[0]["type"], "function");
        assert_eq!(schemas[0]["function"]["name"], "echo");
    }

    #[tokio::test]
    async fn re_registration_replaces_silently() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool));
        registry.register(Arc::new(EchoTool));
        assert_eq!(registry.len(), 1);
    }
}
