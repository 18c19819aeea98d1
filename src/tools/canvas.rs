//! Generative UI emission
//!
//! The tool validates a declarative schema and hands back its canonical
//! JSON. Rendering belongs to whoever displays the observation.

use super::{soft_fail, Tool};
use crate::canvas::Component;
use crate::error::AgentError;
use crate::models::ToolParams;
use crate::Result;
use serde_json::Value;

pub struct DesignCanvasTool;

impl DesignCanvasTool {
    /// Accepts `{"schema": {...}}`, `{"schema": "<json>"}` or the schema itself.
    fn extract_schema(params: &ToolParams) -> Result<Value> {
        match params.get("schema") {
            Some(Value::Object(map)) => Ok(Value::Object(map.clone())),
            Some(Value::String(text)) => {
                let parsed: Value = serde_json::from_str(text).map_err(|e| {
                    AgentError::InvalidToolInput(format!("'schema' is not valid JSON: {}", e))
                })?;
                if parsed.is_object() {
                    Ok(parsed)
                } else {
                    Err(AgentError::InvalidToolInput(
                        "'schema' must be a JSON object".to_string(),
                    ))
                }
            }
            Some(_) => Err(AgentError::InvalidToolInput(
                "'schema' must be a JSON object".to_string(),
            )),
            None if params.contains_key("type") => Ok(Value::Object(params.clone())),
            None => Err(AgentError::InvalidToolInput(
                "expected a schema with a 'type' field".to_string(),
            )),
        }
    }

    fn design(params: &ToolParams) -> Result<String> {
        let schema = Self::extract_schema(params)?;
        let issues = Component::from_value(&schema).issues();
        if !issues.is_empty() {
            return Err(AgentError::InvalidToolInput(issues.join("; ")));
        }
        Ok(serde_json::to_string(&schema)?)
    }
}

#[async_trait::async_trait]
impl Tool for DesignCanvasTool {
    fn name(&self) -> &str {
        "design_canvas"
    }

    fn description(&self) -> &str {
        "Render a visual artifact for the user. Param: 'schema' (object with 'type': dashboard, table, chart, mermaid or metrics)."
    }

    async fn execute(&self, params: &ToolParams) -> String {
        soft_fail(Self::design(params))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn params(value: Value) -> ToolParams {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn test_accepts_nested_and_inline_schemas() {
        let nested = DesignCanvasTool
            .execute(&params(json!({"schema": {"type": "mermaid", "code": "graph TD; A-->B;"}})))
            .await;
        let parsed: Value = serde_json::from_str(&nested).unwrap();
        assert_eq!(parsed["type"], "mermaid");

        let inline = DesignCanvasTool
            .execute(&params(json!({"type": "table", "data": [{"Asset": "BTC"}]})))
            .await;
        assert!(inline.contains("\"table\""));

        let stringly = DesignCanvasTool
            .execute(&params(json!({"schema": "{\"type\": \"metrics\", \"items\": []}"})))
            .await;
        assert!(stringly.contains("metrics"));
    }

    #[tokio::test]
    async fn test_rejects_unknown_and_malformed() {
        let out = DesignCanvasTool
            .execute(&params(json!({"schema": {"type": "hologram"}})))
            .await;
        assert!(out.starts_with("[Error]"));
        assert!(out.contains("unknown component type: hologram"));

        let out = DesignCanvasTool
            .execute(&params(json!({"schema": "not json"})))
            .await;
        assert!(out.starts_with("[Error]"));

        let out = DesignCanvasTool.execute(&params(json!({}))).await;
        assert!(out.starts_with("[Error]"));
    }
}
