//! Tool trait and registry
//!
//! A tool is text-in/text-out from the loop's point of view. `execute`
//! never fails across the boundary: internal errors come back as text
//! starting with `ERROR_MARKER` so the loop can always record an observation.

use crate::config::AgentConfig;
use crate::error::AgentError;
use crate::memory::MemoryStore;
use crate::models::ToolParams;
use crate::Result;
use serde_json::Value;
use std::sync::Arc;

pub mod browser;
pub mod canvas;
pub mod files;
pub mod memory_sync;
pub mod predict;
pub mod search;

pub use browser::BrowserTool;
pub use canvas::DesignCanvasTool;
pub use files::{FileReadTool, FileSandbox, FileWriteTool};
pub use memory_sync::MemorySyncTool;
pub use predict::{HttpPredictor, PredictPriceTool, PricePredictor};
pub use search::WebSearchTool;

/// Prefix of every tool-side failure observation
pub const ERROR_MARKER: &str = "[Error]";

/// Trait for a single agent tool
#[async_trait::async_trait]
pub trait Tool: Send + Sync {
    /// Dispatch key, unique within a registry
    fn name(&self) -> &str;

    /// Shown verbatim to the model in the system prompt
    fn description(&self) -> &str;

    async fn execute(&self, params: &ToolParams) -> String;
}

/// Collapse a fallible tool body into observation text
pub fn soft_fail(result: Result<String>) -> String {
    match result {
        Ok(text) => text,
        Err(e) => error_text(e),
    }
}

pub fn error_text(message: impl std::fmt::Display) -> String {
    format!("{} {}", ERROR_MARKER, message)
}

/// Required, non-empty string parameter
pub fn require_str<'a>(params: &'a ToolParams, key: &str) -> Result<&'a str> {
    optional_str(params, key)
        .ok_or_else(|| AgentError::InvalidToolInput(format!("'{}' is required", key)))
}

/// Optional string parameter; empty strings count as absent
pub fn optional_str<'a>(params: &'a ToolParams, key: &str) -> Option<&'a str> {
    params
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// Ordered tool collection; lookup is by case-insensitive name
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self { tools: Vec::new() }
    }

    /// Names must be unique; a clash is a configuration error.
    pub fn register(&mut self, tool: Arc<dyn Tool>) -> Result<()> {
        if self.find(tool.name()).is_some() {
            return Err(AgentError::DuplicateTool(tool.name().to_string()));
        }
        self.tools.push(tool);
        Ok(())
    }

    pub fn find(&self, name: &str) -> Option<Arc<dyn Tool>> {
        let wanted = name.trim().to_lowercase();
        self.tools
            .iter()
            .find(|t| t.name().to_lowercase() == wanted)
            .cloned()
    }

    pub fn list(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// `- name: description` lines for the system prompt
    pub fn describe(&self) -> String {
        self.tools
            .iter()
            .map(|t| format!("- {}: {}", t.name(), t.description()))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Create the standard tool set from configuration.
pub fn create_default_registry(
    config: &AgentConfig,
    memory: Arc<dyn MemoryStore>,
) -> Result<ToolRegistry> {
    let mut registry = ToolRegistry::new();
    let sandbox = FileSandbox::new(&config.reports_dir);

    let predictor: Option<Arc<dyn PricePredictor>> = match &config.analytics_url {
        Some(url) => Some(Arc::new(HttpPredictor::new(url)?)),
        None => None,
    };

    registry.register(Arc::new(WebSearchTool::new(
        &config.search_endpoint,
        config.search_timeout,
    )?))?;
    registry.register(Arc::new(FileReadTool::new(
        sandbox.clone(),
        config.read_fallback,
    )))?;
    registry.register(Arc::new(FileWriteTool::new(sandbox)))?;
    registry.register(Arc::new(BrowserTool::new(
        config.reports_dir.join("screenshots"),
        config.browser_headless,
    )))?;
    registry.register(Arc::new(PredictPriceTool::new(predictor)))?;
    registry.register(Arc::new(DesignCanvasTool))?;
    registry.register(Arc::new(MemorySyncTool::new(memory)))?;

    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryMemoryStore;
    use serde_json::json;

    struct EchoTool {
        name: &'static str,
    }

    #[async_trait::async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            self.name
        }

        fn description(&self) -> &str {
            "Echo the 'text' parameter"
        }

        async fn execute(&self, params: &ToolParams) -> String {
            soft_fail(require_str(params, "text").map(str::to_string))
        }
    }

    fn params(value: Value) -> ToolParams {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_registry_rejects_duplicates() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool { name: "echo" })).unwrap();

        let err = registry.register(Arc::new(EchoTool { name: "ECHO" }));
        assert!(matches!(err, Err(AgentError::DuplicateTool(_))));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_find_is_case_insensitive() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool { name: "search_web" })).unwrap();

        assert!(registry.find("Search_Web").is_some());
        assert!(registry.find("search").is_none());
    }

    #[test]
    fn test_describe_lists_every_tool() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool { name: "a" })).unwrap();
        registry.register(Arc::new(EchoTool { name: "b" })).unwrap();

        assert_eq!(
            registry.describe(),
            "- a: Echo the 'text' parameter\n- b: Echo the 'text' parameter"
        );
    }

    #[tokio::test]
    async fn test_soft_fail_marks_errors() {
        let tool = EchoTool { name: "echo" };
        assert_eq!(tool.execute(&params(json!({"text": "hi"}))).await, "hi");

        let out = tool.execute(&params(json!({"text": "  "}))).await;
        assert!(out.starts_with(ERROR_MARKER));
        assert!(out.contains("'text' is required"));
    }

    #[test]
    fn test_default_registry() {
        let dir = tempfile::tempdir().unwrap();
        let config = AgentConfig {
            reports_dir: dir.path().to_path_buf(),
            ..AgentConfig::default()
        };
        let registry =
            create_default_registry(&config, Arc::new(InMemoryMemoryStore::new())).unwrap();

        assert_eq!(
            registry.list(),
            vec![
                "search_web",
                "read_file",
                "write_file",
                "browse_web",
                "predict_price",
                "design_canvas",
                "sync_memory"
            ]
        );
    }
}
