//! Memory sync tool: lets the agent persist a critical insight to the
//! shared relational memory.

use super::{require_str, soft_fail, Tool};
use crate::memory::MemoryStore;
use crate::models::ToolParams;
use crate::Result;
use std::sync::Arc;

pub const INSIGHT_LABEL: &str = "AGENT INSIGHT";

pub struct MemorySyncTool {
    memory: Arc<dyn MemoryStore>,
}

impl MemorySyncTool {
    pub fn new(memory: Arc<dyn MemoryStore>) -> Self {
        Self { memory }
    }

    async fn sync(&self, params: &ToolParams) -> Result<String> {
        let insight = require_str(params, "insight")?;
        self.memory.append(INSIGHT_LABEL, insight).await?;
        Ok("Memory updated.".to_string())
    }
}

#[async_trait::async_trait]
impl Tool for MemorySyncTool {
    fn name(&self) -> &str {
        "sync_memory"
    }

    fn description(&self) -> &str {
        "Save a critical insight to the shared long-term memory. Param: 'insight'."
    }

    async fn execute(&self, params: &ToolParams) -> String {
        soft_fail(self.sync(params).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryMemoryStore;
    use serde_json::json;

    #[tokio::test]
    async fn test_appends_insight() {
        let store = Arc::new(InMemoryMemoryStore::new());
        let tool = MemorySyncTool::new(store.clone());

        let params = json!({"insight": "ATN pool depth under $50k"})
            .as_object()
            .cloned()
            .unwrap();
        assert_eq!(tool.execute(&params).await, "Memory updated.");

        let log = store.contents().await;
        assert!(log.contains("--- AGENT INSIGHT ("));
        assert!(log.contains("ATN pool depth under $50k"));
    }
}
