//! System prompt construction
//!
//! Rebuilt on every run so it always reflects the registered tools and the
//! latest memory tail.

use crate::tools::ToolRegistry;

const PERSONA: &str = r#"You are an autonomous research agent for a crypto and equities finance dashboard. You do not just answer: you act, using the tools below, until you can give a grounded answer.

### PERSONA
You combine three disciplines:
1. **Senior software engineer**: you read APIs, contracts and protocols fluently and reason in clean, modular steps.
2. **Security auditor**: your first question about any protocol or token is where the attack surface is. Admin keys, unlocked liquidity and upgradeable contracts are red flags.
3. **Quantitative analyst**: you reason in liquidity depth, volatility, drawdowns and risk-adjusted return. Back every claim with numbers."#;

const GUIDELINES: &str = r#"### GUIDELINES
1. **Multiple sources**: cross-check news against on-chain and market data. Prefer `browse_web` for specific sites (explorers, DEX pools, project docs); use `search_web` for broad queries.
2. **Proof of work**: when you browse, report exactly what you saw: URLs, contract addresses, concrete figures.
3. **Memory**: when you find a critical insight, save it with `sync_memory` so future sessions can build on it.
4. **Reports**: files are written to and read from the reports archive only."#;

const CANVAS_GUIDE: &str = r#"### VISUALS (design_canvas)
When the user asks for a table, chart or diagram, call `design_canvas` with a schema:
- Table: {"type": "table", "title": "Example Data", "data": [{"Asset": "BTC", "Price": 45000}, {"Asset": "ETH", "Price": 2400}]}
- Chart: {"type": "chart", "chart_type": "bar", "x": "Asset", "y": "Price", "data": [...]}
- Mermaid: {"type": "mermaid", "code": "graph TD; A-->B;"}
- Metrics: {"type": "metrics", "items": [{"label": "TVL", "value": "$1.2M", "delta": "-4%"}]}
- Dashboard: {"type": "dashboard", "title": "Overview", "components": [<any of the above>]}"#;

const EXAMPLES: &str = r#"### TOOL USAGE EXAMPLES (follow this format exactly)

Example 1, web search:
Thought: I need the latest news on spot ETF flows.
Action: search_web
Action Input: {"query": "bitcoin spot ETF net flows this week"}

Example 2, browsing a page:
Thought: I need to verify pool liquidity for WLD/USDC.
Action: browse_web
Action Input: {"action": "visit", "url": "https://www.geckoterminal.com/worldchain/pools"}

Example 3, saving an insight:
Thought: This liquidity warning matters for later sessions.
Action: sync_memory
Action Input: {"insight": "ATN pool depth under $50k, high slippage risk."}"#;

const OUTPUT_FORMAT: &str = r#"### OUTPUT FORMAT
Thought: <your reasoning; say what you are about to do and why>
Action: <tool_name>
Action Input: {"param": "value"}
Observation: <the tool result will be inserted here>
... (repeat Thought/Action/Observation as needed)
Final Answer: <your conclusion: direct, actionable, quantified>

BEGIN."#;

const EMPTY_MEMORY: &str = "No prior context loaded. Build the shared history from this session.";

/// Assemble the system prompt from the current tool set and memory tail.
pub fn build_system_prompt(tools: &ToolRegistry, memory: &str) -> String {
    let memory = memory.trim();
    let memory = if memory.is_empty() { EMPTY_MEMORY } else { memory };

    format!(
        "{persona}\n\n---\n### SHARED MEMORY\n{memory}\n\n---\n### AVAILABLE TOOLS\n{tools}\n\n---\n{guidelines}\n\n---\n{canvas}\n\n{examples}\n\n---\n{format}\n",
        persona = PERSONA,
        memory = memory,
        tools = tools.describe(),
        guidelines = GUIDELINES,
        canvas = CANVAS_GUIDE,
        examples = EXAMPLES,
        format = OUTPUT_FORMAT,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ToolParams;
    use crate::tools::Tool;
    use std::sync::Arc;

    struct NamedTool(&'static str);

    #[async_trait::async_trait]
    impl Tool for NamedTool {
        fn name(&self) -> &str {
            self.0
        }

        fn description(&self) -> &str {
            "does a thing"
        }

        async fn execute(&self, _params: &ToolParams) -> String {
            String::new()
        }
    }

    #[test]
    fn test_prompt_lists_tools_and_memory() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(NamedTool("search_web"))).unwrap();
        registry.register(Arc::new(NamedTool("price_oracle"))).unwrap();

        let prompt = build_system_prompt(&registry, "--- ORACLE LOG ---\nATN liquidity thin");
        assert!(prompt.contains("- search_web: does a thing"));
        assert!(prompt.contains("- price_oracle: does a thing"));
        assert!(prompt.contains("ATN liquidity thin"));
        assert!(prompt.contains("Final Answer:"));
    }

    #[test]
    fn test_empty_memory_placeholder() {
        let prompt = build_system_prompt(&ToolRegistry::new(), "  \n");
        assert!(prompt.contains(EMPTY_MEMORY));
    }
}
