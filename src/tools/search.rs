//! Web search over the DuckDuckGo instant-answer API

use super::{require_str, soft_fail, Tool};
use crate::error::AgentError;
use crate::models::ToolParams;
use crate::Result;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

const MAX_RESULTS: usize = 3;

#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub title: String,
    pub body: String,
    pub source: String,
}

pub struct WebSearchTool {
    client: Client,
    endpoint: String,
}

impl WebSearchTool {
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("finance-react-agent/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            endpoint: endpoint.to_string(),
        })
    }

    async fn search(&self, params: &ToolParams) -> Result<String> {
        let query = require_str(params, "query")?;
        debug!(query, "Web search");

        let response = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("q", query),
                ("format", "json"),
                ("no_html", "1"),
                ("skip_disambig", "1"),
            ])
            .send()
            .await
            .map_err(|e| AgentError::ToolError(format!("Search failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AgentError::ToolError(format!(
                "Search failed: provider returned {}",
                status
            )));
        }

        // The instant-answer API answers with a JS content type, so decode by hand.
        let body = response.text().await?;
        let answer: InstantAnswer = serde_json::from_str(&body)
            .map_err(|e| AgentError::ToolError(format!("Search failed: {}", e)))?;

        Ok(format_hits(&collect_hits(&answer, MAX_RESULTS)))
    }
}

#[async_trait::async_trait]
impl Tool for WebSearchTool {
    fn name(&self) -> &str {
        "search_web"
    }

    fn description(&self) -> &str {
        "Search the internet for real-time information. Param: 'query'"
    }

    async fn execute(&self, params: &ToolParams) -> String {
        soft_fail(self.search(params).await)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InstantAnswer {
    #[serde(default)]
    heading: String,
    #[serde(default)]
    abstract_text: String,
    #[serde(default, rename = "AbstractURL")]
    abstract_url: String,
    #[serde(default)]
    related_topics: Vec<RelatedTopic>,
}

/// Either a leaf topic or a named group of topics
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RelatedTopic {
    Leaf {
        #[serde(rename = "Text")]
        text: String,
        #[serde(rename = "FirstURL")]
        first_url: String,
    },
    Group {
        #[serde(rename = "Topics")]
        topics: Vec<RelatedTopic>,
    },
}

fn collect_hits(answer: &InstantAnswer, limit: usize) -> Vec<SearchHit> {
    let mut hits = Vec::new();

    if !answer.abstract_text.trim().is_empty() {
        hits.push(SearchHit {
            title: answer.heading.clone(),
            body: answer.abstract_text.clone(),
            source: answer.abstract_url.clone(),
        });
    }

    fn walk(topics: &[RelatedTopic], hits: &mut Vec<SearchHit>, limit: usize) {
        for topic in topics {
            if hits.len() >= limit {
                return;
            }
            match topic {
                RelatedTopic::Leaf { text, first_url } => {
                    let (title, body) = match text.split_once(" - ") {
                        Some((title, body)) => (title.to_string(), body.to_string()),
                        None => (text.clone(), text.clone()),
                    };
                    hits.push(SearchHit {
                        title,
                        body,
                        source: first_url.clone(),
                    });
                }
                RelatedTopic::Group { topics } => walk(topics, hits, limit),
            }
        }
    }

    walk(&answer.related_topics, &mut hits, limit);
    hits.truncate(limit);
    hits
}

fn format_hits(hits: &[SearchHit]) -> String {
    if hits.is_empty() {
        return "No results found.".to_string();
    }

    hits.iter()
        .enumerate()
        .map(|(i, hit)| format!("{}. {}: {}\nSource: {}\n\n", i + 1, hit.title, hit.body, hit.source))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const SAMPLE: &str = r#"{
        "Heading": "Bitcoin",
        "AbstractText": "Bitcoin is a decentralized digital currency.",
        "AbstractURL": "https://en.wikipedia.org/wiki/Bitcoin",
        "RelatedTopics": [
            {"Text": "Bitcoin ETF - An exchange-traded fund tracking bitcoin.", "FirstURL": "https://duckduckgo.com/Bitcoin_ETF"},
            {"Name": "Mining", "Topics": [
                {"Text": "Bitcoin mining - The process of adding blocks.", "FirstURL": "https://duckduckgo.com/Mining"},
                {"Text": "Hashrate - Total computing power.", "FirstURL": "https://duckduckgo.com/Hashrate"}
            ]}
        ]
    }"#;

    #[test]
    fn test_collect_hits_limits_to_three() {
        let answer: InstantAnswer = serde_json::from_str(SAMPLE).unwrap();
        let hits = collect_hits(&answer, MAX_RESULTS);

        assert_eq!(hits.len(), 3);
        assert_eq!(hits[0].title, "Bitcoin");
        assert_eq!(hits[1].title, "Bitcoin ETF");
        assert_eq!(hits[1].body, "An exchange-traded fund tracking bitcoin.");
        assert_eq!(hits[2].source, "https://duckduckgo.com/Mining");
    }

    #[test]
    fn test_format_hits() {
        let formatted = format_hits(&[SearchHit {
            title: "ATN".to_string(),
            body: "Athene Network token".to_string(),
            source: "https://example.com".to_string(),
        }]);
        assert_eq!(
            formatted,
            "1. ATN: Athene Network token\nSource: https://example.com\n\n"
        );
        assert_eq!(format_hits(&[]), "No results found.");
    }

    #[tokio::test]
    async fn test_missing_query_fails_soft() {
        let tool = WebSearchTool::new("http://127.0.0.1:9", Duration::from_secs(1)).unwrap();
        let out = tool.execute(&json!({}).as_object().cloned().unwrap()).await;
        assert!(out.starts_with("[Error]"));
    }

    #[tokio::test]
    async fn test_unreachable_provider_fails_soft() {
        let tool = WebSearchTool::new("http://127.0.0.1:9", Duration::from_secs(1)).unwrap();
        let params = json!({"query": "BTC"}).as_object().cloned().unwrap();
        let out = tool.execute(&params).await;
        assert!(out.starts_with("[Error] Tool error: Search failed"));
    }
}
