//! Generative UI schema and renderer
//!
//! Schemas arrive as JSON objects tagged by `type`:
//! `dashboard | table | chart | mermaid | metrics`. Each tag maps to one
//! renderer; a dashboard renders its `components` in order. Tags nobody
//! knows render as a diagnostic block instead of failing.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub type Row = Map<String, Value>;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ChartKind {
    #[default]
    Bar,
    Line,
    Scatter,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Metric {
    #[serde(default = "default_metric_label")]
    pub label: String,
    #[serde(default)]
    pub value: Value,
    #[serde(default)]
    pub delta: Option<Value>,
}

fn default_metric_label() -> String {
    "Metric".to_string()
}

#[derive(Debug, Clone, PartialEq)]
pub enum Component {
    Dashboard {
        title: Option<String>,
        components: Vec<Component>,
    },
    Table {
        title: Option<String>,
        rows: Vec<Row>,
    },
    Chart {
        title: Option<String>,
        kind: ChartKind,
        x: Option<String>,
        y: Option<String>,
        rows: Vec<Row>,
    },
    Mermaid {
        title: Option<String>,
        code: String,
    },
    Metrics {
        title: Option<String>,
        items: Vec<Metric>,
    },
    /// Tag not in the known set
    Unknown { tag: String, raw: Value },
    /// Known tag whose payload does not fit
    Invalid {
        tag: String,
        reason: String,
        raw: Value,
    },
}

#[derive(Deserialize)]
struct TablePayload {
    #[serde(default)]
    data: Vec<Row>,
}

#[derive(Deserialize)]
struct ChartPayload {
    #[serde(default)]
    chart_type: ChartKind,
    x: Option<String>,
    y: Option<String>,
    #[serde(default)]
    data: Vec<Row>,
}

#[derive(Deserialize)]
struct MermaidPayload {
    #[serde(default)]
    code: String,
}

#[derive(Deserialize)]
struct MetricsPayload {
    #[serde(default)]
    items: Vec<Metric>,
}

#[derive(Deserialize)]
struct DashboardPayload {
    #[serde(default)]
    components: Vec<Value>,
}

impl Component {
    pub fn from_value(value: &Value) -> Component {
        let tag = value
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or("unknown")
            .to_string();
        let title = value
            .get("title")
            .and_then(Value::as_str)
            .map(str::to_string);

        let invalid = |e: serde_json::Error| Component::Invalid {
            tag: tag.clone(),
            reason: e.to_string(),
            raw: value.clone(),
        };

        match tag.as_str() {
            "dashboard" => match DashboardPayload::deserialize(value) {
                Ok(p) => Component::Dashboard {
                    title,
                    components: p.components.iter().map(Component::from_value).collect(),
                },
                Err(e) => invalid(e),
            },
            "table" => match TablePayload::deserialize(value) {
                Ok(p) => Component::Table { title, rows: p.data },
                Err(e) => invalid(e),
            },
            "chart" => match ChartPayload::deserialize(value) {
                Ok(p) => Component::Chart {
                    title,
                    kind: p.chart_type,
                    x: p.x,
                    y: p.y,
                    rows: p.data,
                },
                Err(e) => invalid(e),
            },
            "mermaid" => match MermaidPayload::deserialize(value) {
                Ok(p) => Component::Mermaid { title, code: p.code },
                Err(e) => invalid(e),
            },
            "metrics" => match MetricsPayload::deserialize(value) {
                Ok(p) => Component::Metrics { title, items: p.items },
                Err(e) => invalid(e),
            },
            _ => Component::Unknown {
                tag: tag.clone(),
                raw: value.clone(),
            },
        }
    }

    /// Problems found anywhere in the tree, as readable strings
    pub fn issues(&self) -> Vec<String> {
        match self {
            Component::Dashboard { components, .. } => {
                components.iter().flat_map(Component::issues).collect()
            }
            Component::Unknown { tag, .. } => vec![format!("unknown component type: {}", tag)],
            Component::Invalid { tag, reason, .. } => {
                vec![format!("invalid {} component: {}", tag, reason)]
            }
            Component::Mermaid { code, .. } if code.trim().is_empty() => {
                vec!["mermaid component has no code".to_string()]
            }
            _ => Vec::new(),
        }
    }
}

/// Turns a component tree into displayable output
pub trait Renderer {
    fn render(&self, component: &Component) -> String;
}

/// Markdown rendering for terminals and chat UIs
pub struct MarkdownRenderer;

impl Renderer for MarkdownRenderer {
    fn render(&self, component: &Component) -> String {
        let mut out = String::new();
        render_into(component, &mut out);
        out
    }
}

/// Markdown for an observation that is a valid component schema, if it is one
pub fn render_canvas(text: &str) -> Option<String> {
    let value: Value = serde_json::from_str(text.trim()).ok()?;
    value.get("type")?.as_str()?;

    let component = Component::from_value(&value);
    if !component.issues().is_empty() {
        return None;
    }
    Some(MarkdownRenderer.render(&component))
}

fn heading(title: &Option<String>, out: &mut String) {
    if let Some(title) = title {
        out.push_str(&format!("### {}\n\n", title));
    }
}

fn render_into(component: &Component, out: &mut String) {
    match component {
        Component::Dashboard { title, components } => {
            heading(title, out);
            for child in components {
                render_into(child, out);
                out.push_str("\n---\n\n");
            }
        }
        Component::Table { title, rows } => {
            heading(title, out);
            if rows.is_empty() {
                out.push_str("_No data for table._\n");
            } else {
                render_table(rows, out);
            }
        }
        Component::Chart {
            title,
            kind,
            x,
            y,
            rows,
        } => {
            heading(title, out);
            if rows.is_empty() {
                out.push_str("_No data for chart._\n");
                return;
            }
            let spec = serde_json::json!({
                "chart_type": kind,
                "x": x,
                "y": y,
                "data": rows,
            });
            out.push_str(&format!(
                "```chart\n{}\n```\n",
                serde_json::to_string_pretty(&spec).unwrap_or_default()
            ));
        }
        Component::Mermaid { title, code } => {
            heading(title, out);
            out.push_str(&format!("```mermaid\n{}\n```\n", code.trim()));
        }
        Component::Metrics { title, items } => {
            heading(title, out);
            for item in items {
                out.push_str(&format!("- **{}**: {}", item.label, scalar(&item.value)));
                if let Some(delta) = &item.delta {
                    out.push_str(&format!(" ({})", scalar(delta)));
                }
                out.push('\n');
            }
        }
        Component::Unknown { tag, raw } => {
            out.push_str(&format!("> Unknown component type: {}\n\n", tag));
            out.push_str(&format!(
                "```json\n{}\n```\n",
                serde_json::to_string_pretty(raw).unwrap_or_default()
            ));
        }
        Component::Invalid { tag, reason, raw } => {
            out.push_str(&format!("> Generative UI error in {}: {}\n\n", tag, reason));
            out.push_str(&format!(
                "```json\n{}\n```\n",
                serde_json::to_string_pretty(raw).unwrap_or_default()
            ));
        }
    }
}

fn render_table(rows: &[Row], out: &mut String) {
    // Column order follows first appearance across all rows
    let mut columns: Vec<&String> = Vec::new();
    for row in rows {
        for key in row.keys() {
            if !columns.contains(&key) {
                columns.push(key);
            }
        }
    }

    out.push_str(&format!(
        "| {} |\n",
        columns.iter().map(|c| c.as_str()).collect::<Vec<_>>().join(" | ")
    ));
    out.push_str(&format!(
        "|{}\n",
        columns.iter().map(|_| "---|").collect::<String>()
    ));
    for row in rows {
        let cells: Vec<String> = columns
            .iter()
            .map(|c| row.get(*c).map(scalar).unwrap_or_default())
            .collect();
        out.push_str(&format!("| {} |\n", cells.join(" | ")));
    }
}

fn scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "—".to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_table_renders_markdown() {
        let component = Component::from_value(&json!({
            "type": "table",
            "title": "Example Data",
            "data": [{"Asset": "BTC", "Price": 45000}, {"Asset": "ETH", "Price": 2400}]
        }));

        let md = MarkdownRenderer.render(&component);
        assert!(md.starts_with("### Example Data\n\n"));
        assert!(md.contains("| Asset | Price |"));
        assert!(md.contains("| BTC | 45000 |"));
        assert!(md.contains("| ETH | 2400 |"));
    }

    #[test]
    fn test_dashboard_recurses() {
        let component = Component::from_value(&json!({
            "type": "dashboard",
            "components": [
                {"type": "metrics", "items": [{"label": "TVL", "value": "$1.2M", "delta": "-4%"}]},
                {"type": "mermaid", "code": "graph TD; A-->B;"}
            ]
        }));

        match &component {
            Component::Dashboard { components, .. } => assert_eq!(components.len(), 2),
            other => panic!("expected dashboard, got {:?}", other),
        }

        let md = MarkdownRenderer.render(&component);
        assert!(md.contains("- **TVL**: $1.2M (-4%)"));
        assert!(md.contains("```mermaid\ngraph TD; A-->B;\n```"));
        assert_eq!(md.matches("---\n").count(), 2);
    }

    #[test]
    fn test_unknown_tag_renders_diagnostic() {
        let component = Component::from_value(&json!({"type": "heatmap", "data": []}));
        assert!(matches!(component, Component::Unknown { ref tag, .. } if tag == "heatmap"));
        assert_eq!(component.issues(), vec!["unknown component type: heatmap"]);

        let md = MarkdownRenderer.render(&component);
        assert!(md.contains("Unknown component type: heatmap"));
    }

    #[test]
    fn test_render_canvas_only_accepts_valid_schemas() {
        let md = render_canvas(r#"{"type": "mermaid", "code": "graph LR; A-->B;"}"#).unwrap();
        assert!(md.contains("```mermaid"));

        assert!(render_canvas("Memory updated.").is_none());
        assert!(render_canvas(r#"{"query": "btc"}"#).is_none());
        assert!(render_canvas(r#"{"type": "heatmap"}"#).is_none());
    }

    #[test]
    fn test_invalid_payload_is_reported() {
        let component = Component::from_value(&json!({"type": "chart", "chart_type": "pie", "data": []}));
        assert!(matches!(component, Component::Invalid { .. }));
        assert_eq!(component.issues().len(), 1);
    }

    #[test]
    fn test_chart_defaults_to_bar() {
        let component = Component::from_value(&json!({
            "type": "chart", "x": "Asset", "y": "Price", "data": [{"Asset": "BTC", "Price": 1}]
        }));
        match component {
            Component::Chart { kind, .. } => assert_eq!(kind, ChartKind::Bar),
            other => panic!("expected chart, got {:?}", other),
        }
    }
}
