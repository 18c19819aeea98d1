//! ReAct response parser
//!
//! Pure text → structure. The loop calls `next_step` once per model reply;
//! nothing here touches a backend or a tool.
//!
//! Precedence: `Final Answer:` beats everything, then a complete
//! `Action:` + `Action Input:` pair, then a bare `Thought:`, then
//! the whole reply as an unstructured answer.

use crate::models::{ToolInvocation, ToolParams};
use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value;
use thiserror::Error;

pub const FINAL_ANSWER_MARKER: &str = "Final Answer:";
pub const THOUGHT_MARKER: &str = "Thought:";

lazy_static! {
    static ref ACTION_RE: Regex = Regex::new(r"(?i)\bAction:[ \t]*(\w*)").unwrap();
    static ref ACTION_INPUT_RE: Regex = Regex::new(r"(?i)Action\s*Input:\s*").unwrap();
    static ref SEGMENT_RE: Regex =
        Regex::new(r"(?im)^[ \t]*(Thought|Action[ \t]*Input|Action|Observation|Final Answer):")
            .unwrap();
}

/// Malformed tool call. `Display` is the observation replayed to the model.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("[Error] 'Action:' must name a tool on the same line, e.g. Action: search_web")]
    MissingToolName,

    #[error("[Error] Action '{tool}' has no Action Input. Follow it with a JSON object, e.g. Action Input: {{\"param\": \"value\"}}")]
    MissingActionInput { tool: String },

    #[error("[Error] Invalid JSON format in Action Input: {raw} ({reason})")]
    InvalidActionInput {
        tool: String,
        raw: String,
        reason: String,
    },

    #[error("[Error] Action Input for '{tool}' must be a JSON object, got: {raw}")]
    NonObjectInput { tool: String, raw: String },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedResponse {
    pub thoughts: Vec<String>,
    pub action: Option<ToolInvocation>,
    pub observations: Vec<String>,
    pub final_answer: Option<String>,
    pub has_thought: bool,
}

/// What the loop does with one reply
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    Final(String),
    Invoke(ToolInvocation),
    /// Parse failure text, fed back as an observation
    Malformed(String),
    /// Reasoning without a commitment; the loop nudges
    Stalled,
    /// Protocol ignored; the reply is the answer
    Unstructured(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentKind {
    Thought,
    Action,
    ActionInput,
    Observation,
    FinalAnswer,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub kind: SegmentKind,
    pub text: String,
}

/// Split a reply into its labelled sections, in order.
/// Text before the first marker is dropped.
pub fn segments(text: &str) -> Vec<Segment> {
    let markers: Vec<_> = SEGMENT_RE.captures_iter(text).collect();
    let mut out = Vec::with_capacity(markers.len());

    for (i, caps) in markers.iter().enumerate() {
        let (Some(whole), Some(label)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let end = markers
            .get(i + 1)
            .and_then(|next| next.get(0))
            .map(|m| m.start())
            .unwrap_or(text.len());

        let label = label.as_str().to_lowercase();
        let kind = if label.starts_with("thought") {
            SegmentKind::Thought
        } else if label.starts_with("observation") {
            SegmentKind::Observation
        } else if label.starts_with("final") {
            SegmentKind::FinalAnswer
        } else if label.contains("input") {
            SegmentKind::ActionInput
        } else {
            SegmentKind::Action
        };

        out.push(Segment {
            kind,
            text: text[whole.end()..end].trim().to_string(),
        });
    }

    out
}

pub fn parse_response(text: &str) -> Result<ParsedResponse, ParseError> {
    let parts = segments(text);
    let collect = |kind: SegmentKind| -> Vec<String> {
        parts
            .iter()
            .filter(|s| s.kind == kind)
            .map(|s| s.text.clone())
            .collect()
    };

    let mut parsed = ParsedResponse {
        thoughts: collect(SegmentKind::Thought),
        observations: collect(SegmentKind::Observation),
        has_thought: text.contains(THOUGHT_MARKER),
        ..ParsedResponse::default()
    };

    if let Some(idx) = text.rfind(FINAL_ANSWER_MARKER) {
        parsed.final_answer = Some(text[idx + FINAL_ANSWER_MARKER.len()..].trim().to_string());
        return Ok(parsed);
    }

    let Some(caps) = ACTION_RE.captures(text) else {
        return Ok(parsed);
    };
    let tool = caps
        .get(1)
        .map(|m| m.as_str().to_lowercase())
        .unwrap_or_default();
    if tool.is_empty() {
        return Err(ParseError::MissingToolName);
    }

    let input_start = ACTION_INPUT_RE
        .find(text)
        .map(|m| m.end())
        .ok_or_else(|| ParseError::MissingActionInput { tool: tool.clone() })?;
    let params = parse_action_input(&tool, &text[input_start..])?;

    parsed.action = Some(ToolInvocation {
        tool_name: tool,
        params,
    });
    Ok(parsed)
}

pub fn next_step(text: &str) -> Step {
    match parse_response(text) {
        Err(e) => Step::Malformed(e.to_string()),
        Ok(parsed) => {
            if let Some(answer) = parsed.final_answer {
                Step::Final(answer)
            } else if let Some(invocation) = parsed.action {
                Step::Invoke(invocation)
            } else if parsed.has_thought {
                Step::Stalled
            } else {
                Step::Unstructured(text.trim().to_string())
            }
        }
    }
}

fn parse_action_input(tool: &str, rest: &str) -> Result<ToolParams, ParseError> {
    let rest = rest.trim_start();

    if !rest.starts_with('{') {
        let raw = rest.lines().next().unwrap_or_default().trim().to_string();
        return Err(match serde_json::from_str::<Value>(&raw) {
            Ok(_) => ParseError::NonObjectInput {
                tool: tool.to_string(),
                raw,
            },
            Err(e) => ParseError::InvalidActionInput {
                tool: tool.to_string(),
                raw,
                reason: e.to_string(),
            },
        });
    }

    let raw = balanced_object(rest).ok_or_else(|| ParseError::InvalidActionInput {
        tool: tool.to_string(),
        raw: rest.trim_end().to_string(),
        reason: "unbalanced braces".to_string(),
    })?;

    let value = match serde_json::from_str::<Value>(raw) {
        Ok(value) => value,
        // Models often emit Python-style single quotes
        Err(strict) => serde_json::from_str::<Value>(&raw.replace('\'', "\"")).map_err(|_| {
            ParseError::InvalidActionInput {
                tool: tool.to_string(),
                raw: raw.to_string(),
                reason: strict.to_string(),
            }
        })?,
    };

    match value {
        Value::Object(map) => Ok(map),
        _ => Err(ParseError::NonObjectInput {
            tool: tool.to_string(),
            raw: raw.to_string(),
        }),
    }
}

/// The `{...}` prefix of `text`, matching braces outside quoted strings.
/// Single quotes delimit strings too, for the lenient retry.
fn balanced_object(text: &str) -> Option<&str> {
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for (i, c) in text.char_indices() {
        if let Some(open) = quote {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                _ if c == open => quote = None,
                _ => {}
            }
            continue;
        }
        match c {
            '"' | '\'' => quote = Some(c),
            '{' => depth += 1,
            '}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(&text[..=i]);
                }
            }
            _ => {}
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_final_answer_uses_last_occurrence() {
        let reply = "Thought: done\nFinal Answer: draft\nFinal Answer:  BTC looks overbought. ";
        assert_eq!(next_step(reply), Step::Final("BTC looks overbought.".to_string()));
    }

    #[test]
    fn test_final_answer_beats_action() {
        let reply = "Action: search_web\nAction Input: {\"query\": \"btc\"}\nFinal Answer: skip it";
        let parsed = parse_response(reply).unwrap();
        assert!(parsed.action.is_none());
        assert_eq!(next_step(reply), Step::Final("skip it".to_string()));
    }

    #[test]
    fn test_action_with_nested_input() {
        let reply = "Thought: chart it\nAction: Design_Canvas\nAction Input: {\"schema\": {\"type\": \"mermaid\", \"code\": \"graph TD; A-->B;\"}}\nObservation: (pending)";

        match next_step(reply) {
            Step::Invoke(invocation) => {
                assert_eq!(invocation.tool_name, "design_canvas");
                assert_eq!(invocation.params["schema"]["type"], json!("mermaid"));
            }
            other => panic!("expected invoke, got {:?}", other),
        }
    }

    #[test]
    fn test_braces_inside_strings() {
        let reply = r#"Action: write_file
Action Input: {"filename": "a.md", "content": "use {braces} and \"quotes\" }"} trailing"#;
        let parsed = parse_response(reply).unwrap();
        let params = parsed.action.unwrap().params;
        assert_eq!(params["content"], json!("use {braces} and \"quotes\" }"));
    }

    #[test]
    fn test_single_quotes_are_tolerated() {
        let reply = "Action: search_web\nAction Input: {'query': 'ETH staking yield'}";
        let parsed = parse_response(reply).unwrap();
        assert_eq!(parsed.action.unwrap().params["query"], json!("ETH staking yield"));
    }

    #[test]
    fn test_single_quoted_braces_stay_inside_the_value() {
        let reply = "Action: search_web\nAction Input: {'query': 'a } b'}";
        let parsed = parse_response(reply).unwrap();
        assert_eq!(parsed.action.unwrap().params["query"], json!("a } b"));
    }

    #[test]
    fn test_apostrophe_in_double_quoted_value() {
        let reply = "Action: search_web\nAction Input: {\"query\": \"Bitcoin's {halving}\"}";
        let parsed = parse_response(reply).unwrap();
        assert_eq!(parsed.action.unwrap().params["query"], json!("Bitcoin's {halving}"));
    }

    #[test]
    fn test_empty_action_line_is_a_format_error() {
        let reply = "Thought: x\nAction:\nAction Input: {\"query\": \"btc\"}";
        assert_eq!(parse_response(reply).unwrap_err(), ParseError::MissingToolName);
        match next_step(reply) {
            Step::Malformed(text) => assert!(text.contains("must name a tool")),
            other => panic!("expected malformed, got {:?}", other),
        }

        let reply = "Action:   \t\nsearch_web\nAction Input: {}";
        assert_eq!(parse_response(reply).unwrap_err(), ParseError::MissingToolName);
    }

    #[test]
    fn test_invalid_json_reports_raw_text() {
        let reply = "Action: search_web\nAction Input: {query: bitcoin}";
        let err = parse_response(reply).unwrap_err();
        assert!(matches!(err, ParseError::InvalidActionInput { ref raw, .. } if raw == "{query: bitcoin}"));

        let text = err.to_string();
        assert!(text.starts_with("[Error] Invalid JSON format in Action Input: {query: bitcoin}"));
    }

    #[test]
    fn test_unbalanced_input() {
        let reply = "Action: search_web\nAction Input: {\"query\": \"btc\"";
        match next_step(reply) {
            Step::Malformed(text) => assert!(text.contains("{\"query\": \"btc\"")),
            other => panic!("expected malformed, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_and_non_object_input() {
        let err = parse_response("Thought: x\nAction: search_web").unwrap_err();
        assert_eq!(
            err,
            ParseError::MissingActionInput {
                tool: "search_web".to_string()
            }
        );

        let err = parse_response("Action: search_web\nAction Input: [\"btc\"]").unwrap_err();
        assert!(matches!(err, ParseError::NonObjectInput { .. }));
    }

    #[test]
    fn test_thought_only_is_stalled() {
        assert_eq!(next_step("Thought: I should check the charts first."), Step::Stalled);
    }

    #[test]
    fn test_plain_text_is_unstructured() {
        assert_eq!(
            next_step("  Bitcoin is trading sideways.  "),
            Step::Unstructured("Bitcoin is trading sideways.".to_string())
        );
    }

    #[test]
    fn test_segments_in_order() {
        let reply = "Thought: look it up\nAction: search_web\nAction Input: {\"query\": \"wld\"}\nObservation: 3 hits\nThought: enough";
        let kinds: Vec<SegmentKind> = segments(reply).iter().map(|s| s.kind).collect();
        assert_eq!(
            kinds,
            vec![
                SegmentKind::Thought,
                SegmentKind::Action,
                SegmentKind::ActionInput,
                SegmentKind::Observation,
                SegmentKind::Thought
            ]
        );

        let parsed = parse_response(reply).unwrap();
        assert_eq!(parsed.thoughts, vec!["look it up", "enough"]);
        assert_eq!(parsed.observations, vec!["3 hits"]);
    }
}
