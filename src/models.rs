//! Core data models for the agent loop

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

//
// ================= Conversation =================
//

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

//
// ================= Tool I/O =================
//

/// Parameters handed to a tool, always a JSON object
pub type ToolParams = Map<String, Value>;

/// A tool call parsed out of one model reply. Never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolInvocation {
    pub tool_name: String,
    pub params: ToolParams,
}

/// Structured tool result. Tools that produce more than text (the browser)
/// serialize this shape; the loop unwraps `content_summary` as the observation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ObservationEnvelope {
    pub content_summary: String,
    #[serde(default)]
    pub screenshot: Option<String>,
}

impl ObservationEnvelope {
    /// Returns `None` for anything that is not a JSON object carrying `content_summary`.
    pub fn parse(raw: &str) -> Option<Self> {
        serde_json::from_str(raw.trim()).ok()
    }
}

//
// ================= Outcome =================
//

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    /// The model emitted an explicit `Final Answer:`
    FinalAnswer,
    /// The model ignored the protocol; its whole reply is the answer
    Unstructured,
    /// The iteration budget ran out
    BudgetExhausted,
    /// The completion call failed and the loop stopped
    BackendError,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentOutcome {
    pub answer: String,
    pub termination: Termination,
    pub iterations: usize,
}

impl AgentOutcome {
    pub fn is_final_answer(&self) -> bool {
        self.termination == Termination::FinalAnswer
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        };
        write!(f, "{}", s)
    }
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Termination::FinalAnswer => "final answer",
            Termination::Unstructured => "unstructured reply",
            Termination::BudgetExhausted => "iteration budget exhausted",
            Termination::BackendError => "backend error",
        };
        write!(f, "{}", s)
    }
}
