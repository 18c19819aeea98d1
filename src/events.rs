//! Agent events and log sinks
//!
//! Events are UI hints emitted as the loop progresses. Sinks are a side
//! channel: dropping an event never changes what the loop does next.

use crate::canvas::render_canvas;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, info};

/// Prefix marking a screenshot path in the line-based log protocol
pub const SCREENSHOT_MARKER: &str = "SCREENSHOT:";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AgentEvent {
    Thinking { iteration: usize },
    ModelOutput { text: String },
    Action { tool: String },
    Observation { text: String },
    Screenshot { path: String },
    Final { answer: String },
}

impl AgentEvent {
    /// Human-readable rendering for string-callback consumers.
    pub fn to_log_line(&self) -> String {
        match self {
            AgentEvent::Thinking { .. } => "Thinking...".to_string(),
            AgentEvent::ModelOutput { text } => format!("**Model Output**:\n{}\n", text),
            AgentEvent::Action { tool } => format!("**Executing Tool**: `{}`", tool),
            AgentEvent::Observation { text } => match render_canvas(text) {
                Some(markdown) => format!("**Canvas**:\n{}\n", markdown),
                None => format!("**Observation**:\n{}\n", text),
            },
            AgentEvent::Screenshot { path } => format!("{}{}", SCREENSHOT_MARKER, path),
            AgentEvent::Final { answer } => format!("**Final Answer**:\n{}\n", answer),
        }
    }
}

/// One line received by a string-callback consumer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogLine {
    Screenshot(PathBuf),
    Text(String),
}

impl LogLine {
    /// Recognise the screenshot marker and strip it.
    pub fn parse(line: &str) -> Self {
        match line.strip_prefix(SCREENSHOT_MARKER) {
            Some(path) => LogLine::Screenshot(PathBuf::from(path.trim())),
            None => LogLine::Text(line.to_string()),
        }
    }
}

/// Consumer of agent events
pub trait LogSink: Send + Sync {
    fn emit(&self, event: AgentEvent);
}

impl<F> LogSink for F
where
    F: Fn(AgentEvent) + Send + Sync,
{
    fn emit(&self, event: AgentEvent) {
        self(event)
    }
}

/// Mirrors events into tracing; used for unattended runs
pub struct TracingSink {
    pub label: String,
}

impl TracingSink {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
        }
    }
}

impl LogSink for TracingSink {
    fn emit(&self, event: AgentEvent) {
        match &event {
            AgentEvent::Thinking { iteration } => {
                debug!(run = %self.label, iteration, "Agent thinking")
            }
            AgentEvent::ModelOutput { text } => {
                debug!(run = %self.label, chars = text.len(), "Model output received")
            }
            AgentEvent::Action { tool } => info!(run = %self.label, tool = %tool, "Executing tool"),
            AgentEvent::Observation { text } => {
                debug!(run = %self.label, chars = text.len(), "Observation recorded")
            }
            AgentEvent::Screenshot { path } => info!(run = %self.label, path = %path, "Screenshot captured"),
            AgentEvent::Final { .. } => info!(run = %self.label, "Final answer produced"),
        }
    }
}

/// Forwards events to an async receiver. Once the receiver is gone events are dropped.
#[derive(Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<AgentEvent>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<AgentEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl LogSink for ChannelSink {
    fn emit(&self, event: AgentEvent) {
        let _ = self.tx.send(event);
    }
}

/// Buffers events for callers that report them after the run
#[derive(Default)]
pub struct CollectingSink {
    events: Mutex<Vec<AgentEvent>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<AgentEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    pub fn into_events(self) -> Vec<AgentEvent> {
        self.events.into_inner().unwrap_or_default()
    }
}

impl LogSink for CollectingSink {
    fn emit(&self, event: AgentEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

/// Adapts a single-argument string callback to the event stream
pub struct LineSink<F> {
    callback: F,
}

impl<F> LineSink<F>
where
    F: Fn(String) + Send + Sync,
{
    pub fn new(callback: F) -> Self {
        Self { callback }
    }
}

impl<F> LogSink for LineSink<F>
where
    F: Fn(String) + Send + Sync,
{
    fn emit(&self, event: AgentEvent) {
        (self.callback)(event.to_log_line())
    }
}
