//! Finance ReAct Agent
//!
//! A tool-using research agent for a finance dashboard:
//! - Drives a local completion backend through a Thought / Action / Observation loop
//! - Dispatches typed tools (search, sandboxed files, headless browser, price forecast, UI canvas)
//! - Streams progress events to callers and files unattended preset reports in shared memory
//!
//! AGENT LOOP:
//! PROMPT → COMPLETE → PARSE → { DISPATCH → OBSERVE → COMPLETE | FINAL ANSWER }

pub mod agent;
pub mod api;
pub mod canvas;
pub mod completion;
pub mod config;
pub mod error;
pub mod events;
pub mod memory;
pub mod models;
pub mod tools;

pub use error::Result;

// Re-export common types
pub use agent::{AgentFactory, LoopSettings, ReactAgent, TaskPreset};
pub use config::AgentConfig;
pub use events::{AgentEvent, LogSink};
pub use models::*;
