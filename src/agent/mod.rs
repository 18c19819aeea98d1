//! ReAct agent loop
//!
//! AWAIT MODEL → PARSE → { DISPATCH TOOL → AWAIT MODEL | FINAL | FALLBACK }
//!
//! One `run` is strictly sequential: each iteration awaits the completion
//! call, then at most one tool. Tool failures become observations; only a
//! failed completion call ends the run early.

pub mod background;
pub mod parser;
pub mod presets;
pub mod prompt;

pub use background::{spawn_preset_worker, supervise, PresetReport};
pub use parser::{next_step, parse_response, ParseError, ParsedResponse, Step};
pub use presets::TaskPreset;
pub use prompt::build_system_prompt;

use crate::completion::{CompletionBackend, OllamaClient, SamplingOptions};
use crate::config::AgentConfig;
use crate::error::AgentError;
use crate::events::{AgentEvent, LogSink};
use crate::memory::store::recent;
use crate::memory::{Conversation, FileMemoryStore, MemoryStore};
use crate::models::{AgentOutcome, Message, ObservationEnvelope, Termination, ToolInvocation};
use crate::tools::{create_default_registry, error_text, ToolRegistry};
use crate::Result;
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Answer returned when the iteration budget runs out
pub const TIMEOUT_MESSAGE: &str = "Agent timed out (max iterations reached).";

/// Synthetic turn sent when the model reasons without committing
pub const NUDGE_MESSAGE: &str = "Please continue to the Final Answer or specify an Action.";

pub const OBSERVATION_PREFIX: &str = "Observation: ";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopSettings {
    pub max_iterations: usize,
    /// Transcript entries replayed to the model per call
    pub history_window: usize,
    pub memory_tail_chars: usize,
}

impl Default for LoopSettings {
    fn default() -> Self {
        Self {
            max_iterations: 15,
            history_window: 10,
            memory_tail_chars: 3000,
        }
    }
}

impl From<&AgentConfig> for LoopSettings {
    fn from(config: &AgentConfig) -> Self {
        Self {
            max_iterations: config.max_iterations,
            history_window: config.history_window,
            memory_tail_chars: config.memory_tail_chars,
        }
    }
}

/// A ReAct agent owning one session conversation
pub struct ReactAgent {
    backend: Arc<dyn CompletionBackend>,
    tools: ToolRegistry,
    memory: Arc<dyn MemoryStore>,
    settings: LoopSettings,
    conversation: Conversation,
}

impl ReactAgent {
    pub fn new(
        backend: Arc<dyn CompletionBackend>,
        tools: ToolRegistry,
        memory: Arc<dyn MemoryStore>,
        settings: LoopSettings,
    ) -> Self {
        Self {
            backend,
            tools,
            memory,
            settings,
            conversation: Conversation::new(),
        }
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    pub fn settings(&self) -> LoopSettings {
        self.settings
    }

    /// Forget the session conversation
    pub fn reset(&mut self) {
        self.conversation.clear();
    }

    pub async fn run_preset(&mut self, preset: TaskPreset, sink: &dyn LogSink) -> AgentOutcome {
        info!(preset = %preset, "Running task preset");
        self.run(&preset.initial_prompt(), sink).await
    }

    /// Chat entry point: slash commands start presets, anything else is a prompt.
    pub async fn respond(&mut self, message: &str, sink: &dyn LogSink) -> AgentOutcome {
        match TaskPreset::from_command(message) {
            Some(preset) => self.run_preset(preset, sink).await,
            None => self.run(message, sink).await,
        }
    }

    /// Run the loop for one user message
    pub async fn run(&mut self, prompt: &str, sink: &dyn LogSink) -> AgentOutcome {
        info!(
            model = %self.backend.model(),
            chars = prompt.len(),
            history = self.conversation.len(),
            "Agent run started"
        );

        self.conversation.push(Message::user(prompt));
        let system = Message::system(self.system_prompt().await);
        let mut transcript: Vec<Message> = self.conversation.messages().to_vec();
        let options = SamplingOptions::default();

        for iteration in 1..=self.settings.max_iterations {
            sink.emit(AgentEvent::Thinking { iteration });

            let window = recent(&transcript, self.settings.history_window);
            let mut request = Vec::with_capacity(window.len() + 1);
            request.push(system.clone());
            request.extend_from_slice(window);

            debug!(iteration, messages = request.len(), "Requesting completion");

            let reply = match self.backend.complete(&request, &options).await {
                Ok(reply) => reply,
                Err(e) => {
                    error!(iteration, "Agent loop aborted: {}", e);
                    return AgentOutcome {
                        answer: format!("Agent loop error: {}", e),
                        termination: Termination::BackendError,
                        iterations: iteration,
                    };
                }
            };

            transcript.push(Message::assistant(reply.clone()));
            sink.emit(AgentEvent::ModelOutput {
                text: reply.clone(),
            });

            match next_step(&reply) {
                Step::Final(answer) => {
                    info!(iteration, "Final answer reached");
                    self.conversation.push(Message::assistant(answer.clone()));
                    sink.emit(AgentEvent::Final {
                        answer: answer.clone(),
                    });
                    return AgentOutcome {
                        answer,
                        termination: Termination::FinalAnswer,
                        iterations: iteration,
                    };
                }
                Step::Invoke(invocation) => {
                    sink.emit(AgentEvent::Action {
                        tool: invocation.tool_name.clone(),
                    });
                    let observation = self.dispatch(&invocation, sink).await;
                    self.observe(&mut transcript, observation, sink);
                }
                Step::Malformed(report) => {
                    warn!(iteration, "Malformed action: {}", report);
                    self.observe(&mut transcript, report, sink);
                }
                Step::Stalled => {
                    debug!(iteration, "No action or answer, nudging");
                    transcript.push(Message::user(NUDGE_MESSAGE));
                }
                Step::Unstructured(answer) => {
                    info!(iteration, "Reply ignored the protocol, returning it as the answer");
                    self.conversation.push(Message::assistant(answer.clone()));
                    sink.emit(AgentEvent::Final {
                        answer: answer.clone(),
                    });
                    return AgentOutcome {
                        answer,
                        termination: Termination::Unstructured,
                        iterations: iteration,
                    };
                }
            }
        }

        warn!(
            max_iterations = self.settings.max_iterations,
            "Iteration budget exhausted"
        );
        AgentOutcome {
            answer: TIMEOUT_MESSAGE.to_string(),
            termination: Termination::BudgetExhausted,
            iterations: self.settings.max_iterations,
        }
    }

    async fn system_prompt(&self) -> String {
        let memory = match self.memory.read_tail(self.settings.memory_tail_chars).await {
            Ok(tail) => tail,
            Err(e) => {
                warn!("Memory unavailable, continuing without it: {}", e);
                String::new()
            }
        };
        build_system_prompt(&self.tools, &memory)
    }

    fn observe(&self, transcript: &mut Vec<Message>, text: String, sink: &dyn LogSink) {
        transcript.push(Message::user(format!("{}{}", OBSERVATION_PREFIX, text)));
        sink.emit(AgentEvent::Observation { text });
    }

    /// Execute one tool call; every outcome is observation text.
    async fn dispatch(&self, invocation: &ToolInvocation, sink: &dyn LogSink) -> String {
        let Some(tool) = self.tools.find(&invocation.tool_name) else {
            warn!(tool = %invocation.tool_name, "Tool not found");
            return error_text(AgentError::ToolNotFound(invocation.tool_name.clone()));
        };

        info!(tool = %tool.name(), "Executing tool");

        let raw = match AssertUnwindSafe(tool.execute(&invocation.params))
            .catch_unwind()
            .await
        {
            Ok(output) => output,
            Err(panic) => {
                let reason = panic_message(panic.as_ref());
                error!(tool = %tool.name(), "Tool panicked: {}", reason);
                return error_text(format!("Execution failed: {}", reason));
            }
        };

        match ObservationEnvelope::parse(&raw) {
            Some(envelope) => {
                if let Some(path) = envelope.screenshot {
                    sink.emit(AgentEvent::Screenshot { path });
                }
                envelope.content_summary
            }
            None => raw,
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "tool panicked".to_string()
    }
}

/// Shared dependencies for building agents; each chat session and the
/// background worker get their own `ReactAgent`.
#[derive(Clone)]
pub struct AgentFactory {
    backend: Arc<dyn CompletionBackend>,
    tools: ToolRegistry,
    memory: Arc<dyn MemoryStore>,
    settings: LoopSettings,
}

impl AgentFactory {
    pub fn new(
        backend: Arc<dyn CompletionBackend>,
        tools: ToolRegistry,
        memory: Arc<dyn MemoryStore>,
        settings: LoopSettings,
    ) -> Self {
        Self {
            backend,
            tools,
            memory,
            settings,
        }
    }

    /// Wire the Ollama backend, file memory and default tools from configuration.
    pub async fn from_config(config: &AgentConfig) -> Result<Self> {
        let model = match &config.model {
            Some(model) => model.clone(),
            None => OllamaClient::discover_model(&config.backend_url).await,
        };
        info!(model = %model, backend = %config.backend_url, "Completion backend selected");

        let backend = Arc::new(OllamaClient::new(
            &config.backend_url,
            model,
            config.request_timeout,
        )?);
        let memory: Arc<dyn MemoryStore> = Arc::new(FileMemoryStore::new(&config.memory_path));
        let tools = create_default_registry(config, memory.clone())?;

        Ok(Self::new(backend, tools, memory, LoopSettings::from(config)))
    }

    pub fn memory(&self) -> Arc<dyn MemoryStore> {
        self.memory.clone()
    }

    pub fn build(&self) -> ReactAgent {
        ReactAgent::new(
            self.backend.clone(),
            self.tools.clone(),
            self.memory.clone(),
            self.settings,
        )
    }
}
