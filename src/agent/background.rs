//! Background preset worker
//!
//! Runs presets unattended on its own agent and files each report in the
//! shared memory. Failures travel back through the `JoinHandle`; `supervise`
//! logs them through tracing like any foreground error.

use super::{ReactAgent, TaskPreset};
use crate::error::AgentError;
use crate::events::TracingSink;
use crate::memory::MemoryStore;
use crate::models::{AgentOutcome, Termination};
use crate::Result;
use serde::Serialize;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Serialize)]
pub struct PresetReport {
    pub preset: TaskPreset,
    pub outcome: AgentOutcome,
}

/// Run `presets` in order, each on a fresh conversation.
/// A backend failure stops the worker; nothing is written for that preset.
pub fn spawn_preset_worker(
    mut agent: ReactAgent,
    memory: Arc<dyn MemoryStore>,
    presets: Vec<TaskPreset>,
) -> JoinHandle<Result<Vec<PresetReport>>> {
    tokio::spawn(async move {
        let mut reports = Vec::with_capacity(presets.len());

        for preset in presets {
            agent.reset();
            let sink = TracingSink::new(preset.name());
            let outcome = agent.run_preset(preset, &sink).await;

            if outcome.termination == Termination::BackendError {
                return Err(AgentError::Backend(format!(
                    "{} preset failed: {}",
                    preset, outcome.answer
                )));
            }

            memory.append(preset.memory_label(), &outcome.answer).await?;
            info!(
                preset = %preset,
                termination = %outcome.termination,
                iterations = outcome.iterations,
                "Background preset filed"
            );
            reports.push(PresetReport { preset, outcome });
        }

        Ok(reports)
    })
}

/// Await the worker and log how it ended.
pub async fn supervise(handle: JoinHandle<Result<Vec<PresetReport>>>) -> Option<Vec<PresetReport>> {
    match handle.await {
        Ok(Ok(reports)) => {
            info!(count = reports.len(), "Background presets complete");
            Some(reports)
        }
        Ok(Err(e)) => {
            error!("Background preset worker failed: {}", e);
            None
        }
        Err(e) if e.is_panic() => {
            error!("Background preset worker panicked: {}", e);
            None
        }
        Err(e) => {
            warn!("Background preset worker cancelled: {}", e);
            None
        }
    }
}
