//! Sandboxed file read/write tools
//!
//! Writes always land directly inside the sandbox directory: only the
//! final path component of the requested filename is kept.

use super::{require_str, soft_fail, Tool};
use crate::error::AgentError;
use crate::models::ToolParams;
use crate::Result;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct FileSandbox {
    root: PathBuf,
}

impl FileSandbox {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map any requested name to `<root>/<base name>`.
    pub fn confine(&self, filename: &str) -> Result<PathBuf> {
        let base = filename
            .rsplit(['/', '\\'])
            .next()
            .map(str::trim)
            .unwrap_or_default();

        if base.is_empty() || base == "." || base == ".." {
            return Err(AgentError::InvalidToolInput(format!(
                "'{}' does not name a file",
                filename
            )));
        }

        Ok(self.root.join(base))
    }
}

pub struct FileWriteTool {
    sandbox: FileSandbox,
}

impl FileWriteTool {
    pub fn new(sandbox: FileSandbox) -> Self {
        Self { sandbox }
    }

    async fn write(&self, params: &ToolParams) -> Result<String> {
        let filename = require_str(params, "filename")?;
        let content = params
            .get("content")
            .and_then(|v| v.as_str())
            .ok_or_else(|| {
                AgentError::InvalidToolInput("'filename' and 'content' required".to_string())
            })?;

        let target = self.sandbox.confine(filename)?;
        fs::create_dir_all(self.sandbox.root()).await?;
        fs::write(&target, content)
            .await
            .map_err(|e| AgentError::ToolError(format!("Write failed: {}", e)))?;

        info!(path = %target.display(), bytes = content.len(), "File written");
        Ok(format!("Successfully saved to {}", target.display()))
    }
}

#[async_trait::async_trait]
impl Tool for FileWriteTool {
    fn name(&self) -> &str {
        "write_file"
    }

    fn description(&self) -> &str {
        "Write content to a file. Params: 'filename', 'content'. Files are always saved in the reports folder."
    }

    async fn execute(&self, params: &ToolParams) -> String {
        soft_fail(self.write(params).await)
    }
}

pub struct FileReadTool {
    sandbox: FileSandbox,
    /// Allow reading the literal path when the sandbox has no such file.
    /// Off by default: it bypasses the confinement writes get.
    allow_fallback: bool,
}

impl FileReadTool {
    pub fn new(sandbox: FileSandbox, allow_fallback: bool) -> Self {
        Self {
            sandbox,
            allow_fallback,
        }
    }

    async fn read(&self, params: &ToolParams) -> Result<String> {
        let filename = require_str(params, "filename")?;

        let confined = self.sandbox.confine(filename)?;
        let target = if fs::try_exists(&confined).await.unwrap_or(false) {
            confined
        } else if self.allow_fallback && fs::try_exists(filename).await.unwrap_or(false) {
            warn!(path = filename, "Reading outside the sandbox");
            PathBuf::from(filename)
        } else {
            return Err(AgentError::ToolError(format!(
                "File {} not found in reports archive.",
                filename
            )));
        };

        fs::read_to_string(&target)
            .await
            .map_err(|e| AgentError::ToolError(format!("Read failed: {}", e)))
    }
}

#[async_trait::async_trait]
impl Tool for FileReadTool {
    fn name(&self) -> &str {
        "read_file"
    }

    fn description(&self) -> &str {
        "Read content of a file. Param: 'filename'. Looks in the reports folder."
    }

    async fn execute(&self, params: &ToolParams) -> String {
        soft_fail(self.read(params).await)
    }
}
