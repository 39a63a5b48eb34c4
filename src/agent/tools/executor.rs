//! Tool executor seam between the agent loop and the OS

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use super::{apply_patch, create_file, edit_file, run_command};
use crate::agent::protocol::ToolResult;
use crate::agent::safety::{SafetyConfig, SafetyError, SafetyValidator};

/// Executes validated actions for the agent loop.
///
/// Policy violations and operational failures come back as a failed
/// [`ToolResult`]; `Err` is reserved for faults of the executor itself.
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    /// Directory every action is scoped to
    fn working_dir(&self) -> &Path;

    async fn run_command(&self, cmd: &str, config: &SafetyConfig) -> Result<ToolResult, ToolError>;

    async fn apply_patch(&self, file: &str, patch: &str) -> Result<ToolResult, ToolError>;

    /// Dispatch an `edit` action, creating the file for a `/dev/null` patch
    async fn edit_file(&self, file: &str, patch: &str) -> Result<ToolResult, ToolError>;

    async fn create_file(&self, file: &str, content: &str) -> Result<ToolResult, ToolError>;
}

/// Runs tools in-process against a local working directory
#[derive(Debug, Clone)]
pub struct LocalToolExecutor {
    working_dir: PathBuf,
    validator: SafetyValidator,
}

impl LocalToolExecutor {
    /// Executor with the default safety policy
    pub fn new(working_dir: impl Into<PathBuf>) -> Self {
        Self::with_validator(working_dir, SafetyValidator::default())
    }

    pub fn with_validator(working_dir: impl Into<PathBuf>, validator: SafetyValidator) -> Self {
        Self {
            working_dir: working_dir.into(),
            validator,
        }
    }

    pub fn validator(&self) -> &SafetyValidator {
        &self.validator
    }
}

#[async_trait]
impl ToolExecutor for LocalToolExecutor {
    fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    async fn run_command(&self, cmd: &str, config: &SafetyConfig) -> Result<ToolResult, ToolError> {
        Ok(run_command(cmd, config, &self.validator, &self.working_dir).await)
    }

    async fn apply_patch(&self, file: &str, patch: &str) -> Result<ToolResult, ToolError> {
        Ok(apply_patch(file, patch, &self.validator, &self.working_dir).await)
    }

    async fn edit_file(&self, file: &str, patch: &str) -> Result<ToolResult, ToolError> {
        Ok(edit_file(file, patch, &self.validator, &self.working_dir).await)
    }

    async fn create_file(&self, file: &str, content: &str) -> Result<ToolResult, ToolError> {
        Ok(create_file(file, content, &self.validator, &self.working_dir).await)
    }
}

/// Errors that can occur during tool execution
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error(transparent)]
    Safety(#[from] SafetyError),

    #[error("File does not exist: {path}")]
    FileNotFound { path: String },

    #[error("File already exists: {path}")]
    FileExists { path: String },

    #[error("Failed to apply patch - patch format invalid or does not match file")]
    PatchFailed,

    #[error("Failed to spawn shell: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("Command timed out after {seconds}s")]
    CommandTimeout { seconds: u64 },

    #[error("IO error during {operation}: {source}")]
    IoError {
        operation: String,
        #[source]
        source: std::io::Error,
    },
}
