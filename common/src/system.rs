//! Boundary between the core and the operating system's command-line tools.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::ToolError;

/// Captured report of a finished subprocess.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub success: bool,
    /// Standard output followed by standard error.
    pub text: String,
}

impl CommandOutput {
    pub fn new(success: bool, text: impl Into<String>) -> Self {
        Self {
            success,
            text: text.into(),
        }
    }
}

/// Runs an external program and returns its textual report.
///
/// Implementations must never block past `timeout` and must kill the child
/// when the deadline is reached.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(
        &self,
        program: &str,
        args: &[String],
        timeout: Duration,
    ) -> Result<CommandOutput, ToolError>;
}
