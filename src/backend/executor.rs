//! Process execution capability

use trait_variant::make;

use crate::core::error::CommandResult;

/// Result of one external command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    /// True if the command exited with status zero
    pub success: bool,
    /// Exit code, `None` if terminated by a signal
    pub code: Option<i32>,
    /// Diagnostic text produced by the command
    pub diagnostic: String,
}

impl CommandOutput {
    pub fn success(diagnostic: impl Into<String>) -> Self {
        Self {
            success: true,
            code: Some(0),
            diagnostic: diagnostic.into(),
        }
    }

    pub fn failure(code: i32, diagnostic: impl Into<String>) -> Self {
        Self {
            success: false,
            code: Some(code),
            diagnostic: diagnostic.into(),
        }
    }
}

/// Abstraction over the OS process execution primitive
///
/// Implementations run a fully rendered command line and report how it
/// exited. A `CommandError` means the command could not be run at all.
#[make(Send)]
pub trait CommandExecutor: Send + Sync + 'static {
    /// Execute a command line and wait for it to finish
    async fn execute(&self, command: &str) -> CommandResult<CommandOutput>;
}
