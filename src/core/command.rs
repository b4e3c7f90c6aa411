//! External configure/connect/offboard commands

use std::{fmt, sync::Arc};
use tracing::{debug, info, warn};

use crate::{
    backend::CommandExecutor,
    core::{
        persistence::StateStore,
        types::{LastError, PendingCredentials},
    },
};

/// Operations delegated to external commands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Configure,
    Connect,
    Offboard,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Operation::Configure => "configure",
            Operation::Connect => "connect",
            Operation::Offboard => "offboard",
        })
    }
}

/// Command line templates
///
/// `{ssid}`, `{passphrase}` and `{auth}` are replaced by the shell quoted
/// credential values. An unset template makes the operation a no-op.
#[derive(Debug, Clone, Default)]
pub struct CommandTemplates {
    pub configure: Option<String>,
    pub connect: Option<String>,
    pub offboard: Option<String>,
}

impl CommandTemplates {
    fn get(&self, operation: Operation) -> Option<&str> {
        match operation {
            Operation::Configure => self.configure.as_deref(),
            Operation::Connect => self.connect.as_deref(),
            Operation::Offboard => self.offboard.as_deref(),
        }
        .filter(|template| !template.trim().is_empty())
    }
}

/// Outcome of one operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExitResult {
    pub success: bool,
    pub diagnostic: String,
}

/// Runs the external commands and records their diagnostics
pub struct CommandRunner<E: CommandExecutor> {
    executor: Arc<E>,
    templates: CommandTemplates,
    store: StateStore,
}

impl<E: CommandExecutor> CommandRunner<E> {
    pub fn new(executor: Arc<E>, templates: CommandTemplates, store: StateStore) -> Self {
        Self {
            executor,
            templates,
            store,
        }
    }

    /// Run `operation` to completion
    ///
    /// Never fails: executor faults are reported as an unsuccessful result.
    /// The attempt's diagnostic is written to the error file either way.
    pub async fn run(
        &self,
        operation: Operation,
        args: Option<&PendingCredentials>,
    ) -> ExitResult {
        let Some(template) = self.templates.get(operation) else {
            warn!(%operation, "No command configured, skipping");
            return ExitResult {
                success: true,
                diagnostic: String::new(),
            };
        };

        info!(%operation, "Executing command");
        let command = render(template, args);

        let result = match self.executor.execute(&command).await {
            Ok(output) if output.success => ExitResult {
                success: true,
                diagnostic: output.diagnostic,
            },
            Ok(output) => {
                let diagnostic = if output.diagnostic.is_empty() {
                    match output.code {
                        Some(code) => format!("{} command failed with exit code {}", operation, code),
                        None => format!("{} command failed", operation),
                    }
                } else {
                    output.diagnostic
                };
                ExitResult {
                    success: false,
                    diagnostic,
                }
            }
            Err(e) => ExitResult {
                success: false,
                diagnostic: e.to_string(),
            },
        };
        debug!(%operation, success = result.success, diagnostic = %result.diagnostic, "Command finished");

        let record = if result.success {
            LastError {
                message: result.diagnostic.clone(),
                ..LastError::none()
            }
        } else {
            LastError::command_failed(result.diagnostic.clone())
        };
        if let Err(e) = self.store.save_error(&record).await {
            warn!("Failed to persist command diagnostic: {}", e);
        }

        result
    }
}

/// Substitute credential placeholders in a single pass
fn render(template: &str, args: Option<&PendingCredentials>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        rest = &rest[start..];

        let substitution = args.and_then(|args| {
            [
                ("{ssid}", args.ssid.as_str()),
                ("{passphrase}", args.passphrase.as_str()),
                ("{auth}", args.auth_type.as_str()),
            ]
            .into_iter()
            .find(|(placeholder, _)| rest.starts_with(placeholder))
        });

        match substitution {
            Some((placeholder, value)) => {
                out.push_str(&shell_quote(value));
                rest = &rest[placeholder.len()..];
            }
            None => {
                out.push('{');
                rest = &rest[1..];
            }
        }
    }

    out.push_str(rest);
    out
}

fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}
