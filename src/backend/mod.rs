//! External capabilities consumed by the controller

pub mod announcer;
pub mod executor;
pub mod mock_backend;
pub mod shell_executor;

pub use announcer::{Announcer, TracingAnnouncer};
pub use executor::{CommandExecutor, CommandOutput};
pub use shell_executor::ShellExecutor;

#[cfg(test)]
pub use mock_backend::{MockAnnouncer, MockExecutor};
