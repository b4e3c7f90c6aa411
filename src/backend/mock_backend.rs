//! Mock capabilities for testing

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    time::Duration,
};
use tokio::sync::Mutex;

use crate::backend::{Announcer, CommandExecutor, CommandOutput};
use crate::core::error::{CommandError, CommandResult};

/// Event log shared between mocks to check call ordering
pub type EventLog = Arc<std::sync::Mutex<Vec<String>>>;

/// Scripted result for commands containing a pattern
#[derive(Debug, Clone)]
pub enum MockOutcome {
    Output(CommandOutput),
    Fault(CommandError),
    Panic,
}

#[derive(Debug)]
struct MockState {
    outcomes: Vec<(String, MockOutcome)>,
    commands: Vec<String>,
    delay: Duration,
}

/// Mock command executor
///
/// Succeeds with an empty diagnostic unless an outcome is scripted for a
/// pattern contained in the command line. Detects overlapping executions.
#[derive(Debug, Clone)]
pub struct MockExecutor {
    inner: Arc<Mutex<MockState>>,
    active: Arc<AtomicUsize>,
    overlapped: Arc<AtomicBool>,
    log: EventLog,
}

impl MockExecutor {
    pub fn new() -> Self {
        Self::with_log(EventLog::default())
    }

    /// Create an executor recording into an existing event log
    pub fn with_log(log: EventLog) -> Self {
        Self {
            inner: Arc::new(Mutex::new(MockState {
                outcomes: vec![],
                commands: vec![],
                delay: Duration::ZERO,
            })),
            active: Arc::new(AtomicUsize::new(0)),
            overlapped: Arc::new(AtomicBool::new(false)),
            log,
        }
    }

    /// Script the outcome of commands containing `pattern`
    pub async fn set_outcome(&self, pattern: &str, outcome: MockOutcome) {
        self.inner
            .lock()
            .await
            .outcomes
            .push((pattern.to_string(), outcome));
    }

    /// Script a failing exit for commands containing `pattern`
    pub async fn set_failure(&self, pattern: &str, diagnostic: &str) {
        self.set_outcome(
            pattern,
            MockOutcome::Output(CommandOutput::failure(1, diagnostic)),
        )
        .await;
    }

    /// Make every command take `delay` to complete
    pub async fn set_delay(&self, delay: Duration) {
        self.inner.lock().await.delay = delay;
    }

    /// Command lines executed so far
    pub async fn commands(&self) -> Vec<String> {
        self.inner.lock().await.commands.clone()
    }

    /// True if two commands ever ran at the same time
    pub fn overlapped(&self) -> bool {
        self.overlapped.load(Ordering::SeqCst)
    }
}

impl Default for MockExecutor {
    fn default() -> Self {
        Self::new()
    }
}

struct ActiveGuard(Arc<AtomicUsize>);

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl CommandExecutor for MockExecutor {
    async fn execute(&self, command: &str) -> CommandResult<CommandOutput> {
        if self.active.fetch_add(1, Ordering::SeqCst) > 0 {
            self.overlapped.store(true, Ordering::SeqCst);
        }
        let _active = ActiveGuard(self.active.clone());

        let (outcome, delay) = {
            let mut state = self.inner.lock().await;
            state.commands.push(command.to_string());
            let outcome = state
                .outcomes
                .iter()
                .rev()
                .find(|(pattern, _)| command.contains(pattern.as_str()))
                .map(|(_, outcome)| outcome.clone());
            (outcome, state.delay)
        };

        if let Ok(mut log) = self.log.lock() {
            log.push(format!("execute:{}", command));
        }

        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        match outcome {
            None => Ok(CommandOutput::success("")),
            Some(MockOutcome::Output(output)) => Ok(output),
            Some(MockOutcome::Fault(error)) => Err(error),
            Some(MockOutcome::Panic) => panic!("mock command fault"),
        }
    }
}

/// Mock announcer counting advertisement transitions
#[derive(Debug, Clone, Default)]
pub struct MockAnnouncer {
    cancels: Arc<AtomicUsize>,
    announces: Arc<AtomicUsize>,
    log: EventLog,
}

impl MockAnnouncer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn log(&self) -> EventLog {
        self.log.clone()
    }

    pub fn events(&self) -> Vec<String> {
        self.log.lock().map(|log| log.clone()).unwrap_or_default()
    }

    pub fn cancels(&self) -> usize {
        self.cancels.load(Ordering::SeqCst)
    }

    pub fn announces(&self) -> usize {
        self.announces.load(Ordering::SeqCst)
    }
}

impl Announcer for MockAnnouncer {
    fn cancel_advertise(&self) {
        self.cancels.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut log) = self.log.lock() {
            log.push("cancel_advertise".to_string());
        }
    }

    fn advertise_and_announce(&self) {
        self.announces.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut log) = self.log.lock() {
            log.push("advertise_and_announce".to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_executor_default_success() {
        let executor = MockExecutor::new();
        let output = executor.execute("connect wlan0").await.unwrap();

        assert!(output.success);
        assert_eq!(executor.commands().await, vec!["connect wlan0".to_string()]);
    }

    #[tokio::test]
    async fn test_mock_executor_scripted_failure() {
        let executor = MockExecutor::new();
        executor.set_failure("connect", "no carrier").await;

        let output = executor.execute("connect wlan0").await.unwrap();
        assert!(!output.success);
        assert_eq!(output.diagnostic, "no carrier");

        let output = executor.execute("offboard").await.unwrap();
        assert!(output.success);
    }

    #[tokio::test]
    async fn test_mock_executor_fault() {
        let executor = MockExecutor::new();
        executor
            .set_outcome(
                "configure",
                MockOutcome::Fault(CommandError::SpawnFailed("gone".into())),
            )
            .await;

        assert!(executor.execute("configure x").await.is_err());
    }

    #[tokio::test]
    async fn test_mock_executor_detects_overlap() {
        let executor = MockExecutor::new();
        executor.set_delay(Duration::from_millis(20)).await;

        let (a, b) = tokio::join!(executor.execute("a"), executor.execute("b"));
        assert!(a.is_ok() && b.is_ok());
        assert!(executor.overlapped());
    }

    #[test]
    fn test_mock_announcer_counts() {
        let announcer = MockAnnouncer::new();
        announcer.cancel_advertise();
        announcer.advertise_and_announce();

        assert_eq!(announcer.cancels(), 1);
        assert_eq!(announcer.announces(), 1);
        assert_eq!(
            announcer.events(),
            vec!["cancel_advertise", "advertise_and_announce"]
        );
    }
}
