//! Onboarding state machine
//!
//! Owns the onboarding state, the staged credentials and the last error, and
//! sequences advertisement suspension and the external commands for every
//! WiFi transition.

use std::{any::Any, path::PathBuf, sync::Arc};

use futures::FutureExt;
use tokio::sync::{Mutex, RwLock, mpsc, oneshot, watch};
use tracing::{debug, error, info, warn};

use crate::{
    backend::{Announcer, CommandExecutor},
    core::{
        advertisement::AdvertisementGuard,
        api::OnboardingApi,
        command::{CommandRunner, CommandTemplates, ExitResult, Operation},
        credentials,
        error::{OnboardingError, OnboardingResult},
        persistence::StateStore,
        scanner::ScanService,
        types::{
            AuthType, ConcurrencyMode, ConfigureStatus, LastError, OnboardingState,
            PendingCredentials, ScanInfo,
        },
    },
};

/// Construction parameters for [`OnboardingController`]
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    pub scan_file: Option<PathBuf>,
    pub state_file: Option<PathBuf>,
    pub error_file: Option<PathBuf>,
    pub commands: CommandTemplates,
    pub concurrency: ConcurrencyMode,
}

/// State, staged credentials and last error; always updated together
#[derive(Debug)]
struct Machine {
    state: OnboardingState,
    pending: Option<PendingCredentials>,
    last_error: LastError,
}

struct Shared<E: CommandExecutor, A: Announcer> {
    machine: RwLock<Machine>,
    // Serializes state file writes
    persist: Mutex<()>,
    runner: CommandRunner<E>,
    announcer: Arc<A>,
    store: StateStore,
}

#[derive(Debug)]
enum Transition {
    Connect(PendingCredentials),
    Offboard,
}

/// A queued transition; `done` is set when the caller waits for it
struct Job {
    transition: Transition,
    done: Option<oneshot::Sender<()>>,
    ticket: InFlight,
}

/// Counts a transition from enqueue until it finishes
struct InFlight(Arc<watch::Sender<usize>>);

impl InFlight {
    fn start(counter: &Arc<watch::Sender<usize>>) -> Self {
        counter.send_modify(|n| *n += 1);
        Self(counter.clone())
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.send_modify(|n| *n -= 1);
    }
}

/// WiFi onboarding controller
///
/// `connect` and `offboard` enqueue their transition on a single worker task
/// which runs them one at a time in call order. In single threaded mode the
/// caller then waits for its transition to finish; in multi threaded mode the
/// call returns immediately. A caller that stops waiting does not cancel the
/// transition.
pub struct OnboardingController<E: CommandExecutor, A: Announcer> {
    shared: Arc<Shared<E, A>>,
    scanner: ScanService,
    concurrency: ConcurrencyMode,
    queue: mpsc::UnboundedSender<Job>,
    in_flight: Arc<watch::Sender<usize>>,
}

impl<E: CommandExecutor, A: Announcer> OnboardingController<E, A> {
    /// Create a controller, restoring the persisted state and last error
    ///
    /// Spawns the transition worker, so this must run inside a tokio runtime.
    pub async fn new(
        config: ControllerConfig,
        executor: Arc<E>,
        announcer: Arc<A>,
    ) -> OnboardingResult<Self> {
        let store = StateStore::new(config.state_file, config.error_file);
        let state = store.load_state().await?;
        let last_error = store.load_error().await?;
        info!(?state, ?last_error, concurrency = ?config.concurrency, "Onboarding controller created");

        let runner = CommandRunner::new(executor, config.commands, store.clone());
        let shared = Arc::new(Shared {
            machine: RwLock::new(Machine {
                state,
                pending: None,
                last_error,
            }),
            persist: Mutex::new(()),
            runner,
            announcer,
            store,
        });

        let (queue, jobs) = mpsc::unbounded_channel();
        tokio::spawn(run_transitions(shared.clone(), jobs));
        let (in_flight, _) = watch::channel(0);

        Ok(Self {
            shared,
            scanner: ScanService::new(config.scan_file),
            concurrency: config.concurrency,
            queue,
            in_flight: Arc::new(in_flight),
        })
    }

    pub fn concurrency(&self) -> ConcurrencyMode {
        self.concurrency
    }

    /// Scan data service backing `scan_info`
    pub fn scanner(&self) -> &ScanService {
        &self.scanner
    }

    /// Wait until no transition is queued or running
    pub async fn wait_idle(&self) {
        let mut idle = self.in_flight.subscribe();
        if idle.wait_for(|n| *n == 0).await.is_err() {
            warn!("Transition tracking closed");
        }
    }

    /// Enqueue `transition`; in single threaded mode also wait for it
    ///
    /// The job is queued before the first await, so transitions issued one
    /// after the other by a caller run in that order.
    async fn transition(&self, transition: Transition) {
        let (done, finished) = match self.concurrency {
            ConcurrencyMode::SingleThreaded => {
                let (done, finished) = oneshot::channel();
                (Some(done), Some(finished))
            }
            ConcurrencyMode::MultiThreaded => (None, None),
        };

        let job = Job {
            transition,
            done,
            ticket: InFlight::start(&self.in_flight),
        };
        if let Err(rejected) = self.queue.send(job) {
            error!(transition = ?rejected.0.transition, "Transition worker is gone");
            return;
        }

        if let Some(finished) = finished {
            if finished.await.is_err() {
                error!("Transition worker stopped before finishing");
            }
        }
    }
}

/// Worker draining the transition queue until the controller is dropped
async fn run_transitions<E: CommandExecutor, A: Announcer>(
    shared: Arc<Shared<E, A>>,
    mut jobs: mpsc::UnboundedReceiver<Job>,
) {
    while let Some(job) = jobs.recv().await {
        match job.transition {
            Transition::Connect(creds) => shared.connect(creds).await,
            Transition::Offboard => shared.offboard().await,
        }
        drop(job.ticket);
        if let Some(done) = job.done {
            if done.send(()).is_err() {
                debug!("Caller stopped waiting for the transition");
            }
        }
    }
    debug!("Transition queue closed");
}

impl<E: CommandExecutor, A: Announcer> Shared<E, A> {
    /// Run `work` with advertisement suspended
    ///
    /// A panic inside `work` is turned into a failed result and recorded in
    /// the error file; the guard is released before this returns in every
    /// case.
    async fn guarded<Fut>(&self, work: Fut) -> ExitResult
    where
        Fut: Future<Output = ExitResult>,
    {
        let guard = AdvertisementGuard::enter(self.announcer.clone());
        let result = match std::panic::AssertUnwindSafe(work).catch_unwind().await {
            Ok(result) => result,
            Err(panic) => {
                let diagnostic = panic_message(&*panic);
                error!("Command runner fault: {}", diagnostic);
                let record = LastError::command_failed(diagnostic.clone());
                if let Err(e) = self.store.save_error(&record).await {
                    warn!("Failed to persist command fault: {}", e);
                }
                ExitResult {
                    success: false,
                    diagnostic,
                }
            }
        };
        drop(guard);
        result
    }

    async fn connect(&self, creds: PendingCredentials) {
        info!(ssid = %creds.ssid, auth = %creds.auth_type, "Connecting");

        let result = self
            .guarded(async {
                let configured = self.runner.run(Operation::Configure, Some(&creds)).await;
                if !configured.success {
                    return configured;
                }
                self.runner.run(Operation::Connect, Some(&creds)).await
            })
            .await;

        {
            let mut machine = self.machine.write().await;
            if result.success {
                apply(&mut machine, OnboardingState::Connected, LastError::none());
            } else {
                warn!(ssid = %creds.ssid, diagnostic = %result.diagnostic, "Connect failed");
                apply(
                    &mut machine,
                    OnboardingState::Error,
                    LastError::command_failed(result.diagnostic),
                );
            }
        }
        self.persist_state().await;
    }

    async fn offboard(&self) {
        info!("Offboarding");

        let result = self
            .guarded(self.runner.run(Operation::Offboard, None))
            .await;

        {
            let mut machine = self.machine.write().await;
            if result.success {
                machine.pending = None;
                apply(&mut machine, OnboardingState::NotConfigured, LastError::none());
            } else {
                warn!(diagnostic = %result.diagnostic, "Offboard failed");
                apply(
                    &mut machine,
                    OnboardingState::Error,
                    LastError::command_failed(result.diagnostic),
                );
            }
        }
        self.persist_state().await;
    }

    /// Write the current state to the state file
    ///
    /// Reads the state under the write serializer so the last write always
    /// carries the latest state.
    async fn persist_state(&self) {
        let _io = self.persist.lock().await;
        let state = self.machine.read().await.state;
        if let Err(e) = self.store.save_state(state).await {
            warn!("Failed to persist state: {}", e);
        }
    }
}

fn apply(machine: &mut Machine, state: OnboardingState, last_error: LastError) {
    if machine.state != state {
        info!(from = ?machine.state, to = ?state, "State changed");
    }
    machine.state = state;
    machine.last_error = last_error;
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        format!("command runner fault: {}", message)
    } else if let Some(message) = panic.downcast_ref::<String>() {
        format!("command runner fault: {}", message)
    } else {
        "command runner fault".to_string()
    }
}

impl<E: CommandExecutor, A: Announcer> OnboardingApi for OnboardingController<E, A> {
    async fn configure_wifi(
        &self,
        ssid: &str,
        passphrase: &str,
        auth_type: i16,
    ) -> OnboardingResult<ConfigureStatus> {
        info!(ssid, auth_type, "ConfigureWiFi");

        let auth_type = credentials::parse_auth_type(auth_type)?;
        credentials::validate_ssid(ssid)?;
        let scanned = match auth_type {
            AuthType::Any => self.scanner.auth_type_of(ssid).await,
            _ => None,
        };
        let creds = credentials::resolve(ssid, passphrase, auth_type, scanned)
            .inspect_err(|e| warn!(ssid, "Rejected credentials: {}", e))?;

        {
            let mut machine = self.shared.machine.write().await;
            machine.pending = Some(creds);
            // Staging is not an outcome; the last error stays visible
            let last_error = machine.last_error.clone();
            apply(&mut machine, OnboardingState::ConfiguredNotValidated, last_error);
        }
        self.shared.persist_state().await;

        Ok(ConfigureStatus::from(self.concurrency))
    }

    async fn connect(&self) -> OnboardingResult<()> {
        let creds = self.shared.machine.write().await.pending.take();
        let Some(creds) = creds else {
            warn!("Connect requested without pending credentials");
            return Err(OnboardingError::NoPendingCredentials);
        };

        self.transition(Transition::Connect(creds)).await;
        Ok(())
    }

    async fn offboard(&self) {
        self.transition(Transition::Offboard).await;
    }

    async fn state(&self) -> OnboardingState {
        self.shared.machine.read().await.state
    }

    async fn last_error(&self) -> LastError {
        self.shared.machine.read().await.last_error.clone()
    }

    async fn scan_info(&self) -> ScanInfo {
        self.scanner.scan_info().await
    }
}
