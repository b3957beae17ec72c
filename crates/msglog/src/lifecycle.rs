//! Process lifecycle: cancellation, shutdown cause and ordered cleanup

use std::any::Any;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Run state of the bridge
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LifecycleState {
    Starting,
    Connected,
    ShuttingDown,
    Terminated,
}

/// Why shutdown began
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShutdownCause {
    /// Interrupt or termination signal
    Interrupted,
    /// Shutdown requested by the embedding program
    Requested,
    /// The gateway session ended without error
    SessionEnded,
    /// The gateway session failed
    ConnectionFailed(String),
}

impl ShutdownCause {
    pub fn is_failure(&self) -> bool {
        matches!(self, ShutdownCause::ConnectionFailed(_))
    }
}

impl fmt::Display for ShutdownCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShutdownCause::Interrupted => f.write_str("interrupted"),
            ShutdownCause::Requested => f.write_str("requested"),
            ShutdownCause::SessionEnded => f.write_str("session ended"),
            ShutdownCause::ConnectionFailed(reason) => write!(f, "connection failed: {}", reason),
        }
    }
}

/// Teardown step callback type
pub type CleanupFn = Box<dyn FnOnce() -> anyhow::Result<()> + Send>;

struct CleanupAction {
    name: String,
    run: CleanupFn,
}

/// Outcome of a teardown
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TeardownReport {
    /// Cleanup actions in execution order
    pub executed: Vec<String>,
    /// Cleanup actions that returned an error or panicked
    pub failed: Vec<String>,
}

struct LifecycleInner {
    state: Mutex<LifecycleState>,
    cause: Mutex<Option<ShutdownCause>>,
    cleanup: Mutex<Vec<CleanupAction>>,
    cancel: CancellationToken,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Owns the run's cancellation token and its cleanup stack
///
/// Cleanup actions are registered during setup and run exactly once during
/// teardown, last registered first. A failing action never prevents the
/// remaining ones from running.
#[derive(Clone)]
pub struct LifecycleManager {
    inner: Arc<LifecycleInner>,
}

impl Default for LifecycleManager {
    fn default() -> Self {
        Self::new()
    }
}

impl LifecycleManager {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(LifecycleInner {
                state: Mutex::new(LifecycleState::Starting),
                cause: Mutex::new(None),
                cleanup: Mutex::new(Vec::new()),
                cancel: CancellationToken::new(),
            }),
        }
    }

    /// Token cancelled when shutdown begins
    pub fn token(&self) -> CancellationToken {
        self.inner.cancel.clone()
    }

    pub fn state(&self) -> LifecycleState {
        *lock(&self.inner.state)
    }

    /// Whether shutdown has begun
    pub fn is_shutting_down(&self) -> bool {
        self.state() >= LifecycleState::ShuttingDown
    }

    /// The first recorded shutdown cause
    pub fn cause(&self) -> Option<ShutdownCause> {
        lock(&self.inner.cause).clone()
    }

    /// Wait until shutdown begins
    pub async fn cancelled(&self) {
        self.inner.cancel.cancelled().await
    }

    /// Record that the gateway session is established.
    ///
    /// Returns `false` if the run is not starting any more (reconnects, or
    /// shutdown already underway).
    pub fn mark_connected(&self) -> bool {
        let mut state = lock(&self.inner.state);
        if *state != LifecycleState::Starting {
            return false;
        }
        *state = LifecycleState::Connected;
        true
    }

    /// Begin shutdown with `cause`.
    ///
    /// Only the first cause is kept and cancellation happens once. Returns `true` if this call started the
    /// shutdown.
    pub fn shutdown(&self, cause: ShutdownCause) -> bool {
        {
            let mut state = lock(&self.inner.state);
            if *state >= LifecycleState::ShuttingDown {
                tracing::debug!(cause = %cause, "Shutdown already in progress");
                return false;
            }
            // cause is visible before the new state is
            *lock(&self.inner.cause) = Some(cause.clone());
            *state = LifecycleState::ShuttingDown;
        }

        tracing::info!(cause = %cause, "Shutting down");
        self.inner.cancel.cancel();
        true
    }

    /// Register a teardown step
    ///
    /// Steps registered while teardown runs are run by that teardown, next
    /// in line. Steps registered after teardown completed run immediately.
    pub fn register_cleanup<F>(&self, name: impl Into<String>, action: F)
    where
        F: FnOnce() -> anyhow::Result<()> + Send + 'static,
    {
        let action = CleanupAction {
            name: name.into(),
            run: Box::new(action),
        };

        let mut cleanup = lock(&self.inner.cleanup);
        if self.state() == LifecycleState::Terminated {
            drop(cleanup);
            tracing::warn!(cleanup = %action.name, "Cleanup registered after teardown, running now");
            Self::run_action(action);
            return;
        }

        cleanup.push(action);
    }

    /// Number of pending teardown steps
    pub fn pending_cleanups(&self) -> usize {
        lock(&self.inner.cleanup).len()
    }

    /// Run every registered cleanup action in reverse registration order.
    ///
    /// Starts shutdown with [`ShutdownCause::Requested`] if nothing else did.
    /// A second call finds the stack drained and does nothing.
    pub fn teardown(&self) -> TeardownReport {
        self.shutdown(ShutdownCause::Requested);

        let mut report = TeardownReport::default();

        loop {
            // Terminated is set under the cleanup lock so no registration
            // can land on a stack that is no longer drained.
            let next = {
                let mut cleanup = lock(&self.inner.cleanup);
                let next = cleanup.pop();
                if next.is_none() {
                    *lock(&self.inner.state) = LifecycleState::Terminated;
                }
                next
            };
            let Some(action) = next else { break };

            let name = action.name.clone();
            if !Self::run_action(action) {
                report.failed.push(name.clone());
            }
            report.executed.push(name);
        }

        tracing::debug!(
            executed = report.executed.len(),
            failed = report.failed.len(),
            "Teardown complete"
        );
        report
    }

    fn run_action(action: CleanupAction) -> bool {
        let CleanupAction { name, run } = action;
        match catch_unwind(AssertUnwindSafe(run)) {
            Ok(Ok(())) => {
                tracing::debug!(cleanup = %name, "Cleanup done");
                true
            }
            Ok(Err(e)) => {
                tracing::warn!(cleanup = %name, error = %e, "Cleanup failed");
                false
            }
            Err(payload) => {
                tracing::warn!(cleanup = %name, panic = %panic_message(payload.as_ref()), "Cleanup panicked");
                false
            }
        }
    }

    /// Start shutdown on Ctrl+C or SIGTERM.
    ///
    /// The listener exits on its own once shutdown begins for any other reason.
    pub fn spawn_signal_listener(&self) -> JoinHandle<()> {
        let lifecycle = self.clone();
        tokio::spawn(async move {
            let ctrl_c = async {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    tracing::error!(error = %e, "Failed to install Ctrl+C handler");
                    std::future::pending::<()>().await;
                }
            };

            #[cfg(unix)]
            let terminate = async {
                match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                    Ok(mut signal) => {
                        signal.recv().await;
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Failed to install SIGTERM handler");
                        std::future::pending::<()>().await;
                    }
                }
            };

            #[cfg(not(unix))]
            let terminate = std::future::pending::<()>();

            let token = lifecycle.token();
            tokio::select! {
                _ = token.cancelled() => return,
                _ = ctrl_c => tracing::info!("Received Ctrl+C"),
                _ = terminate => tracing::info!("Received SIGTERM"),
            }

            lifecycle.shutdown(ShutdownCause::Interrupted);
        })
    }
}
