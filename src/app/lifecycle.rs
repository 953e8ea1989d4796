//! The lifecycle coordinator.
//!
//! `drive` walks a control plane through its whole life: ordered fallible
//! setup, the blocking run phase, watch cancellation, a bounded drain, and
//! the concurrent finalizer cleanup, finally resolving the process exit
//! status. The [`ControlPlane`] seam keeps the coordinator independent of
//! the concrete subsystems, which is also what the end-to-end tests drive
//! with scripted implementations.

use std::process::ExitCode;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{oneshot, watch};
use tracing::{debug, error, info, warn};

use crate::error::{Result, SetupError};

/// Grace period between the run loop returning and cleanup starting.
///
/// The run loop cannot join the work its subsystems spawned internally, so
/// a bounded wait stands in for a real join. Overridable through
/// `[lifecycle] drain_grace_secs`.
pub const DRAIN_GRACE: Duration = Duration::from_secs(5);

/// Tunables for [`drive`].
#[derive(Debug, Clone)]
pub struct LifecycleOptions {
    pub drain_grace: Duration,
}

impl Default for LifecycleOptions {
    fn default() -> Self {
        Self {
            drain_grace: DRAIN_GRACE,
        }
    }
}

/// Completion signals of the two cleanup workers, one per marked resource
/// class.
pub struct CleanupWait {
    pub sync: oneshot::Receiver<()>,
    pub templates: oneshot::Receiver<()>,
}

/// Final process outcome.
///
/// Failed covers a setup failure or a run failure; cleanup-phase errors are
/// logged but deliberately do not surface here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    Clean,
    Failed,
}

impl From<ExitStatus> for ExitCode {
    fn from(status: ExitStatus) -> Self {
        match status {
            ExitStatus::Clean => ExitCode::SUCCESS,
            ExitStatus::Failed => ExitCode::from(1),
        }
    }
}

/// Everything the coordinator drives, in the order it drives it.
#[async_trait]
pub trait ControlPlane: Send {
    /// All ordered setup steps. The first failure aborts startup; nothing
    /// later (including cleanup) runs in that case.
    async fn register(&mut self) -> Result<(), SetupError>;

    /// The blocking run phase; returns when the shutdown signal flips, or
    /// earlier with an error.
    async fn run(&mut self, shutdown: watch::Receiver<bool>) -> Result<()>;

    /// Cancel the watch lifetime. Called exactly once, immediately after
    /// `run` returns, whatever `run` returned.
    fn cancel_watches(&mut self);

    /// Construct the fresh cleanup client and launch both finalizer
    /// workers concurrently.
    async fn start_cleanup(&mut self) -> Result<CleanupWait>;
}

/// Walk the control plane from startup to exit status.
pub async fn drive<P: ControlPlane>(
    plane: &mut P,
    shutdown: watch::Receiver<bool>,
    options: &LifecycleOptions,
) -> ExitStatus {
    if let Err(e) = plane.register().await {
        error!(phase = e.phase(), error = %e, "Startup failed");
        return ExitStatus::Failed;
    }

    info!("Control plane running");
    let run_error = plane.run(shutdown).await.err();
    if let Some(e) = &run_error {
        error!(error = %e, "Run loop returned an error");
    }

    // Watches outlive the run loop by design; their lifetime ends here and
    // only here.
    plane.cancel_watches();

    debug!(grace = ?options.drain_grace, "Draining in-flight work");
    tokio::time::sleep(options.drain_grace).await;

    info!("Removing finalizers");
    let wait = match plane.start_cleanup().await {
        Ok(wait) => wait,
        Err(e) => {
            error!(error = %e, "Unable to start finalizer cleanup");
            return ExitStatus::Failed;
        }
    };

    // Block on both workers; each signals unconditionally, so a receive
    // error can only mean the worker died before its guard fired.
    let (sync, templates) = tokio::join!(wait.sync, wait.templates);
    if sync.is_err() {
        warn!("Sync cleanup worker vanished without signalling");
    }
    if templates.is_err() {
        warn!("Template cleanup worker vanished without signalling");
    }
    info!("Finalizers removed");

    if run_error.is_some() {
        ExitStatus::Failed
    } else {
        ExitStatus::Clean
    }
}
