//! A scripted control plane for driving the lifecycle coordinator without
//! any real collaborators.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{oneshot, watch};
use tokio::time::Instant;

use warden::app::{CleanupWait, ControlPlane};
use warden::error::{Error, Result, SetupError};

/// Shared observation side of a [`ScriptedControlPlane`].
#[derive(Clone, Default)]
pub struct Probe {
    events: Arc<Mutex<Vec<String>>>,
    cancel_count: Arc<AtomicUsize>,
    sync_done: Arc<AtomicBool>,
    template_done: Arc<AtomicBool>,
    run_returned_at: Arc<Mutex<Option<Instant>>>,
    cleanup_started_at: Arc<Mutex<Option<Instant>>>,
}

impl Probe {
    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    fn record(&self, event: &str) {
        self.events.lock().unwrap().push(event.to_string());
    }

    pub fn cancel_count(&self) -> usize {
        self.cancel_count.load(Ordering::SeqCst)
    }

    pub fn cleanup_started(&self) -> bool {
        self.cleanup_started_at.lock().unwrap().is_some()
    }

    pub fn sync_done(&self) -> bool {
        self.sync_done.load(Ordering::SeqCst)
    }

    pub fn template_done(&self) -> bool {
        self.template_done.load(Ordering::SeqCst)
    }

    pub fn run_returned_at(&self) -> Option<Instant> {
        *self.run_returned_at.lock().unwrap()
    }

    pub fn cleanup_started_at(&self) -> Option<Instant> {
        *self.cleanup_started_at.lock().unwrap()
    }
}

/// Scriptable [`ControlPlane`] implementation.
///
/// Defaults model the happy path: registration succeeds, the run phase
/// blocks until the shutdown signal, and both cleanup workers complete
/// immediately.
pub struct ScriptedControlPlane {
    pub fail_register: Option<SetupError>,
    pub run_error: Option<Error>,
    pub hold_run_until_signal: bool,
    pub fail_cleanup: Option<Error>,
    pub sync_delay: Duration,
    pub template_delay: Duration,
    /// Simulate a per-resource failure inside the sync worker; the worker
    /// still signals completion.
    pub sync_worker_error: bool,
    probe: Probe,
}

impl ScriptedControlPlane {
    pub fn new() -> (Self, Probe) {
        let probe = Probe::default();
        (
            Self {
                fail_register: None,
                run_error: None,
                hold_run_until_signal: true,
                fail_cleanup: None,
                sync_delay: Duration::ZERO,
                template_delay: Duration::ZERO,
                sync_worker_error: false,
                probe: probe.clone(),
            },
            probe,
        )
    }
}

#[async_trait]
impl ControlPlane for ScriptedControlPlane {
    async fn register(&mut self) -> Result<(), SetupError> {
        match self.fail_register.take() {
            Some(e) => {
                self.probe.record("register:failed");
                Err(e)
            }
            None => {
                self.probe.record("register");
                Ok(())
            }
        }
    }

    async fn run(&mut self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        self.probe.record("run:start");
        if self.hold_run_until_signal && self.run_error.is_none() {
            let _ = shutdown.wait_for(|stop| *stop).await;
        }
        self.probe.record("run:end");
        *self.probe.run_returned_at.lock().unwrap() = Some(Instant::now());

        match self.run_error.take() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn cancel_watches(&mut self) {
        self.probe.record("cancel");
        self.probe.cancel_count.fetch_add(1, Ordering::SeqCst);
    }

    async fn start_cleanup(&mut self) -> Result<CleanupWait> {
        *self.probe.cleanup_started_at.lock().unwrap() = Some(Instant::now());
        if let Some(e) = self.fail_cleanup.take() {
            self.probe.record("cleanup:failed");
            return Err(e);
        }
        self.probe.record("cleanup:start");

        let (sync_tx, sync_rx) = oneshot::channel();
        let (template_tx, template_rx) = oneshot::channel();

        let probe = self.probe.clone();
        let delay = self.sync_delay;
        let worker_error = self.sync_worker_error;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if worker_error {
                probe.record("worker:sync:error");
            }
            probe.sync_done.store(true, Ordering::SeqCst);
            probe.record("worker:sync:done");
            let _ = sync_tx.send(());
        });

        let probe = self.probe.clone();
        let delay = self.template_delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            probe.template_done.store(true, Ordering::SeqCst);
            probe.record("worker:template:done");
            let _ = template_tx.send(());
        });

        Ok(CleanupWait {
            sync: sync_rx,
            templates: template_rx,
        })
    }
}
