//! Runtime manager: owns the cluster connection, the type registry, and
//! the registered subsystems, and drives the blocking run loop.

use std::sync::Arc;

use async_trait::async_trait;
use futures_util::stream::FuturesUnordered;
use futures_util::StreamExt;
use tokio::sync::watch;
use tracing::{debug, error, info};

use crate::cluster::{ClientOptions, ClusterClient, ClusterConfig};
use crate::error::{ClusterError, Error, Result};
use crate::scheme::Scheme;

/// Options for constructing a [`Manager`].
#[derive(Debug, Clone, Default)]
pub struct ManagerOptions {
    pub client: ClientOptions,
}

/// A long-running component registered into the manager.
///
/// Subsystems are spawned together when the run loop starts and are
/// expected to exit promptly once the shutdown signal flips. Work they
/// spawn internally is their own business; the manager cannot join it.
#[async_trait]
pub trait Subsystem: Send {
    fn name(&self) -> &'static str;

    async fn run(self: Box<Self>, shutdown: watch::Receiver<bool>) -> Result<()>;
}

/// Owns shared dependencies and fans the run loop out to subsystems.
pub struct Manager {
    config: ClusterConfig,
    client: Arc<ClusterClient>,
    scheme: Scheme,
    subsystems: Vec<Box<dyn Subsystem>>,
}

impl Manager {
    /// Construct a manager with its own cluster client.
    #[allow(clippy::result_large_err)]
    pub fn new(config: ClusterConfig, options: ManagerOptions) -> Result<Self, ClusterError> {
        let client = Arc::new(ClusterClient::new(&config, options.client)?);
        Ok(Self {
            config,
            client,
            scheme: Scheme::new(),
            subsystems: Vec::new(),
        })
    }

    #[must_use]
    pub fn cluster_config(&self) -> &ClusterConfig {
        &self.config
    }

    #[must_use]
    pub fn client(&self) -> Arc<ClusterClient> {
        Arc::clone(&self.client)
    }

    #[must_use]
    pub fn scheme(&self) -> &Scheme {
        &self.scheme
    }

    pub fn scheme_mut(&mut self) -> &mut Scheme {
        &mut self.scheme
    }

    /// Register a subsystem to be spawned when the run loop starts.
    pub fn add_subsystem(&mut self, subsystem: Box<dyn Subsystem>) {
        debug!(subsystem = subsystem.name(), "Subsystem registered");
        self.subsystems.push(subsystem);
    }

    #[must_use]
    pub fn subsystem_names(&self) -> Vec<&'static str> {
        self.subsystems.iter().map(|s| s.name()).collect()
    }

    /// Run every registered subsystem until the shutdown signal flips.
    ///
    /// Blocks until the signal arrives, then waits for the subsystems
    /// themselves to stop. A subsystem failing (or panicking) while
    /// serving ends the run immediately with its error; a subsystem
    /// finishing cleanly is tolerated, so one-shot subsystems can retire.
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        let subsystems = std::mem::take(&mut self.subsystems);
        let mut tasks: FuturesUnordered<_> = subsystems
            .into_iter()
            .map(|subsystem| {
                let rx = shutdown.clone();
                let name = subsystem.name();
                tokio::spawn(async move { (name, subsystem.run(rx).await) })
            })
            .collect();

        info!(subsystems = tasks.len(), "Runtime manager serving");

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("Shutdown signal received, stopping subsystems");
                        break;
                    }
                }
                Some(joined) = tasks.next() => {
                    match joined {
                        Ok((name, Ok(()))) => {
                            debug!(subsystem = name, "Subsystem finished");
                        }
                        Ok((name, Err(e))) => {
                            error!(subsystem = name, error = %e, "Subsystem failed");
                            return Err(Error::Subsystem { name, message: e.to_string() });
                        }
                        Err(e) => {
                            error!(error = %e, "Subsystem task aborted");
                            return Err(Error::Subsystem { name: "unknown", message: e.to_string() });
                        }
                    }
                }
            }
        }

        // Signal received: let subsystems wind down. Detached work they
        // spawned cannot be joined here; the orchestrator drains for that.
        let mut first_error: Option<Error> = None;
        while let Some(joined) = tasks.next().await {
            match joined {
                Ok((name, Ok(()))) => debug!(subsystem = name, "Subsystem stopped"),
                Ok((name, Err(e))) => {
                    error!(subsystem = name, error = %e, "Subsystem failed during shutdown");
                    if first_error.is_none() {
                        first_error = Some(Error::Subsystem { name, message: e.to_string() });
                    }
                }
                Err(e) => {
                    error!(error = %e, "Subsystem task aborted during shutdown");
                    if first_error.is_none() {
                        first_error = Some(Error::Subsystem { name: "unknown", message: e.to_string() });
                    }
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
