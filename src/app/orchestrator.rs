//! The production control plane: wires the real collaborators into the
//! lifecycle coordinator.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{oneshot, watch};
use tracing::{error, info};

use super::lifecycle::{drive, CleanupWait, ControlPlane, ExitStatus, LifecycleOptions};
use super::signals;
use crate::api;
use crate::cluster::{ClientOptions, ClusterClient, ClusterConfig};
use crate::config::Config;
use crate::error::{Error, Result, SetupError};
use crate::finalizer;
use crate::manager::{Manager, ManagerOptions};
use crate::policy::{Backend, ClusterValidationTarget, Driver, PolicyClient};
use crate::watch::{WatchLifetime, WatchManager};
use crate::{audit, controller, upgrade, webhook};

/// Entry point driving the whole process lifecycle.
pub struct Orchestrator;

impl Orchestrator {
    /// Run with the process signal handlers installed.
    pub async fn run(config: Config) -> ExitStatus {
        let shutdown = signals::shutdown_channel();
        Self::run_with_shutdown(config, shutdown).await
    }

    /// Run against an externally owned shutdown channel.
    pub async fn run_with_shutdown(
        config: Config,
        shutdown: watch::Receiver<bool>,
    ) -> ExitStatus {
        let options = LifecycleOptions {
            drain_grace: config.lifecycle.drain_grace(),
        };
        let mut plane = WardenControlPlane::new(config);
        drive(&mut plane, shutdown, &options).await
    }
}

struct WardenControlPlane {
    config: Config,
    cluster_config: Option<ClusterConfig>,
    manager: Option<Manager>,
    watch_lifetime: Option<WatchLifetime>,
}

impl WardenControlPlane {
    fn new(config: Config) -> Self {
        Self {
            config,
            cluster_config: None,
            manager: None,
            watch_lifetime: None,
        }
    }
}

#[async_trait]
impl ControlPlane for WardenControlPlane {
    async fn register(&mut self) -> Result<(), SetupError> {
        info!("Discovering cluster connection");
        let cluster_config = ClusterConfig::discover(self.config.cluster.api_url.as_deref())
            .map_err(SetupError::Discovery)?;

        info!("Constructing runtime manager");
        let mut manager = Manager::new(cluster_config.clone(), ManagerOptions::default())
            .map_err(SetupError::Manager)?;

        info!("Registering API types");
        api::register_types(manager.scheme_mut()).map_err(SetupError::Scheme)?;

        info!("Constructing policy backend");
        let backend = Backend::new(Driver::local()).map_err(SetupError::Backend)?;
        let policy = match backend.client(ClusterValidationTarget::default()) {
            Ok(client) => client,
            Err(e) => {
                // Unlike every other setup step this is not fatal; the
                // registrars get an inert client instead.
                error!(error = %e, "Unable to construct policy client");
                PolicyClient::disconnected()
            }
        };

        let (lifetime, lifetime_rx) = WatchLifetime::new();
        let watches = WatchManager::new(lifetime_rx, cluster_config.clone());

        info!("Registering controller");
        controller::register_into(
            &mut manager,
            policy.clone(),
            watches.clone(),
            self.config.controller.resync(),
        )
        .map_err(|e| SetupError::Registration {
            subsystem: "controller",
            source: Box::new(e),
        })?;

        info!("Registering webhook");
        webhook::register_into(&mut manager, policy.clone(), &self.config.webhook).map_err(
            |e| SetupError::Registration {
                subsystem: "webhook",
                source: Box::new(e),
            },
        )?;

        info!("Registering audit");
        audit::register_into(&mut manager, policy.clone(), &self.config.audit).map_err(|e| {
            SetupError::Registration {
                subsystem: "audit",
                source: Box::new(e),
            }
        })?;

        info!("Registering upgrade");
        upgrade::register_into(&mut manager).map_err(|e| SetupError::Registration {
            subsystem: "upgrade",
            source: Box::new(e),
        })?;

        self.cluster_config = Some(cluster_config);
        self.manager = Some(manager);
        self.watch_lifetime = Some(lifetime);
        Ok(())
    }

    async fn run(&mut self, shutdown: watch::Receiver<bool>) -> Result<()> {
        let mut manager = self
            .manager
            .take()
            .ok_or(Error::Lifecycle("run entered before registration"))?;
        manager.run(shutdown).await
    }

    fn cancel_watches(&mut self) {
        if let Some(lifetime) = self.watch_lifetime.take() {
            lifetime.cancel();
        }
    }

    async fn start_cleanup(&mut self) -> Result<CleanupWait> {
        let cluster_config = self
            .cluster_config
            .as_ref()
            .ok_or(Error::Lifecycle("cleanup entered before registration"))?;

        // A fresh client: the serving phase's client may hold stale type
        // mappings by now.
        let client = Arc::new(ClusterClient::new(cluster_config, ClientOptions::default())?);

        let (sync_tx, sync_rx) = oneshot::channel();
        let (template_tx, template_rx) = oneshot::channel();

        tokio::spawn(finalizer::remove_all_sync_markers(
            Arc::clone(&client),
            sync_tx,
        ));
        tokio::spawn(finalizer::remove_all_template_markers(client, template_tx));

        Ok(CleanupWait {
            sync: sync_rx,
            templates: template_rx,
        })
    }
}
