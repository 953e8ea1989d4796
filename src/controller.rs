//! Template and sync-set reconciliation.
//!
//! The controller keeps the policy client's compiled templates in step with
//! the cluster, leaves finalizer markers on everything it has ingested, and
//! registers watches for the kinds templates and sync sets care about.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::api;
use crate::cluster::{ClusterClient, Resource, ResourceClass};
use crate::error::Result;
use crate::manager::{Manager, Subsystem};
use crate::policy::PolicyClient;
use crate::scheme::Scheme;
use crate::watch::WatchManager;

/// Register the controller into the manager.
#[allow(clippy::result_large_err)]
pub fn register_into(
    manager: &mut Manager,
    policy: PolicyClient,
    watches: WatchManager,
    resync: Duration,
) -> Result<()> {
    let subsystem = ControllerSubsystem {
        client: manager.client(),
        scheme: manager.scheme().clone(),
        policy,
        watches,
        resync,
    };
    manager.add_subsystem(Box::new(subsystem));
    Ok(())
}

/// Wire shape of a sync-set spec.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SyncSetSpec {
    #[serde(default)]
    sync_kinds: Vec<String>,
}

struct ControllerSubsystem {
    client: Arc<ClusterClient>,
    scheme: Scheme,
    policy: PolicyClient,
    watches: WatchManager,
    resync: Duration,
}

#[async_trait]
impl Subsystem for ControllerSubsystem {
    fn name(&self) -> &'static str {
        "controller"
    }

    async fn run(self: Box<Self>, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        // The owned classes are always watched; dynamic watches follow from
        // what the templates and sync sets declare.
        self.watches.watch(api::TEMPLATES);
        self.watches.watch(api::SYNC_SETS);

        let mut tick = tokio::time::interval(self.resync);
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("Controller stopping");
                        break;
                    }
                }
                _ = tick.tick() => {
                    self.reconcile().await;
                }
            }
        }

        Ok(())
    }
}

impl ControllerSubsystem {
    /// One full pass: templates first, then sync sets.
    async fn reconcile(&self) {
        match self.client.list(&api::TEMPLATES).await {
            Ok(templates) => self.reconcile_templates(templates).await,
            Err(e) => warn!(error = %e, "Template list failed; will retry on next resync"),
        }

        match self.client.list(&api::SYNC_SETS).await {
            Ok(sync_sets) => self.reconcile_sync_sets(sync_sets).await,
            Err(e) => warn!(error = %e, "Sync set list failed; will retry on next resync"),
        }
    }

    async fn reconcile_templates(&self, templates: Vec<Resource>) {
        let mut seen: HashSet<String> = HashSet::with_capacity(templates.len());

        for mut template in templates {
            let name = template.metadata.name.clone();
            seen.insert(name.clone());

            self.ensure_finalizer(&mut template, &api::TEMPLATES, api::TEMPLATE_FINALIZER)
                .await;

            if let Err(e) = self.policy.upsert_template(&name, &template.spec) {
                warn!(template = %name, error = %e, "Template rejected by policy client");
                continue;
            }
            debug!(template = %name, "Template compiled");
        }

        // Templates deleted from the cluster lose their compiled rules.
        for name in self.policy.template_names() {
            if !seen.contains(&name) {
                self.policy.remove_template(&name);
                info!(template = %name, "Template removed");
            }
        }

        for kind in self.policy.matched_kinds() {
            self.watch_kind(&kind);
        }
    }

    async fn reconcile_sync_sets(&self, sync_sets: Vec<Resource>) {
        for mut sync_set in sync_sets {
            let name = sync_set.metadata.name.clone();
            self.ensure_finalizer(&mut sync_set, &api::SYNC_SETS, api::SYNC_FINALIZER)
                .await;

            match serde_json::from_value::<SyncSetSpec>(sync_set.spec.clone()) {
                Ok(spec) => {
                    for kind in &spec.sync_kinds {
                        self.watch_kind(kind);
                    }
                }
                Err(e) => {
                    warn!(sync_set = %name, error = %e, "Sync set spec is malformed");
                }
            }
        }
    }

    /// Leave the marker on a resource so teardown knows it was ingested.
    async fn ensure_finalizer(
        &self,
        resource: &mut Resource,
        class: &ResourceClass,
        marker: &str,
    ) {
        if resource.has_finalizer(marker) {
            return;
        }
        resource.metadata.finalizers.push(marker.to_string());

        match self.client.update(class, resource).await {
            Ok(updated) => {
                debug!(resource = %resource.metadata.name, marker, "Finalizer added");
                *resource = updated;
            }
            Err(e) => {
                warn!(resource = %resource.metadata.name, error = %e, "Failed to add finalizer");
            }
        }
    }

    fn watch_kind(&self, kind: &str) {
        match self.scheme.class_for_kind(kind) {
            Some(class) => {
                self.watches.watch(class.clone());
            }
            None => {
                debug!(kind, "Kind is not in the scheme; watch skipped");
            }
        }
    }
}
