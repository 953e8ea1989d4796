//! Finalizer cleanup workers.
//!
//! On teardown the controller's markers must come off every resource that
//! carries one, or the platform can never finish deleting those resources.
//! The two workers cover the two marked resource classes and run
//! concurrently; each fires its completion signal no matter what happened
//! inside, so the orchestrator never hangs on a stuck worker.

use std::sync::Arc;

use tokio::sync::oneshot;
use tracing::{error, info, warn};

use crate::api;
use crate::cluster::{ClusterClient, Resource, ResourceClass};

/// Fires a completion signal when dropped.
///
/// Held across the whole cleanup body: early returns, per-resource
/// failures, and panics all still signal the orchestrator.
pub struct CompletionGuard {
    tx: Option<oneshot::Sender<()>>,
}

impl CompletionGuard {
    #[must_use]
    pub fn new(tx: oneshot::Sender<()>) -> Self {
        Self { tx: Some(tx) }
    }
}

impl Drop for CompletionGuard {
    fn drop(&mut self) {
        if let Some(tx) = self.tx.take() {
            let _ = tx.send(());
        }
    }
}

/// Remove the sync marker from every sync set that carries it.
pub async fn remove_all_sync_markers(client: Arc<ClusterClient>, done: oneshot::Sender<()>) {
    let _done = CompletionGuard::new(done);
    remove_class_markers(&client, &api::SYNC_SETS, api::SYNC_FINALIZER).await;
}

/// Remove the template marker from every template that carries it.
pub async fn remove_all_template_markers(client: Arc<ClusterClient>, done: oneshot::Sender<()>) {
    let _done = CompletionGuard::new(done);
    remove_class_markers(&client, &api::TEMPLATES, api::TEMPLATE_FINALIZER).await;
}

/// Strip `marker` from the resource's finalizers. Returns whether it was
/// present; removing an absent marker is a no-op.
pub fn strip_marker(resource: &mut Resource, marker: &str) -> bool {
    let before = resource.metadata.finalizers.len();
    resource.metadata.finalizers.retain(|f| f != marker);
    resource.metadata.finalizers.len() != before
}

/// Best-effort sweep over one resource class. Individual failures are
/// logged and skipped, never retried.
async fn remove_class_markers(client: &ClusterClient, class: &ResourceClass, marker: &str) {
    let resources = match client.list(class).await {
        Ok(resources) => resources,
        Err(e) => {
            error!(class = %class, error = %e, "Finalizer cleanup could not list resources");
            return;
        }
    };

    let mut removed = 0usize;
    let mut failed = 0usize;

    for mut resource in resources {
        if !strip_marker(&mut resource, marker) {
            continue;
        }

        match client.update(class, &resource).await {
            Ok(_) => removed += 1,
            Err(e) => {
                failed += 1;
                warn!(
                    class = %class,
                    resource = %resource.metadata.name,
                    error = %e,
                    "Failed to remove finalizer"
                );
            }
        }
    }

    info!(class = %class, removed, failed, "Finalizer sweep finished");
}
