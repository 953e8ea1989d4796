//! Watch manager: background change polling over registered resource
//! classes.
//!
//! The manager's lifetime is independent of the runtime manager's run loop.
//! It starts pumping as soon as it is constructed and stops only when the
//! orchestrator cancels the [`WatchLifetime`], exactly once, after the run
//! loop has returned.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::cluster::{ClientOptions, ClusterClient, ClusterConfig, ResourceClass};

/// How often the pump re-lists watched classes.
const WATCH_RESYNC: Duration = Duration::from_secs(10);

/// Cancellation capability for the watch manager's lifetime.
///
/// Consuming `self` makes "cancel exactly once" a compile-time property.
pub struct WatchLifetime {
    tx: watch::Sender<bool>,
}

impl WatchLifetime {
    /// Create the capability and the receiver handed to [`WatchManager::new`].
    #[must_use]
    pub fn new() -> (WatchLifetime, watch::Receiver<bool>) {
        let (tx, rx) = watch::channel(false);
        (Self { tx }, rx)
    }

    /// End the watch manager's lifetime.
    pub fn cancel(self) {
        let _ = self.tx.send(true);
    }
}

struct WatchEntry {
    class: ResourceClass,
    fingerprint: Option<u64>,
}

/// Clonable registry handle; the background pump polls whatever is
/// registered here.
#[derive(Clone)]
pub struct WatchManager {
    registry: Arc<DashMap<String, WatchEntry>>,
}

impl WatchManager {
    /// Construct the manager and start its pump. Never fails: if the poll
    /// client cannot be built the pump degrades to an idle wait for
    /// cancellation, and registration still works.
    #[must_use]
    pub fn new(mut lifetime: watch::Receiver<bool>, config: ClusterConfig) -> Self {
        let registry: Arc<DashMap<String, WatchEntry>> = Arc::new(DashMap::new());

        let client = match ClusterClient::new(&config, ClientOptions::default()) {
            Ok(client) => Some(client),
            Err(e) => {
                warn!(error = %e, "Watch pump has no cluster client; watches are registered but not polled");
                None
            }
        };

        let pump_registry = Arc::clone(&registry);
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(WATCH_RESYNC);
            tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    changed = lifetime.changed() => {
                        if changed.is_err() || *lifetime.borrow() {
                            info!("Watch manager lifetime cancelled");
                            break;
                        }
                    }
                    _ = tick.tick() => {
                        if let Some(client) = &client {
                            poll_watched(client, &pump_registry).await;
                        }
                    }
                }
            }
        });

        Self { registry }
    }

    /// Start watching a resource class. Returns false when it was already
    /// watched.
    pub fn watch(&self, class: ResourceClass) -> bool {
        let kind = class.kind.to_string();
        if self.registry.contains_key(&kind) {
            return false;
        }
        debug!(class = %class, "Watch registered");
        self.registry
            .insert(
                kind,
                WatchEntry {
                    class,
                    fingerprint: None,
                },
            )
            .is_none()
    }

    /// Stop watching a kind. Returns whether it was watched.
    pub fn forget(&self, kind: &str) -> bool {
        self.registry.remove(kind).is_some()
    }

    #[must_use]
    pub fn watched_kinds(&self) -> Vec<String> {
        let mut kinds: Vec<String> = self.registry.iter().map(|e| e.key().clone()).collect();
        kinds.sort();
        kinds
    }

    #[must_use]
    pub fn watch_count(&self) -> usize {
        self.registry.len()
    }
}

/// Re-list every watched class and report fingerprint changes.
async fn poll_watched(client: &ClusterClient, registry: &DashMap<String, WatchEntry>) {
    let kinds: Vec<String> = registry.iter().map(|e| e.key().clone()).collect();

    for kind in kinds {
        // Entry may have been forgotten between the snapshot and now.
        let class = match registry.get(&kind) {
            Some(entry) => entry.class.clone(),
            None => continue,
        };

        match client.list(&class).await {
            Ok(resources) => {
                let mut hasher = DefaultHasher::new();
                for resource in &resources {
                    resource.metadata.name.hash(&mut hasher);
                    resource.metadata.resource_version.hash(&mut hasher);
                }
                let fingerprint = hasher.finish();

                if let Some(mut entry) = registry.get_mut(&kind) {
                    if entry.fingerprint != Some(fingerprint) {
                        debug!(class = %class, count = resources.len(), "Watched resources changed");
                        entry.fingerprint = Some(fingerprint);
                    }
                }
            }
            Err(e) => {
                debug!(class = %class, error = %e, "Watch poll failed");
            }
        }
    }
}
