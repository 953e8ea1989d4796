//! Periodic audit of stored resources against compiled templates.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::watch;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::cluster::ClusterClient;
use crate::config::AuditConfig;
use crate::error::Result;
use crate::manager::{Manager, Subsystem};
use crate::policy::PolicyClient;
use crate::scheme::Scheme;

/// Register the audit subsystem into the manager.
#[allow(clippy::result_large_err)]
pub fn register_into(
    manager: &mut Manager,
    policy: PolicyClient,
    config: &AuditConfig,
) -> Result<()> {
    let subsystem = AuditSubsystem {
        client: manager.client(),
        scheme: manager.scheme().clone(),
        policy,
        interval: config.interval(),
    };
    manager.add_subsystem(Box::new(subsystem));
    Ok(())
}

/// Counters from one audit pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct AuditSummary {
    pub kinds_scanned: usize,
    pub resources_scanned: usize,
    pub violations: usize,
}

struct AuditSubsystem {
    client: Arc<ClusterClient>,
    scheme: Scheme,
    policy: PolicyClient,
    interval: Duration,
}

#[async_trait]
impl Subsystem for AuditSubsystem {
    fn name(&self) -> &'static str {
        "audit"
    }

    async fn run(self: Box<Self>, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        let mut tick = tokio::time::interval(self.interval);
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("Audit stopping");
                        break;
                    }
                }
                _ = tick.tick() => {
                    let run_id = Uuid::new_v4();
                    let started = Utc::now();
                    let summary = audit_pass(&self.client, &self.scheme, &self.policy).await;
                    info!(
                        run = %run_id,
                        started = %started,
                        kinds = summary.kinds_scanned,
                        resources = summary.resources_scanned,
                        violations = summary.violations,
                        "Audit pass complete"
                    );
                }
            }
        }

        Ok(())
    }
}

/// Scan every kind matched by an installed template and replay the stored
/// resources through the policy client.
pub async fn audit_pass(
    client: &ClusterClient,
    scheme: &Scheme,
    policy: &PolicyClient,
) -> AuditSummary {
    let mut summary = AuditSummary::default();

    for kind in policy.matched_kinds() {
        let Some(class) = scheme.class_for_kind(&kind) else {
            debug!(kind, "Kind is not in the scheme; audit skipped");
            continue;
        };

        let resources = match client.list(class).await {
            Ok(resources) => resources,
            Err(e) => {
                warn!(class = %class, error = %e, "Audit list failed");
                continue;
            }
        };

        summary.kinds_scanned += 1;
        summary.resources_scanned += resources.len();

        for resource in resources {
            let object = match serde_json::to_value(&resource) {
                Ok(object) => object,
                Err(e) => {
                    warn!(resource = %resource.metadata.name, error = %e, "Resource not auditable");
                    continue;
                }
            };

            let outcome = policy.review(&kind, &object);
            for denial in outcome.denials {
                summary.violations += 1;
                warn!(
                    template = %denial.template,
                    kind = %kind,
                    resource = %resource.metadata.name,
                    message = %denial.message,
                    "Audit violation"
                );
            }
        }
    }

    summary
}
