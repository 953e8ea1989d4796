//! One-shot schema migration for stored templates.
//!
//! Older control-plane versions stored templates without a schema version.
//! This subsystem stamps the current version onto anything unstamped, then
//! retires; the manager tolerates its clean exit.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::api;
use crate::cluster::ClusterClient;
use crate::error::Result;
use crate::manager::{Manager, Subsystem};

/// Schema version stamped onto migrated templates.
pub const CURRENT_SCHEMA_VERSION: &str = "v1";

/// Register the upgrade subsystem into the manager.
#[allow(clippy::result_large_err)]
pub fn register_into(manager: &mut Manager) -> Result<()> {
    manager.add_subsystem(Box::new(UpgradeSubsystem {
        client: manager.client(),
    }));
    Ok(())
}

struct UpgradeSubsystem {
    client: Arc<ClusterClient>,
}

#[async_trait]
impl Subsystem for UpgradeSubsystem {
    fn name(&self) -> &'static str {
        "upgrade"
    }

    async fn run(self: Box<Self>, _shutdown: watch::Receiver<bool>) -> Result<()> {
        // Best effort: a cluster hiccup here must not take the run loop
        // down, the next process start retries anyway.
        let templates = match self.client.list(&api::TEMPLATES).await {
            Ok(templates) => templates,
            Err(e) => {
                warn!(error = %e, "Upgrade pass skipped; template list failed");
                return Ok(());
            }
        };

        let mut migrated = 0usize;
        for mut template in templates {
            if !needs_migration(&template.spec) {
                continue;
            }

            stamp_schema_version(&mut template.spec);
            match self.client.update(&api::TEMPLATES, &template).await {
                Ok(_) => migrated += 1,
                Err(e) => {
                    warn!(template = %template.metadata.name, error = %e, "Template migration failed");
                }
            }
        }

        info!(migrated, "Upgrade pass complete");
        Ok(())
    }
}

fn needs_migration(spec: &Value) -> bool {
    spec.is_object() && spec.get("schemaVersion").is_none()
}

fn stamp_schema_version(spec: &mut Value) {
    if let Some(object) = spec.as_object_mut() {
        object.insert(
            "schemaVersion".to_string(),
            Value::String(CURRENT_SCHEMA_VERSION.to_string()),
        );
    }
}
