//! The resource classes owned by this control plane.

use crate::cluster::ResourceClass;
use crate::error::SchemeError;
use crate::scheme::Scheme;

/// API group for all warden-owned resources.
pub const GROUP: &str = "policy.warden.dev";
/// Current API version.
pub const VERSION: &str = "v1";

/// Policy templates: compiled into the policy client and enforced by the
/// webhook and audit subsystems.
pub const TEMPLATES: ResourceClass = ResourceClass {
    group: GROUP,
    version: VERSION,
    kind: "PolicyTemplate",
    plural: "policytemplates",
};

/// Sync sets: declare which resource kinds are replicated into the policy
/// engine for evaluation.
pub const SYNC_SETS: ResourceClass = ResourceClass {
    group: GROUP,
    version: VERSION,
    kind: "SyncSet",
    plural: "syncsets",
};

/// Finalizer marker the controller leaves on sync sets while their synced
/// data is live in the policy engine.
pub const SYNC_FINALIZER: &str = "finalizers.warden.dev/sync";
/// Finalizer marker the controller leaves on templates while they are
/// compiled into the policy client.
pub const TEMPLATE_FINALIZER: &str = "finalizers.warden.dev/template";

/// Register every warden-owned type into the manager's scheme.
#[allow(clippy::result_large_err)]
pub fn register_types(scheme: &mut Scheme) -> Result<(), SchemeError> {
    scheme.register(TEMPLATES)?;
    scheme.register(SYNC_SETS)?;
    Ok(())
}
