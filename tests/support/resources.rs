//! Resource builders shared across integration tests.

use serde_json::{json, Value};

use warden::cluster::{ObjectMeta, Resource, ResourceClass};

pub fn make_resource(class: &ResourceClass, name: &str, finalizers: &[&str], spec: Value) -> Resource {
    Resource {
        api_version: format!("{}/{}", class.group, class.version),
        kind: class.kind.to_string(),
        metadata: ObjectMeta {
            name: name.to_string(),
            finalizers: finalizers.iter().map(|f| (*f).to_string()).collect(),
            resource_version: Some("1".to_string()),
        },
        spec,
    }
}

/// A template spec requiring `spec.owner` on sync sets.
pub fn owner_template_spec() -> Value {
    json!({
        "matchKinds": ["SyncSet"],
        "rules": [{ "path": "spec.owner", "required": true }]
    })
}
