//! Serde model for managed resources.

use serde::{Deserialize, Serialize};

/// Descriptor of one class of managed resources: its API group, version,
/// kind, and the plural path segment used on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceClass {
    pub group: &'static str,
    pub version: &'static str,
    pub kind: &'static str,
    pub plural: &'static str,
}

impl std::fmt::Display for ResourceClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.group, self.kind)
    }
}

/// Standard object metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub finalizers: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_version: Option<String>,
}

/// A managed resource as read from (and written back to) the cluster API.
///
/// The spec is kept opaque; subsystems that care about its shape parse it
/// into their own types.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resource {
    pub api_version: String,
    pub kind: String,
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: serde_json::Value,
}

impl Resource {
    /// True when the resource carries the given finalizer marker.
    #[must_use]
    pub fn has_finalizer(&self, marker: &str) -> bool {
        self.metadata.finalizers.iter().any(|f| f == marker)
    }
}

/// Wire shape of a collection response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResourceList {
    #[serde(default)]
    pub items: Vec<Resource>,
}
