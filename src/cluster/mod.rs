//! Managed-cluster API access.
//!
//! Connection discovery, a minimal JSON/REST client, and the resource
//! model. The control plane deliberately creates more than one client over
//! its lifetime: one owned by the runtime manager for the serving phase and
//! a fresh one for finalizer cleanup, so cleanup never works through stale
//! type mappings cached during the run.

mod client;
mod config;
mod resource;

pub use client::{ClientOptions, ClusterClient};
pub use config::{ClusterConfig, ClusterEnv};
pub use resource::{ObjectMeta, Resource, ResourceClass, ResourceList};
