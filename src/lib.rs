//! Warden - policy enforcement control plane for managed clusters.
//!
//! The process brings up a set of interdependent subsystems in a defined
//! order, blocks while they serve, and on shutdown drains in-flight work
//! and removes the finalizer markers those subsystems left on managed
//! resources before exiting.
//!
//! # Architecture
//!
//! ```text
//! Startup (app::lifecycle, in order):
//!     log config → cluster discovery → manager → scheme → policy backend
//!     → policy client → watch manager → registrars (controller, webhook,
//!     audit, upgrade)
//!
//! Run:
//!     manager fans out to subsystems, blocks on the shutdown signal
//!
//! Teardown:
//!     cancel watches → bounded drain → two concurrent finalizer sweeps
//!     → exit status
//! ```
//!
//! # Modules
//!
//! - [`config`] - TOML run configuration with CLI overrides
//! - [`logging`] - log-level mapping and the sampled structured sink
//! - [`cluster`] - connection discovery, REST client, resource model
//! - [`scheme`] / [`api`] - the type registry and warden-owned kinds
//! - [`manager`] - the runtime manager and the `Subsystem` seam
//! - [`policy`] - policy backend, templates, and the bound client
//! - [`watch`] - background watch manager with a cancellable lifetime
//! - [`controller`], [`webhook`], [`audit`], [`upgrade`] - subsystem
//!   registrars
//! - [`finalizer`] - teardown sweeps that strip persisted markers
//! - [`app`] - the lifecycle coordinator tying it all together

pub mod api;
pub mod app;
pub mod audit;
pub mod cli;
pub mod cluster;
pub mod config;
pub mod controller;
pub mod error;
pub mod finalizer;
pub mod logging;
pub mod manager;
pub mod policy;
pub mod scheme;
pub mod upgrade;
pub mod watch;
pub mod webhook;
