//! Application orchestration: startup sequencing, the blocking run phase,
//! and signal-driven teardown with concurrent finalizer cleanup.

mod lifecycle;
mod orchestrator;
pub mod signals;

pub use lifecycle::{drive, CleanupWait, ControlPlane, ExitStatus, LifecycleOptions, DRAIN_GRACE};
pub use orchestrator::Orchestrator;
