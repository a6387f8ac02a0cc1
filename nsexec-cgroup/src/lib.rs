//! Cgroup membership and real-time scheduling for the launcher
//!
//! Groups are prepared by whoever drives the launcher; this crate only adds
//! the current process to them and optionally switches it to `SCHED_RR`.

#![warn(missing_docs, clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(
    clippy::module_name_repetitions,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod controller;
pub mod sched;

pub use controller::{CGROUP_ROOT, CgroupJoiner, Hierarchy, JoinReport, LEGACY_CONTROLLERS};
pub use sched::{current_policy, set_realtime};

// Re-export commonly used types
pub use nsexec_core::{CgroupName, RtPriority};
