//! Namespace handling and process lifecycle for the launcher
//!
//! This crate covers the Linux namespaces the launcher manages:
//! - Network namespace - Interfaces, routes, sysfs view
//! - Mount namespace - Mount table, private propagation
//! - PID namespace - Process isolation, requires fork/wait
//! - UTS namespace - Hostname isolation
//!
//! It also owns the fork/wait/session dance and the final exec.

#![warn(missing_docs, clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]

pub mod config;
pub mod executor;
pub mod mount;
pub mod resolver;

pub use config::{NamespaceConfig, NamespaceFlags, NamespaceKind, NamespaceRequest};
pub use executor::{Lifecycle, Role};
pub use mount::MountStep;
pub use resolver::{
    HostBackend, JoinOutcome, NamespaceBackend, NamespaceDescriptor, NamespaceId,
    NamespaceResolver, Resolution,
};
