//! Mount remediation for freshly created namespaces
//!
//! A new mount namespace starts as a copy of the host's, with shared
//! propagation and the host's `/sys` and `/proc`. These steps make it
//! private and refresh the views that depend on the new namespaces.

use nix::mount::{MsFlags, mount};
use nsexec_core::{Error, Result};

use crate::config::NamespaceFlags;

/// A single remediation step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MountStep {
    /// Recursively set `/` to private propagation
    PrivatePropagation,
    /// Mount a fresh sysfs on `/sys` (network namespace view)
    Sysfs,
    /// Mount a fresh procfs on `/proc` (PID namespace view)
    Proc,
}

impl MountStep {
    /// Perform the mount
    ///
    /// # Errors
    /// Returns error if mount(2) fails
    pub fn apply(self) -> Result<()> {
        let result = match self {
            Self::PrivatePropagation => mount(
                Some("none"),
                "/",
                None::<&str>,
                MsFlags::MS_REC | MsFlags::MS_PRIVATE,
                None::<&str>,
            ),
            Self::Sysfs => mount(
                Some("sysfs"),
                "/sys",
                Some("sysfs"),
                MsFlags::empty(),
                None::<&str>,
            ),
            Self::Proc => mount(
                Some("proc"),
                "/proc",
                Some("proc"),
                MsFlags::MS_NOSUID | MsFlags::MS_NOEXEC | MsFlags::MS_NODEV,
                None::<&str>,
            ),
        };

        result.map_err(|e| Error::Mount {
            message: format!("{self}: {e}"),
        })?;

        tracing::debug!(step = %self, "Mount step applied");
        Ok(())
    }
}

impl std::fmt::Display for MountStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PrivatePropagation => f.write_str("set / propagation to private"),
            Self::Sysfs => f.write_str("mount /sys"),
            Self::Proc => f.write_str("mount /proc"),
        }
    }
}

/// Steps needed for the created namespaces in `flags`
///
/// Empty unless a mount namespace was created.
#[must_use]
pub fn remediation_steps(flags: NamespaceFlags) -> Vec<MountStep> {
    if !flags.contains(NamespaceFlags::MNT) {
        return Vec::new();
    }

    let mut steps = vec![MountStep::PrivatePropagation];
    if flags.contains(NamespaceFlags::NET) {
        steps.push(MountStep::Sysfs);
    }
    if flags.contains(NamespaceFlags::PID) {
        steps.push(MountStep::Proc);
    }
    steps
}

/// Apply every step for `flags`, stopping at the first failure
///
/// # Errors
/// Returns error from the first failing mount
pub fn remediate(flags: NamespaceFlags) -> Result<()> {
    for step in remediation_steps(flags) {
        step.apply()?;
    }
    Ok(())
}
