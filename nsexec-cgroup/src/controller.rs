//! Cgroup membership
//!
//! The launcher does not create groups or set limits; the orchestrator has
//! already done that. It only registers its own PID with every hierarchy
//! that carries a group of the requested name.

use nsexec_core::{CgroupName, Error, ProcessId, Result};
use std::fmt;
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Mount point of the cgroup filesystems
pub const CGROUP_ROOT: &str = "/sys/fs/cgroup";

/// v1 controllers tried by default
pub const LEGACY_CONTROLLERS: [&str; 3] = ["cpu", "cpuacct", "cpuset"];

/// A cgroup hierarchy that can accept the PID
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Hierarchy {
    /// v1 controller hierarchy, `<root>/<controller>/<name>/tasks`
    Legacy(String),
    /// v2 unified hierarchy, `<root>/<name>/cgroup.procs`
    Unified,
}

impl Hierarchy {
    /// File the PID is written to
    #[must_use]
    pub fn task_file(&self, root: &Path, name: &CgroupName) -> PathBuf {
        match self {
            Self::Legacy(controller) => root.join(controller).join(name.as_str()).join("tasks"),
            Self::Unified => root.join(name.as_str()).join("cgroup.procs"),
        }
    }
}

impl fmt::Display for Hierarchy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Legacy(controller) => f.write_str(controller),
            Self::Unified => f.write_str("unified"),
        }
    }
}

/// Which hierarchies took the PID
#[derive(Debug, Default)]
pub struct JoinReport {
    /// Hierarchies that accepted the write
    pub accepted: Vec<Hierarchy>,
    /// Hierarchies that refused it, with the reason
    pub rejected: Vec<(Hierarchy, io::Error)>,
}

/// Adds processes to existing cgroups
#[derive(Debug, Clone)]
pub struct CgroupJoiner {
    root: PathBuf,
    hierarchies: Vec<Hierarchy>,
}

impl Default for CgroupJoiner {
    fn default() -> Self {
        Self::new()
    }
}

impl CgroupJoiner {
    /// Joiner for `/sys/fs/cgroup`, trying the default v1 controllers then
    /// the unified hierarchy
    #[must_use]
    pub fn new() -> Self {
        let mut hierarchies: Vec<Hierarchy> = LEGACY_CONTROLLERS
            .iter()
            .map(|c| Hierarchy::Legacy((*c).to_string()))
            .collect();
        hierarchies.push(Hierarchy::Unified);

        Self {
            root: PathBuf::from(CGROUP_ROOT),
            hierarchies,
        }
    }

    /// Use a different cgroup mount point
    #[must_use]
    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = root.into();
        self
    }

    /// Replace the v1 controllers; the unified hierarchy is kept if enabled
    #[must_use]
    pub fn with_controllers<I, S>(mut self, controllers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let unified = self.hierarchies.contains(&Hierarchy::Unified);
        self.hierarchies = controllers
            .into_iter()
            .map(|c| Hierarchy::Legacy(c.into()))
            .collect();
        if unified {
            self.hierarchies.push(Hierarchy::Unified);
        }
        self
    }

    /// Enable or disable the unified hierarchy
    #[must_use]
    pub fn with_unified(mut self, enable: bool) -> Self {
        self.hierarchies.retain(|h| *h != Hierarchy::Unified);
        if enable {
            self.hierarchies.push(Hierarchy::Unified);
        }
        self
    }

    /// Get the cgroup mount point
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Hierarchies tried, in order
    #[must_use]
    pub fn hierarchies(&self) -> &[Hierarchy] {
        &self.hierarchies
    }

    /// Write `pid` into the group's task list in every hierarchy
    ///
    /// Hierarchies that are not mounted, or have no such group, are skipped.
    ///
    /// # Errors
    /// Returns [`Error::CGroup`] if no hierarchy accepted the PID
    pub fn join(&self, name: &CgroupName, pid: ProcessId) -> Result<JoinReport> {
        let mut report = JoinReport::default();

        for hierarchy in &self.hierarchies {
            let path = hierarchy.task_file(&self.root, name);

            match write_pid(&path, pid) {
                Ok(()) => {
                    debug!(hierarchy = %hierarchy, path = %path.display(), "Added process to cgroup");
                    report.accepted.push(hierarchy.clone());
                }
                Err(e) => {
                    debug!(hierarchy = %hierarchy, path = %path.display(), error = %e, "Cgroup hierarchy refused process");
                    report.rejected.push((hierarchy.clone(), e));
                }
            }
        }

        if report.accepted.is_empty() {
            return Err(Error::CGroup {
                message: format!("could not add to cgroup {name}"),
            });
        }

        tracing::info!(
            cgroup = %name,
            pid = %pid,
            accepted = report.accepted.len(),
            "Joined cgroup"
        );

        Ok(report)
    }
}

/// Task files exist only inside real groups, so never create one
fn write_pid(path: &Path, pid: ProcessId) -> io::Result<()> {
    let mut file = OpenOptions::new().write(true).open(path)?;
    writeln!(file, "{pid}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_hierarchies() {
        let joiner = CgroupJoiner::new();
        assert_eq!(joiner.root(), Path::new("/sys/fs/cgroup"));
        assert_eq!(
            joiner.hierarchies(),
            &[
                Hierarchy::Legacy("cpu".into()),
                Hierarchy::Legacy("cpuacct".into()),
                Hierarchy::Legacy("cpuset".into()),
                Hierarchy::Unified,
            ]
        );
    }

    #[test]
    fn test_task_file_paths() {
        let name = CgroupName::new("mn/h1").unwrap();
        let root = Path::new("/sys/fs/cgroup");

        assert_eq!(
            Hierarchy::Legacy("cpuset".into()).task_file(root, &name),
            PathBuf::from("/sys/fs/cgroup/cpuset/mn/h1/tasks")
        );
        assert_eq!(
            Hierarchy::Unified.task_file(root, &name),
            PathBuf::from("/sys/fs/cgroup/mn/h1/cgroup.procs")
        );
    }

    #[test]
    fn test_builder_pattern() {
        let joiner = CgroupJoiner::new()
            .with_root("/tmp/cg")
            .with_controllers(["memory"])
            .with_unified(false);

        assert_eq!(joiner.root(), Path::new("/tmp/cg"));
        assert_eq!(joiner.hierarchies(), &[Hierarchy::Legacy("memory".into())]);

        let joiner = joiner.with_unified(true).with_unified(true);
        assert_eq!(joiner.hierarchies().len(), 2);
    }
}
