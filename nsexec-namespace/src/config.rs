//! Namespace configuration

use nix::sched::CloneFlags;
use nsexec_core::ProcessId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Namespace kinds handled by the launcher
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NamespaceKind {
    /// Network namespace
    Net,
    /// PID namespace
    Pid,
    /// UTS namespace (hostname, domain name)
    Uts,
    /// Mount namespace
    Mnt,
}

impl NamespaceKind {
    /// All kinds, in attach order
    ///
    /// The mount namespace comes last: once it is joined, `/proc` may show a
    /// different view and the remaining handles could no longer be resolved.
    pub const ALL: [Self; 4] = [Self::Net, Self::Pid, Self::Uts, Self::Mnt];

    /// Entry name under `/proc/<pid>/ns`
    #[must_use]
    pub const fn proc_name(self) -> &'static str {
        match self {
            Self::Net => "net",
            Self::Pid => "pid",
            Self::Uts => "uts",
            Self::Mnt => "mnt",
        }
    }

    /// Matching `unshare(2)`/`setns(2)` flag
    #[must_use]
    pub const fn clone_flag(self) -> CloneFlags {
        match self {
            Self::Net => CloneFlags::CLONE_NEWNET,
            Self::Pid => CloneFlags::CLONE_NEWPID,
            Self::Uts => CloneFlags::CLONE_NEWUTS,
            Self::Mnt => CloneFlags::CLONE_NEWNS,
        }
    }

    /// Matching bit in [`NamespaceFlags`]
    #[must_use]
    pub const fn flag(self) -> NamespaceFlags {
        match self {
            Self::Net => NamespaceFlags::NET,
            Self::Pid => NamespaceFlags::PID,
            Self::Uts => NamespaceFlags::UTS,
            Self::Mnt => NamespaceFlags::MNT,
        }
    }
}

impl fmt::Display for NamespaceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.proc_name())
    }
}

/// Namespace flags for bitwise operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NamespaceFlags(u8);

impl NamespaceFlags {
    /// Network namespace flag
    pub const NET: Self = Self(0b0001);
    /// PID namespace flag
    pub const PID: Self = Self(0b0010);
    /// UTS namespace flag
    pub const UTS: Self = Self(0b0100);
    /// Mount namespace flag
    pub const MNT: Self = Self(0b1000);

    /// All namespaces
    pub const ALL: Self = Self(0b1111);
    /// No namespaces
    pub const NONE: Self = Self(0);

    /// Create from raw value, dropping unknown bits
    #[must_use]
    pub const fn from_bits(bits: u8) -> Self {
        Self(bits & Self::ALL.0)
    }

    /// Get raw value
    #[must_use]
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Check if flag is set
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        (self.0 & other.0) == other.0
    }

    /// Check if no flag is set
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Set `other` in place
    pub const fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }

    /// Kinds present in this set, in attach order
    pub fn kinds(self) -> impl Iterator<Item = NamespaceKind> {
        NamespaceKind::ALL
            .into_iter()
            .filter(move |kind| self.contains(kind.flag()))
    }

    /// Convert to clone flags for unshare(2)
    #[must_use]
    pub fn to_clone_flags(self) -> CloneFlags {
        self.kinds()
            .fold(CloneFlags::empty(), |flags, kind| flags | kind.clone_flag())
    }
}

impl std::ops::BitOr for NamespaceFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl std::ops::BitAnd for NamespaceFlags {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self {
        Self(self.0 & rhs.0)
    }
}

impl fmt::Display for NamespaceFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.kinds().map(NamespaceKind::proc_name).collect();
        if names.is_empty() {
            f.write_str("none")
        } else {
            f.write_str(&names.join(","))
        }
    }
}

/// Namespaces to create for the launched command
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamespaceConfig {
    /// Enable network namespace
    pub network: bool,

    /// Enable mount namespace
    pub mount: bool,

    /// Enable PID namespace
    pub pid: bool,

    /// Enable UTS namespace (hostname)
    pub uts: bool,
}

impl NamespaceConfig {
    /// Create a configuration with every namespace disabled
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable network namespace
    #[must_use]
    pub const fn with_network(mut self, enable: bool) -> Self {
        self.network = enable;
        self
    }

    /// Enable mount namespace
    #[must_use]
    pub const fn with_mount(mut self, enable: bool) -> Self {
        self.mount = enable;
        self
    }

    /// Enable PID namespace
    #[must_use]
    pub const fn with_pid(mut self, enable: bool) -> Self {
        self.pid = enable;
        self
    }

    /// Enable UTS namespace
    #[must_use]
    pub const fn with_uts(mut self, enable: bool) -> Self {
        self.uts = enable;
        self
    }

    /// Flags that will actually be unshared
    ///
    /// A new network or PID namespace always comes with a new mount
    /// namespace, so `/sys` and `/proc` can be remounted privately.
    #[must_use]
    pub const fn effective_flags(&self) -> NamespaceFlags {
        let mut flags = NamespaceFlags::NONE;
        if self.network {
            flags.insert(NamespaceFlags::NET);
            flags.insert(NamespaceFlags::MNT);
        }
        if self.pid {
            flags.insert(NamespaceFlags::PID);
            flags.insert(NamespaceFlags::MNT);
        }
        if self.mount {
            flags.insert(NamespaceFlags::MNT);
        }
        if self.uts {
            flags.insert(NamespaceFlags::UTS);
        }
        flags
    }

    /// Check if any namespaces are enabled
    #[must_use]
    pub const fn has_any(&self) -> bool {
        self.network || self.mount || self.pid || self.uts
    }
}

/// What the resolver should do with namespaces
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NamespaceRequest {
    /// Unshare fresh namespaces
    Create(NamespaceConfig),
    /// Join the namespaces of a running process
    Attach(ProcessId),
}

impl NamespaceRequest {
    /// Whether namespaces are created rather than joined
    #[must_use]
    pub const fn is_create(&self) -> bool {
        matches!(self, Self::Create(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = NamespaceConfig::default();
        assert!(!config.has_any());
        assert!(config.effective_flags().is_empty());
    }

    #[test]
    fn test_builder_pattern() {
        let config = NamespaceConfig::new().with_uts(true).with_network(false);

        assert!(config.uts);
        assert!(!config.network);
        assert_eq!(config.effective_flags(), NamespaceFlags::UTS);
    }

    #[test]
    fn test_network_and_pid_imply_mount() {
        let net = NamespaceConfig::new().with_network(true).effective_flags();
        assert_eq!(net, NamespaceFlags::NET | NamespaceFlags::MNT);

        let pid = NamespaceConfig::new().with_pid(true).effective_flags();
        assert_eq!(pid, NamespaceFlags::PID | NamespaceFlags::MNT);

        let all = NamespaceConfig::new()
            .with_network(true)
            .with_pid(true)
            .with_uts(true)
            .effective_flags();
        assert_eq!(all, NamespaceFlags::ALL);
    }

    #[test]
    fn test_clone_flags_conversion() {
        let flags = (NamespaceFlags::PID | NamespaceFlags::NET).to_clone_flags();
        assert!(flags.contains(CloneFlags::CLONE_NEWPID));
        assert!(flags.contains(CloneFlags::CLONE_NEWNET));
        assert!(!flags.contains(CloneFlags::CLONE_NEWNS));

        assert!(NamespaceFlags::NONE.to_clone_flags().is_empty());
    }

    #[test]
    fn test_namespace_flags() {
        let mut flags = NamespaceFlags::PID | NamespaceFlags::NET;

        assert!(flags.contains(NamespaceFlags::PID));
        assert!(flags.contains(NamespaceFlags::NET));
        assert!(!flags.contains(NamespaceFlags::MNT));

        flags.insert(NamespaceFlags::MNT);
        assert!(flags.contains(NamespaceFlags::MNT));
        assert_eq!(NamespaceFlags::from_bits(0xff), NamespaceFlags::ALL);
    }

    #[test]
    fn test_kinds_in_attach_order() {
        let kinds: Vec<_> = NamespaceFlags::ALL.kinds().collect();
        assert_eq!(kinds, NamespaceKind::ALL.to_vec());
        assert_eq!(kinds.last(), Some(&NamespaceKind::Mnt));
        assert_eq!(NamespaceFlags::ALL.to_string(), "net,pid,uts,mnt");
        assert_eq!(NamespaceFlags::NONE.to_string(), "none");
    }

    #[test]
    fn test_config_serde() {
        let config = NamespaceConfig::new().with_pid(true);
        let json = serde_json::to_string(&config).unwrap();
        let deserialized: NamespaceConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(config, deserialized);
    }
}
