//! Core type definitions with strong typing and validation

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::{Error, Result};

/// Process identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(transparent)]
#[serde(transparent)]
pub struct ProcessId(i32);

impl ProcessId {
    /// Create from raw PID
    #[must_use]
    pub const fn from_raw(pid: i32) -> Self {
        Self(pid)
    }

    /// Get the current process ID
    #[must_use]
    pub fn current() -> Self {
        Self::from(nix::unistd::getpid())
    }

    /// Convert to `nix::unistd::Pid`
    #[must_use]
    pub const fn as_nix_pid(self) -> nix::unistd::Pid {
        nix::unistd::Pid::from_raw(self.0)
    }

    /// Get raw PID value
    #[must_use]
    pub const fn as_raw(self) -> i32 {
        self.0
    }
}

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ProcessId {
    type Err = Error;

    /// Parse a PID given on the command line; only positive values name a process.
    fn from_str(s: &str) -> Result<Self> {
        match s.trim().parse::<i32>() {
            Ok(pid) if pid > 0 => Ok(Self(pid)),
            _ => Err(Error::InvalidConfig {
                message: format!("invalid pid: {s}"),
            }),
        }
    }
}

impl From<nix::unistd::Pid> for ProcessId {
    fn from(pid: nix::unistd::Pid) -> Self {
        Self(pid.as_raw())
    }
}

impl From<ProcessId> for nix::unistd::Pid {
    fn from(pid: ProcessId) -> Self {
        nix::unistd::Pid::from_raw(pid.0)
    }
}

/// Cgroup name, validated so it can be spliced into `/sys/fs/cgroup` paths
///
/// Only ASCII alphanumerics and `/` are accepted (`foo1/bar2/baz`), which
/// rules out `..`, whitespace and anything else that could escape the
/// controller directory. Every `/`-separated segment must be non-empty, so
/// the name is always relative.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(transparent)]
#[serde(try_from = "String", into = "String")]
pub struct CgroupName(String);

impl CgroupName {
    /// Create a new `CgroupName` with validation
    ///
    /// # Errors
    /// Returns error if the name is empty, contains a character other than
    /// an ASCII alphanumeric or `/`, or has an empty segment
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        Self::validate(&name)?;
        Ok(Self(name))
    }

    fn validate(name: &str) -> Result<()> {
        if name.is_empty() {
            return Err(Error::InvalidConfig {
                message: "cgroup name cannot be empty".to_string(),
            });
        }

        if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '/') {
            return Err(Error::InvalidConfig {
                message: format!("invalid path: {name}"),
            });
        }

        // An absolute name would replace the hierarchy root when joined
        if name.split('/').any(str::is_empty) {
            return Err(Error::InvalidConfig {
                message: format!("invalid path: {name}"),
            });
        }

        Ok(())
    }

    /// Get the cgroup name as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CgroupName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for CgroupName {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl TryFrom<String> for CgroupName {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        Self::new(s)
    }
}

impl From<CgroupName> for String {
    fn from(name: CgroupName) -> Self {
        name.0
    }
}

/// Real-time (`SCHED_RR`) priority
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(transparent)]
#[serde(try_from = "i32", into = "i32")]
pub struct RtPriority(i32);

impl RtPriority {
    /// Lowest real-time priority
    pub const MIN: i32 = 1;
    /// Highest real-time priority
    pub const MAX: i32 = 99;

    /// Create a new priority
    ///
    /// # Errors
    /// Returns error if `priority` is outside `MIN..=MAX`
    pub fn new(priority: i32) -> Result<Self> {
        if (Self::MIN..=Self::MAX).contains(&priority) {
            Ok(Self(priority))
        } else {
            Err(Error::InvalidConfig {
                message: format!(
                    "rtprio must be between {} and {}, got {priority}",
                    Self::MIN,
                    Self::MAX
                ),
            })
        }
    }

    /// Get raw priority value
    #[must_use]
    pub const fn as_raw(self) -> i32 {
        self.0
    }
}

impl fmt::Display for RtPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RtPriority {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let priority = s.trim().parse::<i32>().map_err(|_| Error::InvalidConfig {
            message: format!("invalid rtprio: {s}"),
        })?;
        Self::new(priority)
    }
}

impl TryFrom<i32> for RtPriority {
    type Error = Error;

    fn try_from(priority: i32) -> Result<Self> {
        Self::new(priority)
    }
}

impl From<RtPriority> for i32 {
    fn from(priority: RtPriority) -> Self {
        priority.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_process_id() {
        let pid = ProcessId::from_raw(123);
        assert_eq!(pid.as_raw(), 123);

        let nix_pid = pid.as_nix_pid();
        assert_eq!(nix_pid.as_raw(), 123);
    }

    #[test]
    fn test_process_id_parse() {
        assert_eq!("42".parse::<ProcessId>().unwrap(), ProcessId::from_raw(42));
        assert!("0".parse::<ProcessId>().is_err());
        assert!("-7".parse::<ProcessId>().is_err());
        assert!("abc".parse::<ProcessId>().is_err());
    }

    #[test]
    fn test_current_process_id() {
        #[allow(clippy::cast_possible_wrap)]
        let expected = std::process::id() as i32;
        assert_eq!(ProcessId::current().as_raw(), expected);
    }

    #[test]
    fn test_cgroup_name_validation() {
        assert!(CgroupName::new("h1").is_ok());
        assert!(CgroupName::new("foo1/bar2/baz").is_ok());
        assert!(CgroupName::new("").is_err());
        assert!(CgroupName::new("../etc").is_err());
        assert!(CgroupName::new("with space").is_err());
        assert!(CgroupName::new("dash-ed").is_err());
        assert!(CgroupName::new("new\nline").is_err());
        assert!(CgroupName::new("ünïcode").is_err());
    }

    #[test]
    fn test_cgroup_name_must_be_relative() {
        assert!(CgroupName::new("/etc").is_err());
        assert!(CgroupName::new("/sys/fs/cgroup").is_err());
        assert!(CgroupName::new("/").is_err());
        assert!(CgroupName::new("a//b").is_err());
        assert!(CgroupName::new("a/b/").is_err());
        assert!(serde_json::from_str::<CgroupName>("\"/tmp/x\"").is_err());
    }

    #[test]
    fn test_cgroup_name_serde() {
        let name = CgroupName::new("mininet/h1").unwrap();
        let json = serde_json::to_string(&name).unwrap();
        let deserialized: CgroupName = serde_json::from_str(&json).unwrap();
        assert_eq!(name, deserialized);

        assert!(serde_json::from_str::<CgroupName>("\"a.b\"").is_err());
    }

    #[test]
    fn test_rt_priority_bounds() {
        assert!(RtPriority::new(0).is_err());
        assert_eq!(RtPriority::new(1).unwrap().as_raw(), 1);
        assert_eq!(RtPriority::new(99).unwrap().as_raw(), 99);
        assert!(RtPriority::new(100).is_err());
        assert_eq!("50".parse::<RtPriority>().unwrap().as_raw(), 50);
        assert!("fast".parse::<RtPriority>().is_err());
    }
}
