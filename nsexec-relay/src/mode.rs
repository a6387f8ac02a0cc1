//! How the child learns where to write its report

use std::ffi::OsString;
use std::os::fd::RawFd;
use std::path::PathBuf;

/// Options the wrapped launcher runs with: close descriptors, new network,
/// PID and UTS namespaces, report the PID
pub const WRAP_FLAGS: &str = "-cnPup";

/// Child command layout
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayMode {
    /// Run the command under the launcher, which reports through `-w <fd>`
    Wrap {
        /// Launcher executable
        launcher: PathBuf,
    },
    /// Run the command as is, with the descriptor number appended
    Direct,
}

impl RelayMode {
    /// Full argument vector of the child, program first
    #[must_use]
    pub fn argv(&self, fd: RawFd, command: &[String]) -> Vec<OsString> {
        let fd = OsString::from(fd.to_string());

        match self {
            Self::Wrap { launcher } => {
                let mut argv = vec![
                    launcher.clone().into_os_string(),
                    WRAP_FLAGS.into(),
                    "-w".into(),
                    fd,
                ];
                argv.extend(command.iter().map(OsString::from));
                argv
            }
            Self::Direct => {
                let mut argv: Vec<OsString> = command.iter().map(OsString::from).collect();
                argv.push(fd);
                argv
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn command() -> Vec<String> {
        vec!["sleep".to_string(), "30".to_string()]
    }

    #[test]
    fn test_wrap_argv() {
        let mode = RelayMode::Wrap {
            launcher: PathBuf::from("/usr/local/bin/nsexec"),
        };
        assert_eq!(
            mode.argv(5, &command()),
            ["/usr/local/bin/nsexec", "-cnPup", "-w", "5", "sleep", "30"]
                .map(OsString::from)
        );
    }

    #[test]
    fn test_direct_argv_appends_descriptor() {
        assert_eq!(
            RelayMode::Direct.argv(9, &command()),
            ["sleep", "30", "9"].map(OsString::from)
        );
    }
}
