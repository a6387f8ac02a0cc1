//! Turning parsed options into the steps of one launch

use nsexec_core::{CgroupName, RtPriority};
use nsexec_namespace::{Lifecycle, NamespaceConfig, NamespaceFlags, NamespaceRequest, Resolution};
use std::os::fd::RawFd;

use crate::cli::Cli;

/// Everything the user asked for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchRequest {
    pub namespaces: NamespaceRequest,
    pub detach: bool,
    pub report_pid: bool,
    pub report_fd: Option<RawFd>,
    pub close_fds: bool,
    pub cgroup: Option<CgroupName>,
    pub rtprio: Option<RtPriority>,
    pub command: Vec<String>,
}

impl LaunchRequest {
    /// Build the request, or `None` when there is no command to run
    pub fn from_cli(cli: Cli) -> Option<Self> {
        if cli.command.is_empty() {
            return None;
        }

        let namespaces = match cli.attach {
            Some(pid) => NamespaceRequest::Attach(pid),
            None => NamespaceRequest::Create(
                NamespaceConfig::new()
                    .with_mount(cli.mount)
                    .with_network(cli.network)
                    .with_pid(cli.pid_namespace)
                    .with_uts(cli.uts),
            ),
        };

        Some(Self {
            namespaces,
            detach: cli.detach,
            // a report descriptor is pointless without a report
            report_pid: cli.report_pid || cli.report_fd.is_some(),
            report_fd: cli.report_fd,
            close_fds: cli.close_fds,
            cgroup: cli.cgroup,
            rtprio: cli.rtprio,
            command: cli.command,
        })
    }
}

/// What happens after the namespaces are in place
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchPlan {
    pub lifecycle: Lifecycle,
    /// Namespaces whose mounts need fixing up, only when they were created
    pub remediate: Option<NamespaceFlags>,
    pub cgroup: Option<CgroupName>,
    pub rtprio: Option<RtPriority>,
    pub command: Vec<String>,
}

impl LaunchPlan {
    pub fn build(request: LaunchRequest, resolution: &Resolution, group_leader: bool) -> Self {
        let remediate = (request.namespaces.is_create()
            && resolution.flags.contains(NamespaceFlags::MNT))
        .then_some(resolution.flags);

        Self {
            lifecycle: Lifecycle::decide(resolution.flags, request.detach, group_leader),
            remediate,
            cgroup: request.cgroup,
            rtprio: request.rtprio,
            command: request.command,
        }
    }
}
