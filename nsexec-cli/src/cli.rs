//! CLI argument definitions

use clap::Parser;
use nsexec_core::{CgroupName, ProcessId, RtPriority};
use std::os::fd::RawFd;

#[derive(Parser, Debug)]
#[command(name = "nsexec")]
#[command(about = "Run a command in new or existing Linux namespaces", long_about = None)]
pub struct Cli {
    /// Mark inherited descriptors above stderr close-on-exec
    #[arg(short = 'c')]
    pub close_fds: bool,

    /// Detach from the controlling terminal
    #[arg(short = 'd')]
    pub detach: bool,

    /// New mount namespace
    #[arg(short = 'm')]
    pub mount: bool,

    /// New network namespace (implies -m)
    #[arg(short = 'n')]
    pub network: bool,

    /// New PID namespace (implies -m)
    #[arg(short = 'P')]
    pub pid_namespace: bool,

    /// Report the PID of the launched process
    #[arg(short = 'p')]
    pub report_pid: bool,

    /// New UTS namespace
    #[arg(short = 'u')]
    pub uts: bool,

    /// Attach to the namespaces of an existing process
    #[arg(
        short = 'a',
        value_name = "PID",
        conflicts_with_all = ["mount", "network", "pid_namespace", "uts"]
    )]
    pub attach: Option<ProcessId>,

    /// Join the named cgroup
    #[arg(short = 'g', value_name = "GROUP")]
    pub cgroup: Option<CgroupName>,

    /// Run with SCHED_RR at this priority (1-99)
    #[arg(short = 'r', value_name = "RTPRIO")]
    pub rtprio: Option<RtPriority>,

    /// Write the PID report to this inherited descriptor instead of stdout
    #[arg(short = 'w', value_name = "FD")]
    pub report_fd: Option<RawFd>,

    /// Print version
    #[arg(short = 'v', long = "version")]
    pub version: bool,

    /// Command to run, with its arguments
    #[arg(value_name = "COMMAND", trailing_var_arg = true, allow_hyphen_values = true)]
    pub command: Vec<String>,
}
