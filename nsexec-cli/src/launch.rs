//! One launch, from parsed options to the final exec

use anyhow::{Context, Result};
use clap::CommandFactory;
use nsexec_cgroup::{CgroupJoiner, set_realtime};
use nsexec_core::{ProcessId, ReportSink};
use nsexec_namespace::executor::{exec_command, is_process_group_leader, run_lifecycle};
use nsexec_namespace::{NamespaceRequest, NamespaceResolver, Role, mount};
use tracing::{debug, info};

use crate::cli::Cli;
use crate::fds;
use crate::plan::{LaunchPlan, LaunchRequest};

/// Run the launch described by `cli`
///
/// Returns only in the supervising parent, when there is nothing to run,
/// or on error. Otherwise the process image is replaced by the command.
pub fn execute(cli: Cli) -> Result<()> {
    let Some(request) = LaunchRequest::from_cli(cli) else {
        Cli::command().print_help()?;
        return Ok(());
    };

    let mut sink = if request.report_pid {
        let sink = match request.report_fd {
            Some(fd) => ReportSink::from_inherited(fd).context("Invalid report descriptor")?,
            None => ReportSink::Stdout,
        };
        Some(sink)
    } else {
        None
    };

    if request.close_fds {
        fds::close_on_exec_above_stderr(sink.as_ref().and_then(ReportSink::raw_fd))?;
    }

    let resolution = NamespaceResolver::new()
        .resolve(&request.namespaces)
        .with_context(|| match request.namespaces {
            NamespaceRequest::Attach(pid) => format!("Failed to attach to namespaces of {pid}"),
            NamespaceRequest::Create(_) => "Failed to create namespaces".to_string(),
        })?;
    debug!(flags = %resolution.flags, "Namespaces in place");

    let plan = LaunchPlan::build(request, &resolution, is_process_group_leader());

    if let Role::Supervisor { child } = run_lifecycle(plan.lifecycle, sink.as_mut())? {
        debug!(child = %child, "Launcher parent done");
        return Ok(());
    }
    drop(sink);

    if let Some(name) = &plan.cgroup {
        CgroupJoiner::new().join(name, ProcessId::current())?;
    }

    if let Some(flags) = plan.remediate {
        mount::remediate(flags)?;
    }

    if let Some(priority) = plan.rtprio {
        set_realtime(priority)?;
    }

    info!(command = ?plan.command, "Launching");
    let Err(e) = exec_command(&plan.command);
    Err(e.into())
}
