//! Process lifecycle: fork/wait around PID namespaces, session handling and
//! the final exec
//!
//! This module uses `unsafe` for fork() which is inherently unsafe
//! but necessary for proper PID namespace isolation. The launcher is
//! single-threaded, so the child may keep running ordinary Rust code.

#![allow(unsafe_code)]

use nix::sys::wait::{WaitStatus, waitpid};
use nix::unistd::{ForkResult, Pid, execvp, fork, getpgrp, getpid, setpgid, setsid};
use nsexec_core::{Error, PidReport, ProcessId, ReportSink, Result};
use std::convert::Infallible;
use std::ffi::CString;

use crate::config::NamespaceFlags;

/// Fork, wait and session decisions for one launch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lifecycle {
    /// Fork before the remaining setup
    pub fork: bool,
    /// Parent waits for the child, which is init of a PID namespace
    pub supervise: bool,
    /// Continuing process calls setsid(2) rather than setpgid(2)
    pub new_session: bool,
}

impl Lifecycle {
    /// Decide the lifecycle from the effective namespaces
    ///
    /// A PID namespace only applies to children, so entering one always
    /// forks and the parent stays behind to wait. Detaching from the
    /// terminal needs a fork only when we lead our process group, since a
    /// group leader cannot call setsid(2).
    #[must_use]
    pub const fn decide(flags: NamespaceFlags, detach: bool, group_leader: bool) -> Self {
        let pid_namespace = flags.contains(NamespaceFlags::PID);
        let fork = pid_namespace || (detach && group_leader);

        Self {
            fork,
            supervise: pid_namespace,
            new_session: detach && fork,
        }
    }
}

/// Which side of the lifecycle the caller is on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Forked parent; its work is done and it must exit without exec
    Supervisor {
        /// The forked child, as seen from the parent's PID namespace
        child: ProcessId,
    },
    /// The process that carries on with setup and exec
    Continue,
}

/// Check whether we lead our process group
#[must_use]
pub fn is_process_group_leader() -> bool {
    getpgrp() == getpid()
}

/// Fork if required, report the visible PID and settle the session
///
/// The PID report always names the process the orchestrator should track:
/// the forked child when there is one, ourselves otherwise.
///
/// # Errors
/// Returns error if fork, the PID report or setsid fails
pub fn run_lifecycle(lifecycle: Lifecycle, report: Option<&mut ReportSink>) -> Result<Role> {
    if lifecycle.fork {
        tracing::debug!(?lifecycle, "Forking");

        match unsafe { fork() } {
            Ok(ForkResult::Parent { child }) => {
                let child = ProcessId::from(child);
                let sent = report.map_or(Ok(()), |sink| sink.send(PidReport::new(child)));

                if lifecycle.supervise {
                    supervise(child);
                }

                sent?;
                return Ok(Role::Supervisor { child });
            }
            Ok(ForkResult::Child) => {}
            Err(e) => {
                return Err(Error::Process {
                    message: format!("fork: {e}"),
                });
            }
        }
    } else if let Some(sink) = report {
        sink.send(PidReport::new(ProcessId::current()))?;
    }

    enter_session(lifecycle.new_session)?;
    Ok(Role::Continue)
}

/// Wait for the PID namespace init to exit
///
/// Best effort: the exit status is only logged, and wait errors end the
/// wait without failing the launch.
fn supervise(child: ProcessId) {
    tracing::debug!(child = %child, "Waiting for namespace init");

    loop {
        match waitpid(child.as_nix_pid(), None) {
            Ok(WaitStatus::Exited(_, exit_code)) => {
                tracing::debug!(child = %child, exit_code, "Namespace init exited");
                return;
            }
            Ok(WaitStatus::Signaled(_, signal, _)) => {
                tracing::debug!(child = %child, ?signal, "Namespace init killed");
                return;
            }
            Ok(status) => {
                tracing::trace!(?status, "Child status changed, still waiting");
            }
            Err(nix::errno::Errno::EINTR) => {}
            Err(e) => {
                tracing::warn!(child = %child, error = %e, "Wait failed");
                return;
            }
        }
    }
}

/// Start a new session, or just a new process group
///
/// The process group keeps the orchestrator's killpg(2) scoped to this
/// subtree without tearing down a terminal session.
///
/// # Errors
/// Returns error if setsid(2) fails
pub fn enter_session(new_session: bool) -> Result<()> {
    if new_session {
        let sid = setsid().map_err(|e| Error::Process {
            message: format!("setsid: {e}"),
        })?;
        tracing::debug!(sid = sid.as_raw(), "Started new session");
    } else if let Err(e) = setpgid(Pid::from_raw(0), Pid::from_raw(0)) {
        tracing::warn!(error = %e, "Could not move to a new process group");
    }
    Ok(())
}

/// Replace the process image with `command`, searching `PATH`
///
/// Only returns on failure.
///
/// # Errors
/// Returns [`Error::Exec`] naming the command if execvp(3) fails
pub fn exec_command(command: &[String]) -> Result<Infallible> {
    let Some(program) = command.first() else {
        return Err(Error::InvalidConfig {
            message: "Command cannot be empty".to_string(),
        });
    };

    let args: Vec<CString> = command
        .iter()
        .map(|arg| CString::new(arg.as_bytes()))
        .collect::<std::result::Result<_, _>>()
        .map_err(|e| Error::InvalidConfig {
            message: format!("Invalid argument: {e}"),
        })?;

    tracing::debug!(command = ?command, "Executing");

    execvp(&args[0], &args).map_err(|source| Error::Exec {
        command: program.clone(),
        source,
    })
}
