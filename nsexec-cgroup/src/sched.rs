//! Real-time scheduling

#![allow(unsafe_code)]

use nsexec_core::{Error, Result, RtPriority};

/// Switch the calling process to `SCHED_RR` at `priority`
///
/// Usually paired with a cgroup so a runaway real-time task stays bounded.
///
/// # Errors
/// Returns [`Error::Scheduling`] if the kernel refuses the policy, typically
/// for lack of `CAP_SYS_NICE` or an `RLIMIT_RTPRIO` allowance
pub fn set_realtime(priority: RtPriority) -> Result<()> {
    // SAFETY: sched_param is plain data; zeroing covers the extra fields some
    // libcs define.
    let mut param: libc::sched_param = unsafe { std::mem::zeroed() };
    param.sched_priority = priority.as_raw();

    // SAFETY: pid 0 is the calling process and `param` outlives the call.
    let rc = unsafe { libc::sched_setscheduler(0, libc::SCHED_RR, &raw const param) };
    if rc < 0 {
        let err = std::io::Error::last_os_error();
        return Err(Error::Scheduling {
            message: format!("sched_setscheduler: {err}"),
        });
    }

    tracing::debug!(priority = %priority, "Set SCHED_RR");
    Ok(())
}

/// Scheduling policy of the calling process (`SCHED_*` constant)
///
/// # Errors
/// Returns error if sched_getscheduler(2) fails
pub fn current_policy() -> Result<i32> {
    // SAFETY: no pointers involved; pid 0 is the calling process.
    let policy = unsafe { libc::sched_getscheduler(0) };
    if policy < 0 {
        return Err(std::io::Error::last_os_error().into());
    }
    Ok(policy)
}
