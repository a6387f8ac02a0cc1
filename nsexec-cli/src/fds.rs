//! Descriptor hygiene for `-c`

use anyhow::{Context, Result};
use nix::fcntl::{FcntlArg, FdFlag, fcntl};
use std::os::fd::{BorrowedFd, RawFd};

/// Mark every open descriptor above stderr close-on-exec, except `keep`
///
/// Nothing is closed here, so a report descriptor stays usable until the
/// launcher drops it. Returns how many descriptors were marked.
pub fn close_on_exec_above_stderr(keep: Option<RawFd>) -> Result<usize> {
    // Kept open until the loop ends so every listed descriptor, its own
    // handle included, is still valid when borrowed.
    let mut listing = std::fs::read_dir("/proc/self/fd").context("Failed to list open descriptors")?;
    let open: Vec<RawFd> = listing
        .by_ref()
        .filter_map(|entry| entry.ok()?.file_name().to_str()?.parse().ok())
        .filter(|fd| *fd > 2 && Some(*fd) != keep)
        .collect();

    let mut marked = 0;
    for raw in open {
        // SAFETY: the descriptor was listed as open and the launcher is
        // single-threaded, so nothing closes it during the borrow.
        let fd = unsafe { BorrowedFd::borrow_raw(raw) };
        let flags = fcntl(fd, FcntlArg::F_GETFD)
            .with_context(|| format!("Failed to read flags of descriptor {raw}"))?;
        let flags = FdFlag::from_bits_truncate(flags) | FdFlag::FD_CLOEXEC;
        fcntl(fd, FcntlArg::F_SETFD(flags))
            .with_context(|| format!("Failed to mark descriptor {raw} close-on-exec"))?;
        marked += 1;
    }
    drop(listing);

    tracing::debug!(marked, keep = ?keep, "Marked inherited descriptors close-on-exec");
    Ok(marked)
}
