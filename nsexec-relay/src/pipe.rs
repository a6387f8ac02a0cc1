//! Report pipe and deadline-bounded reader

use nix::fcntl::{FcntlArg, FdFlag, fcntl};
use nsexec_core::{Error, PidReport, PidReportDecoder, Result};
use std::os::fd::{AsRawFd, OwnedFd, RawFd};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::net::unix::pipe::Receiver;

const READ_CHUNK: usize = 64;

/// Anonymous pipe carrying one PID report from a child
///
/// The read end is close-on-exec; the write end is inherited by children.
#[derive(Debug)]
pub struct ReportPipe {
    reader: OwnedFd,
    writer: OwnedFd,
}

impl ReportPipe {
    /// Create the pipe
    ///
    /// # Errors
    /// Returns error if pipe(2) or fcntl(2) fails
    pub fn new() -> Result<Self> {
        let (reader, writer) = nix::unistd::pipe()?;

        fcntl(&reader, FcntlArg::F_SETFD(FdFlag::FD_CLOEXEC))?;

        tracing::debug!(
            reader = reader.as_raw_fd(),
            writer = writer.as_raw_fd(),
            "Created report pipe"
        );
        Ok(Self { reader, writer })
    }

    /// Descriptor number children should write the report to
    #[must_use]
    pub fn writer_fd(&self) -> RawFd {
        self.writer.as_raw_fd()
    }

    /// Close our copy of the write end and return the async read end
    ///
    /// Call after spawning the child, so EOF means every writer has gone.
    /// Must run inside a tokio runtime.
    ///
    /// # Errors
    /// Returns error if the descriptor cannot be registered with the runtime
    pub fn into_reader(self) -> Result<Receiver> {
        drop(self.writer);
        Ok(Receiver::from_owned_fd(self.reader)?)
    }
}

/// Read a single PID report from `reader`, giving up after `deadline`
///
/// Text ahead of the report sentinel is logged and skipped.
///
/// # Errors
/// - [`Error::Timeout`] if no full report arrived in time
/// - [`Error::ReportMissing`] if the writer closed without reporting
/// - [`Error::MalformedReport`] if the bytes after the sentinel are not a PID
pub async fn read_report<R>(reader: &mut R, deadline: Duration) -> Result<PidReport>
where
    R: AsyncRead + Unpin,
{
    match tokio::time::timeout(deadline, read_frame(reader)).await {
        Ok(result) => result,
        Err(_) => Err(Error::Timeout { waited: deadline }),
    }
}

async fn read_frame<R>(reader: &mut R) -> Result<PidReport>
where
    R: AsyncRead + Unpin,
{
    let mut decoder = PidReportDecoder::new();
    let mut chunk = [0u8; READ_CHUNK];

    loop {
        let n = reader.read(&mut chunk).await?;
        if n == 0 {
            return decoder.decode_eof();
        }

        decoder.feed(&chunk[..n]);
        if let Some(report) = decoder.decode()? {
            tracing::debug!(pid = %report.pid(), "Received PID report");
            return Ok(report);
        }
    }
}
