//! PID report wire format
//!
//! A report is one control byte (`0x01`), the decimal PID and a newline.
//! The sentinel lets a line-oriented reader pick the PID out of ordinary
//! diagnostic text sharing the same stream.

use bytes::{Buf, BytesMut};
use std::fmt;
use std::fs::File;
use std::io::Write;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};
use std::path::Path;

use crate::{Error, ProcessId, Result};

/// Byte that opens every PID report
pub const SENTINEL: u8 = 0x01;

/// Byte that closes every PID report
pub const TERMINATOR: u8 = b'\n';

/// Longest decimal payload accepted (`i32::MAX` has ten digits)
const MAX_DIGITS: usize = 10;

/// A single PID report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PidReport {
    pid: ProcessId,
}

impl PidReport {
    /// Create a report for `pid`
    #[must_use]
    pub const fn new(pid: ProcessId) -> Self {
        Self { pid }
    }

    /// The reported process
    #[must_use]
    pub const fn pid(self) -> ProcessId {
        self.pid
    }

    /// Encode as `0x01`, decimal PID, `\n`
    #[must_use]
    pub fn encode(self) -> Vec<u8> {
        let digits = self.pid.to_string();
        let mut frame = Vec::with_capacity(digits.len() + 2);
        frame.push(SENTINEL);
        frame.extend_from_slice(digits.as_bytes());
        frame.push(TERMINATOR);
        frame
    }
}

impl fmt::Display for PidReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\u{1}{}\n", self.pid)
    }
}

/// Incremental decoder for PID reports
///
/// Input may arrive in arbitrary chunks. Anything before the sentinel is
/// treated as diagnostic text and dropped.
#[derive(Debug, Default)]
pub struct PidReportDecoder {
    buf: BytesMut,
}

impl PidReportDecoder {
    /// Create an empty decoder
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append bytes read from the stream
    pub fn feed(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    /// Try to decode one complete report
    ///
    /// Returns `Ok(None)` when more input is needed.
    ///
    /// # Errors
    /// Returns [`Error::MalformedReport`] if the bytes after the sentinel are
    /// not a positive decimal PID
    pub fn decode(&mut self) -> Result<Option<PidReport>> {
        let Some(start) = self.buf.iter().position(|&b| b == SENTINEL) else {
            self.skip_diagnostic(self.buf.len());
            return Ok(None);
        };
        self.skip_diagnostic(start);

        let payload_end = self.buf[1..].iter().position(|&b| b == TERMINATOR);
        let payload = match payload_end {
            Some(end) => &self.buf[1..=end],
            None => &self.buf[1..],
        };

        if let Some(bad) = payload.iter().find(|b| !b.is_ascii_digit()) {
            return Err(Error::MalformedReport {
                message: format!("unexpected byte {bad:#04x} in PID"),
            });
        }
        if payload.len() > MAX_DIGITS {
            return Err(Error::MalformedReport {
                message: format!("PID longer than {MAX_DIGITS} digits"),
            });
        }

        let Some(end) = payload_end else {
            return Ok(None);
        };

        let text = String::from_utf8_lossy(payload).into_owned();
        let pid = match text.parse::<i32>() {
            Ok(pid) if pid > 0 => ProcessId::from_raw(pid),
            _ => {
                return Err(Error::MalformedReport {
                    message: format!("'{text}' is not a valid PID"),
                });
            }
        };

        // sentinel + digits + terminator
        self.buf.advance(end + 2);
        Ok(Some(PidReport::new(pid)))
    }

    /// Decode the final report once the writer has closed the stream
    ///
    /// # Errors
    /// Returns [`Error::ReportMissing`] if no report was started and
    /// [`Error::MalformedReport`] if the stream ended inside a report
    pub fn decode_eof(&mut self) -> Result<PidReport> {
        if let Some(report) = self.decode()? {
            return Ok(report);
        }
        if self.buf.is_empty() {
            Err(Error::ReportMissing)
        } else {
            Err(Error::MalformedReport {
                message: "stream ended before the report terminator".to_string(),
            })
        }
    }

    fn skip_diagnostic(&mut self, len: usize) {
        if len == 0 {
            return;
        }
        let text = self.buf.split_to(len);
        tracing::debug!(
            text = %String::from_utf8_lossy(&text).trim_end(),
            "Skipping output preceding PID report"
        );
    }
}

/// Destination of the launcher's PID report
#[derive(Debug)]
pub enum ReportSink {
    /// Standard output of the launcher
    Stdout,
    /// A descriptor inherited from the caller
    Fd(File),
}

impl ReportSink {
    /// Adopt an inherited descriptor
    ///
    /// Descriptor 1 maps to [`ReportSink::Stdout`]. Stdin and stderr are
    /// refused, as is any descriptor that is not open.
    ///
    /// # Errors
    /// Returns [`Error::InvalidConfig`] if the descriptor cannot carry a report
    pub fn from_inherited(fd: RawFd) -> Result<Self> {
        match fd {
            1 => return Ok(Self::Stdout),
            fd if fd < 3 => {
                return Err(Error::InvalidConfig {
                    message: format!("descriptor {fd} cannot carry a PID report"),
                });
            }
            _ => {}
        }

        let link = Path::new("/proc/self/fd").join(fd.to_string());
        if std::fs::symlink_metadata(&link).is_err() {
            return Err(Error::InvalidConfig {
                message: format!("descriptor {fd} is not open"),
            });
        }

        // SAFETY: the descriptor was inherited from the caller, is open (checked
        // above) and nothing else in this process takes ownership of it.
        let owned = unsafe { OwnedFd::from_raw_fd(fd) };
        Ok(Self::Fd(File::from(owned)))
    }

    /// Raw descriptor number, if the sink is not stdout
    #[must_use]
    pub fn raw_fd(&self) -> Option<RawFd> {
        match self {
            Self::Stdout => None,
            Self::Fd(file) => Some(file.as_raw_fd()),
        }
    }

    /// Write `report` as a single frame
    ///
    /// # Errors
    /// Returns error if the write fails
    pub fn send(&mut self, report: PidReport) -> Result<()> {
        let frame = report.encode();
        match self {
            Self::Stdout => {
                let mut out = std::io::stdout().lock();
                out.flush()?;
                out.write_all(&frame)?;
                out.flush()?;
            }
            Self::Fd(file) => file.write_all(&frame)?,
        }
        tracing::debug!(pid = %report.pid(), fd = ?self.raw_fd(), "Sent PID report");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(pid: i32) -> PidReport {
        PidReport::new(ProcessId::from_raw(pid))
    }

    #[test]
    fn test_encode_framing() {
        assert_eq!(report(4242).encode(), b"\x014242\n");
        assert_eq!(report(1).encode(), b"\x011\n");
        assert_eq!(report(i32::MAX).to_string().as_bytes(), b"\x012147483647\n");
    }

    #[test]
    fn test_decode_split_at_every_boundary() {
        let frame = report(31337).encode();
        for split in 0..=frame.len() {
            let mut decoder = PidReportDecoder::new();
            decoder.feed(&frame[..split]);
            let early = decoder.decode().unwrap();
            decoder.feed(&frame[split..]);
            let decoded = early.or_else(|| decoder.decode().unwrap());
            assert_eq!(decoded, Some(report(31337)), "split at {split}");
        }
    }

    #[test]
    fn test_decode_skips_diagnostic_text() {
        let mut decoder = PidReportDecoder::new();
        decoder.feed(b"Command: ./nsexec -cnPup\nwarning: something\n");
        assert_eq!(decoder.decode().unwrap(), None);
        decoder.feed(b"more noise\x01977\n");
        assert_eq!(decoder.decode().unwrap(), Some(report(977)));
    }

    #[test]
    fn test_decode_rejects_garbage_payload() {
        let mut decoder = PidReportDecoder::new();
        decoder.feed(b"\x0112a4\n");
        assert!(matches!(
            decoder.decode(),
            Err(Error::MalformedReport { .. })
        ));

        let mut decoder = PidReportDecoder::new();
        decoder.feed(b"\x01\n");
        assert!(matches!(
            decoder.decode(),
            Err(Error::MalformedReport { .. })
        ));

        let mut decoder = PidReportDecoder::new();
        decoder.feed(b"\x0199999999999");
        assert!(matches!(
            decoder.decode(),
            Err(Error::MalformedReport { .. })
        ));
    }

    #[test]
    fn test_decode_eof() {
        let mut decoder = PidReportDecoder::new();
        assert!(matches!(decoder.decode_eof(), Err(Error::ReportMissing)));

        let mut decoder = PidReportDecoder::new();
        decoder.feed(b"exec failed\n");
        assert!(matches!(decoder.decode_eof(), Err(Error::ReportMissing)));

        let mut decoder = PidReportDecoder::new();
        decoder.feed(b"\x01123");
        assert!(matches!(
            decoder.decode_eof(),
            Err(Error::MalformedReport { .. })
        ));

        let mut decoder = PidReportDecoder::new();
        decoder.feed(b"\x01123\n");
        assert_eq!(decoder.decode_eof().unwrap(), report(123));
    }

    #[test]
    fn test_sink_refuses_stdio() {
        assert!(matches!(ReportSink::from_inherited(1), Ok(ReportSink::Stdout)));
        assert!(ReportSink::from_inherited(0).is_err());
        assert!(ReportSink::from_inherited(2).is_err());
        assert!(ReportSink::from_inherited(-1).is_err());
    }

    #[test]
    fn test_sink_writes_single_frame() {
        let (reader, writer) = nix::unistd::pipe().unwrap();
        let raw = std::os::fd::IntoRawFd::into_raw_fd(writer);

        let mut sink = ReportSink::from_inherited(raw).unwrap();
        assert_eq!(sink.raw_fd(), Some(raw));
        sink.send(report(5150)).unwrap();
        drop(sink);

        let mut bytes = Vec::new();
        std::io::Read::read_to_end(&mut File::from(reader), &mut bytes).unwrap();
        assert_eq!(bytes, b"\x015150\n");
    }
}
