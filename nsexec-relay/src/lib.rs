//! Receiving side of the launcher's PID report
//!
//! A relay creates a pipe, hands the write end to a child (usually the
//! launcher, or anything that speaks the same framing) and waits for one
//! report on the read end.

#![warn(missing_docs, clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod mode;
pub mod pipe;

pub use mode::RelayMode;
pub use pipe::{ReportPipe, read_report};
