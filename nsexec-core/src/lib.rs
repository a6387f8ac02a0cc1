//! nsexec Core - Foundation types shared by the launcher and the relay
//!
//! This crate provides the error type, validated value types and the PID
//! report wire format.

#![warn(missing_docs, clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod report;
pub mod types;

pub use error::{Error, Result};
pub use report::{PidReport, PidReportDecoder, ReportSink};
pub use types::{CgroupName, ProcessId, RtPriority};
