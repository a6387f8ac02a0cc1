//! Error types for nsexec

use std::time::Duration;

use thiserror::Error;

/// nsexec error types
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// System error from nix
    #[error("System error: {0}")]
    System(#[from] nix::Error),

    /// Namespace operation failed
    #[error("Namespace error: {message}")]
    Namespace {
        /// Error message
        message: String,
    },

    /// Mount remediation failed
    #[error("Mount error: {message}")]
    Mount {
        /// Error message
        message: String,
    },

    /// `CGroup` operation failed
    #[error("CGroup error: {message}")]
    CGroup {
        /// Error message
        message: String,
    },

    /// Fork, wait or session handling failed
    #[error("Process error: {message}")]
    Process {
        /// Error message
        message: String,
    },

    /// Scheduler class could not be applied
    #[error("Scheduling error: {message}")]
    Scheduling {
        /// Error message
        message: String,
    },

    /// The final image replacement failed
    #[error("{command}: {source}")]
    Exec {
        /// Command that could not be executed
        command: String,
        /// Underlying OS error
        source: nix::Error,
    },

    /// Invalid configuration
    #[error("Invalid configuration: {message}")]
    InvalidConfig {
        /// Error message
        message: String,
    },

    /// No PID report arrived before the deadline
    #[error("Timed out after {waited:?} waiting for a PID report")]
    Timeout {
        /// How long the reader waited
        waited: Duration,
    },

    /// The writer closed its end without sending a PID report
    #[error("Peer closed the report channel without sending a PID")]
    ReportMissing,

    /// Bytes after the report sentinel did not form a PID
    #[error("Malformed PID report: {message}")]
    MalformedReport {
        /// Error message
        message: String,
    },
}

/// Result type alias for nsexec operations
pub type Result<T> = std::result::Result<T, Error>;
