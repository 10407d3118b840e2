use std::path::PathBuf;

use thiserror::Error;

/// The failure conditions reported by the automation engine.
///
/// Every failure is surfaced to the caller as one of these variants; nothing
/// is silently swallowed or retried across a process-liveness boundary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AutomationError {
    /// The target process has exited, or was never seen by a discovery pass.
    #[error("process {pid} is not running")]
    ProcessNotRunning {
        /// Identifier of the missing process.
        pid: u32,
    },

    /// A control could not be located within the bounded retry window.
    #[error("control {query} not found in process {pid}")]
    ControlNotFound {
        /// Identifier of the process whose window was searched.
        pid: u32,
        /// Description of the control query that came up empty.
        query: String,
    },

    /// A previously resolved handle no longer refers to a live control.
    #[error("control handle no longer resolves to a live control")]
    ControlUnavailable,

    /// The destination file already exists and the request disallows
    /// replacing it.
    #[error("destination {} already exists", .0.display())]
    DestinationConflict(PathBuf),

    /// The destination failed validation before any UI action was taken.
    #[error("invalid destination {}: {}", .path.display(), .reason)]
    InvalidDestination {
        /// The rejected destination path.
        path: PathBuf,
        /// Why the destination was rejected.
        reason: String,
    },

    /// `save` was called before any talk text was set for this cycle.
    #[error("no talk text has been set for this synthesis cycle")]
    NoTextSet,

    /// The operation did not reach a terminal condition within its bound.
    #[error("operation timed out")]
    TimedOut,

    /// The operation was cancelled by the caller.
    #[error("operation cancelled")]
    Cancelled,

    /// The automation thread is no longer running.
    #[error("automation thread is no longer running")]
    AgentGone,

    /// An operating-system level failure outside the taxonomy above.
    #[error("platform error: {0}")]
    Platform(String),
}
