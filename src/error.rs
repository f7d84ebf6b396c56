//! Error types for webpbin operations.

use crate::cancel::StopReason;
use core::fmt;
use whereat::At;

/// Result type for webpbin operations.
///
/// Errors are wrapped in [`At`] so they carry the location they were raised at.
pub type Result<T> = core::result::Result<T, At<Error>>;

/// Error type for webpbin operations.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum Error {
    /// Missing or contradictory input/output selection, detected before any
    /// subprocess is launched.
    Configuration(String),
    /// The tool binary could not be located or acquired.
    Resolution(String),
    /// The tool failed to launch or exited unsuccessfully.
    Execution(ExecutionFailure),
    /// Execution was aborted by a cancellation signal.
    Cancelled(StopReason),
    /// The PNG bridge failed to encode or decode an image.
    Codec(String),
}

impl Error {
    /// Whether this error was caused by the caller's cancellation signal.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled(_))
    }

    /// Captured standard error of the tool, if this is an execution failure.
    #[must_use]
    pub fn stderr(&self) -> Option<&str> {
        match self {
            Error::Execution(failure) => Some(&failure.stderr),
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Configuration(msg) => write!(f, "configuration error: {}", msg),
            Error::Resolution(msg) => write!(f, "binary resolution failed: {}", msg),
            Error::Execution(e) => write!(f, "{}", e),
            Error::Cancelled(reason) => write!(f, "operation cancelled ({:?})", reason),
            Error::Codec(msg) => write!(f, "PNG bridge error: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

/// Details of a failed tool execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionFailure {
    /// Program that was executed (file name or path).
    pub program: String,
    /// Exit code, or `None` if the process never ran or was killed by a signal.
    pub status: Option<i32>,
    /// What went wrong, e.g. "exited with status 1" or a launch error.
    pub detail: String,
    /// Standard error captured from the tool, verbatim (lossy UTF-8).
    pub stderr: String,
}

impl fmt::Display for ExecutionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.program, self.detail)?;
        if !self.stderr.is_empty() {
            write!(f, ". stderr: {}", self.stderr)?;
        }
        Ok(())
    }
}
