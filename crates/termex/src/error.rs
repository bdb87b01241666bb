//! Error types shared across the harness.

use miette::Diagnostic;
use serde_json::Value;
use std::fmt;

/// Result alias used throughout the library.
pub type HarnessResult<T> = Result<T, HarnessError>;

/// Category of a harness failure.
///
/// These are hard errors of the harness itself; a program under test that
/// never reaches an expected screen is reported through the replay verdict,
/// not through this type.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorCode {
    /// Process or pty creation failed.
    Spawn,
    /// Read/write on the pty descriptor failed for a reason other than
    /// orderly close.
    Connection,
    /// Malformed or incomplete playbook document.
    Playbook,
    /// No pty event arrived within the wait budget.
    Timeout,
    /// File or terminal I/O outside the pty channel.
    Io,
    /// Invariant violation inside the harness itself.
    Internal,
}

impl ErrorCode {
    /// Stable identifier used in log lines and error context.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Spawn => "E_SPAWN",
            Self::Connection => "E_CONNECTION",
            Self::Playbook => "E_PLAYBOOK",
            Self::Timeout => "E_TIMEOUT",
            Self::Io => "E_IO",
            Self::Internal => "E_INTERNAL",
        }
    }
}

/// Error value carried through every fallible harness operation.
#[derive(Debug)]
pub struct HarnessError {
    /// Failure category.
    pub code: ErrorCode,
    /// Human-readable description.
    pub message: String,
    /// Optional structured context for diagnostics.
    pub context: Option<Value>,
}

impl HarnessError {
    fn new(code: ErrorCode, message: impl Into<String>, context: Option<Value>) -> Self {
        Self {
            code,
            message: message.into(),
            context,
        }
    }

    /// Pty/process creation failure.
    pub fn spawn(message: impl Into<String>, err: impl fmt::Display) -> Self {
        Self::new(
            ErrorCode::Spawn,
            message,
            Some(serde_json::json!({ "source": err.to_string() })),
        )
    }

    /// Pty read/write failure other than orderly close.
    pub fn connection(message: impl Into<String>, err: impl fmt::Display) -> Self {
        Self::new(
            ErrorCode::Connection,
            message,
            Some(serde_json::json!({ "source": err.to_string() })),
        )
    }

    /// Malformed playbook document.
    pub fn playbook(message: impl Into<String>, context: impl Into<Option<Value>>) -> Self {
        Self::new(ErrorCode::Playbook, message, context.into())
    }

    /// Wait budget exhausted.
    pub fn timeout(message: impl Into<String>, context: impl Into<Option<Value>>) -> Self {
        Self::new(ErrorCode::Timeout, message, context.into())
    }

    /// Non-pty I/O failure.
    pub fn io(message: impl Into<String>, err: impl fmt::Display) -> Self {
        Self::new(
            ErrorCode::Io,
            message,
            Some(serde_json::json!({ "source": err.to_string() })),
        )
    }

    /// Internal invariant violation.
    pub fn internal(message: impl Into<String>, context: impl Into<Option<Value>>) -> Self {
        Self::new(ErrorCode::Internal, message, context.into())
    }
}

impl fmt::Display for HarnessError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code.as_str(), self.message)
    }
}

impl std::error::Error for HarnessError {}

impl Diagnostic for HarnessError {}
