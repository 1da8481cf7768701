use thiserror::Error;

use crate::value::ValueKind;

/// Top-level error type for the `pvwatch-api` crate.
///
/// Covers every failure mode of the channel primitives: connection,
/// reads, writes, monitors, and the process-wide client context.
/// `pvwatch-core` maps these into user-facing diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    // ── Bounded operations ──────────────────────────────────────────
    /// A connect, get, or put did not complete within its bound.
    #[error("{operation} on {name} timed out after {timeout_ms}ms")]
    Timeout {
        operation: &'static str,
        name: String,
        timeout_ms: u64,
    },

    // ── Channel state ───────────────────────────────────────────────
    /// Operation requires a connected channel.
    #[error("Channel {name} is not connected")]
    Disconnected { name: String },

    /// The server cannot deliver the channel's value as the requested type.
    #[error("Channel {name} cannot be read as {kind}")]
    TypeMismatch { name: String, kind: ValueKind },

    /// The server refused a write (read-only record, bad value, access rights).
    #[error("Write to {name} rejected: {reason}")]
    WriteRejected { name: String, reason: String },

    // ── Handles ─────────────────────────────────────────────────────
    /// A channel or monitor handle that is not (or no longer) open.
    #[error("Unknown handle {id}")]
    UnknownHandle { id: u64 },

    /// Channel names must be non-empty and free of whitespace.
    #[error("Invalid channel name: {0:?}")]
    InvalidName(String),

    // ── Context ─────────────────────────────────────────────────────
    /// The process-wide client context has been shut down.
    #[error("Client context is closed")]
    ContextClosed,
}

impl Error {
    /// Returns `true` if a bounded operation ran out of time.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Returns `true` if a fresh attempt later might succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::Disconnected { .. })
    }

    pub(crate) fn timeout(operation: &'static str, name: &str, timeout: std::time::Duration) -> Self {
        Self::Timeout {
            operation,
            name: name.to_owned(),
            timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn timeout_is_transient() {
        let err = Error::timeout("connect", "SR:CURRENT", Duration::from_millis(500));
        assert!(err.is_timeout());
        assert!(err.is_transient());
        assert_eq!(err.to_string(), "connect on SR:CURRENT timed out after 500ms");
    }

    #[test]
    fn rejected_write_is_not_transient() {
        let err = Error::WriteRejected {
            name: "SR:CURRENT".into(),
            reason: "read-only".into(),
        };
        assert!(!err.is_transient());
        assert!(!err.is_timeout());
    }
}
