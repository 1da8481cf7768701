// ── Core error types ──
//
// Errors returned across the engine boundary. Per-field probe failures
// never surface here; they are absorbed and logged. Main-channel failures
// surface as an ERROR record, not as an error value. What remains are
// caller mistakes (bad name, unknown key) and failed writes.
// The `From<pvwatch_api::Error>` impl translates client-level errors.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    // ── Caller errors ────────────────────────────────────────────────
    #[error("Invalid PV name: {name:?}")]
    InvalidPvName { name: String },

    #[error("Not subscribed: {key}")]
    NotSubscribed { key: String },

    #[error("Subscription to {name} was cancelled")]
    Cancelled { name: String },

    // ── Write errors ─────────────────────────────────────────────────
    #[error("{operation} on {key} timed out after {timeout_ms}ms")]
    Timeout {
        operation: &'static str,
        key: String,
        timeout_ms: u64,
    },

    #[error("Write to {key} rejected: {reason}")]
    WriteRejected { key: String, reason: String },

    // ── Client errors (wrapped) ──────────────────────────────────────
    #[error("Client error: {0}")]
    Client(pvwatch_api::Error),

    // ── Lifecycle ────────────────────────────────────────────────────
    #[error("Engine has been shut down")]
    Shutdown,
}

// ── Conversion from client errors ────────────────────────────────────

impl From<pvwatch_api::Error> for CoreError {
    fn from(err: pvwatch_api::Error) -> Self {
        match err {
            pvwatch_api::Error::Timeout {
                operation,
                name,
                timeout_ms,
            } => Self::Timeout {
                operation,
                key: name,
                timeout_ms,
            },
            pvwatch_api::Error::WriteRejected { name, reason } => {
                Self::WriteRejected { key: name, reason }
            }
            pvwatch_api::Error::InvalidName(name) => Self::InvalidPvName { name },
            pvwatch_api::Error::ContextClosed => Self::Shutdown,
            other => Self::Client(other),
        }
    }
}
