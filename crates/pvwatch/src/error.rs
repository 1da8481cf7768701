//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with help text.

use miette::Diagnostic;
use thiserror::Error;

use pvwatch_config::ConfigError;
use pvwatch_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const NOT_FOUND: i32 = 4;
    pub const REJECTED: i32 = 5;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Channels ─────────────────────────────────────────────────────
    #[error("{name} is {state}: {message}")]
    #[diagnostic(
        code(pvwatch::channel_failed),
        help(
            "Check that the PV is served by an IOC on the search path.\n\
             Run: pvwatch config show"
        )
    )]
    ChannelFailed {
        name: String,
        state: String,
        message: String,
    },

    #[error("{key} is not subscribed")]
    #[diagnostic(
        code(pvwatch::not_subscribed),
        help("Fields are writable only once enrichment has found them. Try a longer --max-wait-ms.")
    )]
    NotSubscribed { key: String },

    #[error("Field {field} of {pv} has no value")]
    #[diagnostic(code(pvwatch::no_field))]
    FieldNotFound { pv: String, field: String },

    // ── Writes ───────────────────────────────────────────────────────
    #[error("Write to {key} rejected: {reason}")]
    #[diagnostic(code(pvwatch::write_rejected))]
    WriteRejected { key: String, reason: String },

    #[error("{operation} on {key} timed out after {timeout_ms}ms")]
    #[diagnostic(
        code(pvwatch::timeout),
        help("Raise the bound under [engine] in the config file.")
    )]
    Timeout {
        operation: String,
        key: String,
        timeout_ms: u64,
    },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(pvwatch::validation))]
    Validation { field: String, reason: String },

    // ── Engine / configuration ───────────────────────────────────────
    #[error(transparent)]
    #[diagnostic(code(pvwatch::engine))]
    Engine(CoreError),

    #[error(transparent)]
    #[diagnostic(
        code(pvwatch::config),
        help("Check the config file. Run: pvwatch config path")
    )]
    Config(#[from] ConfigError),

    // ── IO / Serialization ───────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Failed to render output: {0}")]
    #[diagnostic(code(pvwatch::json))]
    Json(#[from] serde_json::Error),

    #[error("Failed to render config: {0}")]
    #[diagnostic(code(pvwatch::toml))]
    Toml(#[from] toml::ser::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ChannelFailed { .. } => exit_code::CONNECTION,
            Self::NotSubscribed { .. } | Self::FieldNotFound { .. } => exit_code::NOT_FOUND,
            Self::WriteRejected { .. } => exit_code::REJECTED,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::Validation { .. } | Self::Config(ConfigError::Validation { .. }) => {
                exit_code::USAGE
            }
            _ => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::InvalidPvName { name } => Self::Validation {
                field: "pv".into(),
                reason: format!("invalid PV name {name:?}"),
            },
            CoreError::NotSubscribed { key } => Self::NotSubscribed { key },
            CoreError::Timeout {
                operation,
                key,
                timeout_ms,
            } => Self::Timeout {
                operation: operation.into(),
                key,
                timeout_ms,
            },
            CoreError::WriteRejected { key, reason } => Self::WriteRejected { key, reason },
            other => Self::Engine(other),
        }
    }
}
