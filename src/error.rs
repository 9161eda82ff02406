//! Error taxonomy for the build pipeline.
//!
//! Callers branch on the variant rather than on message text: precondition
//! problems (wrong directory, missing tool, nothing to compile) are reported
//! and exit with code 1, while a failing external command carries the exact
//! command line and the captured error text.

use std::path::PathBuf;

/// Exit code for precondition failures (wrong directory, missing tool).
pub const EXIT_PRECONDITION: u8 = 1;

/// Exit code for an external command that failed or timed out.
pub const EXIT_COMMAND_FAILED: u8 = 2;

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("{message}")]
    Precondition { message: String },

    #[error("{tool} not found\n{remediation}")]
    ToolNotFound { tool: String, remediation: String },

    #[error("no source files found under '{}'", .root.display())]
    NoSources { root: PathBuf },

    #[error("Command '{command}' failed with error: {error_text}")]
    ExternalCommand { command: String, error_text: String },

    #[error("Command '{command}' timed out after {seconds}s")]
    Timeout { command: String, seconds: u64 },

    #[error("failed to run '{command}'")]
    Process {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{action} '{}'", .path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl BuildError {
    pub fn precondition(message: impl Into<String>) -> Self {
        Self::Precondition {
            message: message.into(),
        }
    }

    /// True for failures detected before any external tool ran.
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            Self::Precondition { .. } | Self::ToolNotFound { .. } | Self::NoSources { .. }
        )
    }

    pub fn exit_code(&self) -> u8 {
        match self {
            Self::ExternalCommand { .. } | Self::Timeout { .. } => EXIT_COMMAND_FAILED,
            _ => EXIT_PRECONDITION,
        }
    }
}
