//! Debugger errors.

use std::path::PathBuf;

use smol_str::SmolStr;
use thiserror::Error;

/// Errors surfaced to the operator. None of them reach the traced program.
#[derive(Debug, Error)]
pub enum DebugError {
    /// A source unit could not be read.
    #[error("failed to load source unit {}: {source}", path.display())]
    SourceLoad {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Session state could not be read or written.
    #[error("session file {}: {source}", path.display())]
    SessionIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Session state was not valid JSON for this format.
    #[error("invalid session state: {0}")]
    SessionDecode(#[from] serde_json::Error),

    /// Session state written by an incompatible version.
    #[error("unsupported session version {0}")]
    SessionVersion(u32),

    /// The configuration file could not be read.
    #[error("failed to read config {}: {source}", path.display())]
    ConfigIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Invalid debugger configuration.
    #[error("invalid config: {0}")]
    InvalidConfig(SmolStr),

    /// A hook is already installed on the host runtime.
    #[error("debugger already attached")]
    AlreadyAttached,
}
