//! Error types for the stop pass and its collaborators.

use thiserror::Error;

/// Result type alias for admin API calls.
pub type AdminResult<T> = Result<T, AdminError>;

/// Errors raised by a [`crate::SqlAdmin`] implementation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AdminError {
    /// The API answered with a non-success status.
    #[error("admin API returned {status}: {message}")]
    Api {
        status: u16,
        /// Machine-readable reason or status string, when the body had one.
        reason: Option<String>,
        message: String,
    },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("invalid response: {0}")]
    Decode(String),

    #[error("credentials unavailable: {0}")]
    Auth(String),
}

impl AdminError {
    /// HTTP status for API errors.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Fatal errors that abort a stop pass.
#[derive(Debug, Error)]
pub enum StopError {
    #[error("listing instances in project {project} failed: {source}")]
    List {
        project: String,
        #[source]
        source: AdminError,
    },

    #[error("stopping instance {instance} failed: {source}")]
    Patch {
        instance: String,
        #[source]
        source: AdminError,
    },
}

/// Errors resolving runtime configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no project id: pass --project, set GCP_PROJECT, or set `project` in the config file")]
    MissingProject,

    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("unknown tolerance policy {0:?} (expected replica-or-maintenance or any-client-error)")]
    UnknownTolerance(String),
}
