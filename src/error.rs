/// Error handling module for Fleet Runner.
///
/// This module defines the error types used throughout the library.
/// Every controller operation reports its outcome through this single enum,
/// so callers can tell expected outcomes (a server that is already running)
/// apart from real failures (a download that did not complete).
///
/// # Example
///
/// ```
/// use fleet_runner::error::{Error, Result};
///
/// fn handle_error(result: Result<()>) {
///     match result {
///         Ok(_) => println!("Operation succeeded"),
///         Err(Error::NotFound(name)) => println!("Server '{}' does not exist", name),
///         Err(Error::MissingArtifact { server, file }) => {
///             println!("{} has no {}, run an update first", server, file)
///         }
///         Err(e) if e.is_expected() => println!("{}", e),
///         Err(e) => println!("Operation failed: {}", e),
///     }
/// }
/// ```
use thiserror::Error;

/// Errors that can occur in the fleet-runner library.
///
/// All variants carry owned string context, which keeps the enum `Clone`
/// so one failed download can be reported to every caller waiting on it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// No server with the given display name is registered.
    #[error("Server does not exist or is not loaded: {0}")]
    NotFound(String),

    /// The server process is already running.
    #[error("{0} is already running")]
    AlreadyRunning(String),

    /// The server process is not running.
    ///
    /// Returned by `stop` and `restart` on a stopped server. For `stop` this is
    /// a no-op outcome rather than a failure.
    #[error("{0} is not running")]
    NotRunning(String),

    /// The server is in a transient state (starting or stopping).
    #[error("{0} is busy")]
    Busy(String),

    /// The configured artifact file is absent from the server's root directory.
    #[error("Unable to find {file} for {server}, place the file in its directory or run an update")]
    MissingArtifact {
        /// Display name of the server
        server: String,
        /// Artifact file name that was expected
        file: String,
    },

    /// The server has no logical artifact version configured.
    #[error("{0} has no artifact version configured")]
    MissingArtifactReference(String),

    /// The requested operation is not supported for this server kind.
    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    /// The provisioner cannot fetch artifacts for this server kind.
    #[error("Unsupported server kind: {0}")]
    UnsupportedKind(String),

    /// The catalog does not know the requested logical version.
    #[error("Invalid artifact version: {0}")]
    InvalidVersion(String),

    /// An artifact could not be downloaded or failed verification.
    #[error("Download failed: {0}")]
    DownloadFailed(String),

    /// The artifact catalog is not set up or not ready.
    #[error("Artifact provisioning is currently unavailable, install the artifact manually")]
    ProvisionerUnavailable,

    /// The setting name is not part of the server configuration.
    #[error("Unknown setting '{0}'")]
    UnknownSetting(String),

    /// The setting identifies the server and cannot be changed through `set`.
    #[error("Setting '{0}' is protected")]
    ProtectedSetting(String),

    /// A raw value could not be converted to the setting's declared type.
    #[error("Invalid value '{value}' for setting '{key}', expected {expected}")]
    TypeMismatch {
        /// Setting name
        key: String,
        /// Raw value as supplied
        value: String,
        /// Description of the expected type
        expected: String,
    },

    /// Configuration could not be written to durable storage.
    #[error("Failed to persist configuration: {0}")]
    PersistFailed(String),

    /// The server process could not be launched.
    #[error("Failed to start server: {0}")]
    StartFailed(String),

    /// A downloaded artifact could not be placed into a server directory.
    #[error("Failed to install artifact: {0}")]
    InstallFailed(String),

    /// A step of the update pipeline failed.
    #[error("Failed to update {server}: {cause}")]
    UpdateFailed {
        /// Display name of the server
        server: String,
        /// The step failure that aborted the update
        cause: Box<Error>,
    },

    /// Failed to parse configuration from a file or string.
    #[error("Failed to parse configuration: {0}")]
    ConfigParse(String),

    /// Configuration parsed but contains invalid values.
    #[error("Invalid configuration: {0}")]
    ConfigInvalid(String),

    /// Error while signalling or waiting on a server process.
    #[error("Server process error: {0}")]
    Process(String),

    /// A console command line could not be understood.
    #[error("Usage: {0}")]
    Usage(String),

    /// Any other error not covered by the above categories.
    #[error("Other error: {0}")]
    Other(String),
}

impl Error {
    /// Returns `true` for lookup and validation outcomes.
    ///
    /// These are reported to the caller as-is and are never worth retrying.
    pub fn is_expected(&self) -> bool {
        matches!(
            self,
            Error::NotFound(_)
                | Error::AlreadyRunning(_)
                | Error::NotRunning(_)
                | Error::Busy(_)
                | Error::MissingArtifact { .. }
                | Error::MissingArtifactReference(_)
                | Error::UnsupportedOperation(_)
                | Error::UnknownSetting(_)
                | Error::ProtectedSetting(_)
                | Error::TypeMismatch { .. }
                | Error::Usage(_)
        )
    }

    /// Returns `true` for I/O failures a caller may choose to retry.
    pub fn is_transient(&self) -> bool {
        match self {
            Error::DownloadFailed(_) | Error::PersistFailed(_) | Error::StartFailed(_) => true,
            Error::UpdateFailed { cause, .. } => cause.is_transient(),
            _ => false,
        }
    }
}

/// Result type for fleet-runner operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        assert!(Error::AlreadyRunning("Alpha".into()).is_expected());
        assert!(!Error::AlreadyRunning("Alpha".into()).is_transient());
        assert!(Error::DownloadFailed("timeout".into()).is_transient());

        let wrapped = Error::UpdateFailed {
            server: "Alpha".into(),
            cause: Box::new(Error::DownloadFailed("reset".into())),
        };
        assert!(wrapped.is_transient());
        assert!(!wrapped.is_expected());
    }

    #[test]
    fn test_messages() {
        let err = Error::MissingArtifact {
            server: "Alpha".into(),
            file: "server.jar".into(),
        };
        assert!(err.to_string().contains("server.jar"));
        assert_eq!(
            Error::UnknownSetting("jarEntry".into()).to_string(),
            "Unknown setting 'jarEntry'"
        );
    }
}
