//! Error taxonomy for the harness
//!
//! Each stage of a scenario has its own error type so a failure report says
//! which boundary broke: process startup, authentication, an administrative
//! command, the listing under test, teardown, or the final assertion.
//! [`HarnessError`] is the umbrella every scenario returns.

use std::time::Duration;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, HarnessError>;

/// The server process never became ready
#[derive(Debug, Error)]
pub enum StartupError {
    /// The binary could not be executed
    #[error("Failed to spawn {binary}: {source}")]
    Spawn {
        binary: String,
        #[source]
        source: std::io::Error,
    },

    /// Something already accepts connections on the fixed port
    #[error("Port {port} on {host} is already in use")]
    PortInUse { host: String, port: u16 },

    /// `--version` could not be run or parsed
    #[error("Version check failed: {0}")]
    VersionCheck(String),

    /// The binary reports a different server version than configured
    #[error("Server version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: String, found: String },

    /// The process exited before accepting connections
    #[error("Server exited before becoming ready ({status})\n{output}")]
    ExitedEarly { status: String, output: String },

    /// Readiness was not observed within the startup timeout
    #[error("Server not ready on {address} after {timeout:?}")]
    ReadinessTimeout { address: String, timeout: Duration },

    /// The temporary data directory could not be created
    #[error("Data directory error: {0}")]
    DataDir(#[source] std::io::Error),
}

/// A credential was rejected (or could not be presented) at connection time
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Authentication failed for {username}@{source_db}: {message}")]
    Rejected {
        username: String,
        source_db: String,
        message: String,
    },

    #[error("Server unreachable at {address}: {message}")]
    Unreachable { address: String, message: String },

    /// The server answered but refused the connection check
    #[error("Server at {address} refused the connection: {message}")]
    Refused { address: String, message: String },

    #[error("Invalid client options: {0}")]
    InvalidOptions(String),
}

/// An administrative command was rejected
#[derive(Debug, Error)]
pub enum CommandError {
    /// A privilege must grant at least one action
    #[error("Privilege on {resource} has no actions")]
    EmptyActions { resource: String },

    /// The server refused the command for lack of privilege
    #[error("Not authorized on {database}: {message}")]
    Unauthorized { database: String, message: String },

    /// The server rejected the command for any other reason
    #[error("Command rejected on {database} ({code} {code_name}): {message}")]
    Rejected {
        database: String,
        code: i32,
        code_name: String,
        message: String,
    },

    /// Transport or driver failure
    #[error("Driver error: {0}")]
    Driver(String),
}

/// A data-plane operation was denied
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthorizationError {
    #[error("Denied on {database}: {message}")]
    Denied { database: String, message: String },
}

/// Terminating the server or cleaning up after it failed
#[derive(Debug, Error)]
pub enum TeardownError {
    #[error("Failed to signal server process: {0}")]
    Signal(String),

    #[error("Failed to reap server process: {0}")]
    Wait(#[source] std::io::Error),

    #[error("Failed to remove data directory: {0}")]
    DataDir(#[source] std::io::Error),
}

/// The observed authorization outcome did not match the expectation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AssertionError {
    #[error("Expected collections {expected:?}, got {actual:?}")]
    Mismatch {
        expected: Vec<String>,
        actual: Vec<String>,
    },

    #[error("Expected collections {expected:?}, but listing was denied: {denial}")]
    UnexpectedDenial {
        expected: Vec<String>,
        denial: AuthorizationError,
    },

    #[error("Expected {excluded:?} to be hidden, got {actual:?}")]
    UnexpectedSuccess {
        excluded: String,
        actual: Vec<String>,
    },

    #[error("Expected command to be refused, but it succeeded: {0}")]
    NotRefused(String),
}

/// Everything a scenario can fail with
#[derive(Debug, Error)]
pub enum HarnessError {
    #[error(transparent)]
    Startup(#[from] StartupError),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Command(#[from] CommandError),

    #[error(transparent)]
    Authorization(#[from] AuthorizationError),

    #[error(transparent)]
    Teardown(#[from] TeardownError),

    #[error(transparent)]
    Assertion(#[from] AssertionError),

    /// The scenario body failed and teardown failed after it.
    /// Displays as the body's error; the teardown error rides along.
    #[error("{primary}")]
    WithSuppressed {
        primary: Box<HarnessError>,
        suppressed: TeardownError,
    },
}

impl HarnessError {
    /// Attach a teardown failure to an error raised earlier
    pub fn with_suppressed(self, suppressed: TeardownError) -> Self {
        HarnessError::WithSuppressed {
            primary: Box::new(self),
            suppressed,
        }
    }

    /// The error that should be reported first
    pub fn primary(&self) -> &HarnessError {
        match self {
            HarnessError::WithSuppressed { primary, .. } => primary.primary(),
            other => other,
        }
    }

    /// Teardown failure hidden behind an earlier error, if any
    pub fn suppressed(&self) -> Option<&TeardownError> {
        match self {
            HarnessError::WithSuppressed { suppressed, .. } => Some(suppressed),
            _ => None,
        }
    }

    pub fn is_assertion(&self) -> bool {
        matches!(self.primary(), HarnessError::Assertion(_))
    }

    pub fn is_teardown(&self) -> bool {
        matches!(self, HarnessError::Teardown(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CommandError::Unauthorized {
            database: "admin".to_string(),
            message: "command createUser requires authentication".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Not authorized on admin: command createUser requires authentication"
        );

        let err: HarnessError = AuthorizationError::Denied {
            database: "test-db".to_string(),
            message: "not authorized".to_string(),
        }
        .into();
        assert_eq!(err.to_string(), "Denied on test-db: not authorized");
    }

    #[test]
    fn test_suppressed_teardown_keeps_primary() {
        let body: HarnessError = AssertionError::Mismatch {
            expected: vec!["test-coll".to_string()],
            actual: vec![],
        }
        .into();
        let teardown = TeardownError::Signal("ESRCH".to_string());

        let err = body.with_suppressed(teardown);

        assert!(err.is_assertion());
        assert!(!err.is_teardown());
        assert!(matches!(err.suppressed(), Some(TeardownError::Signal(_))));
        assert_eq!(err.to_string(), "Expected collections [\"test-coll\"], got []");
    }

    #[test]
    fn test_primary_of_plain_error_is_itself() {
        let err: HarnessError = TeardownError::Signal("EPERM".to_string()).into();
        assert!(err.is_teardown());
        assert!(err.suppressed().is_none());
        assert!(matches!(err.primary(), HarnessError::Teardown(_)));
    }
}
