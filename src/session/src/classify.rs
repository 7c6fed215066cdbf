//! Mapping driver errors onto the harness error taxonomy

use mongodb::error::{Error, ErrorKind, WriteFailure};
use rbacprobe_core::{AuthError, AuthorizationError, CommandError, Credential, ServerAddress};

/// Server code for "not authorized on <db> to execute command"
pub const UNAUTHORIZED: i32 = 13;
/// Server code for rejected credentials
pub const AUTHENTICATION_FAILED: i32 = 18;

/// What a failed driver call means to the harness
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Failure {
    /// Authenticated principal lacks the privilege
    Denied(String),
    /// Credential rejected
    AuthenticationFailed(String),
    /// Any other server-side rejection
    Server {
        code: i32,
        code_name: String,
        message: String,
    },
    /// Network, selection timeout, or driver-internal failure
    Transport(String),
}

pub fn classify(error: &Error) -> Failure {
    match error.kind.as_ref() {
        ErrorKind::Command(e) => from_server(e.code, &e.code_name, &e.message),
        ErrorKind::Write(WriteFailure::WriteError(e)) => {
            from_server(e.code, e.code_name.as_deref().unwrap_or_default(), &e.message)
        }
        ErrorKind::Authentication { message, .. } => Failure::AuthenticationFailed(message.clone()),
        _ => Failure::Transport(error.to_string()),
    }
}

pub fn from_server(code: i32, code_name: &str, message: &str) -> Failure {
    match code {
        UNAUTHORIZED => Failure::Denied(message.to_string()),
        AUTHENTICATION_FAILED => Failure::AuthenticationFailed(message.to_string()),
        _ => Failure::Server {
            code,
            code_name: code_name.to_string(),
            message: message.to_string(),
        },
    }
}

impl Failure {
    pub fn into_command_error(self, database: &str) -> CommandError {
        match self {
            Failure::Denied(message) => CommandError::Unauthorized {
                database: database.to_string(),
                message,
            },
            Failure::AuthenticationFailed(message) => CommandError::Rejected {
                database: database.to_string(),
                code: AUTHENTICATION_FAILED,
                code_name: "AuthenticationFailed".to_string(),
                message,
            },
            Failure::Server {
                code,
                code_name,
                message,
            } => CommandError::Rejected {
                database: database.to_string(),
                code,
                code_name,
                message,
            },
            Failure::Transport(message) => CommandError::Driver(message),
        }
    }

    /// A denial becomes the listing outcome; anything else stays an error
    pub fn into_listing_result(self, database: &str) -> Result<AuthorizationError, CommandError> {
        match self {
            Failure::Denied(message) => Ok(AuthorizationError::Denied {
                database: database.to_string(),
                message,
            }),
            other => Err(other.into_command_error(database)),
        }
    }

    pub fn into_auth_error(
        self,
        address: &ServerAddress,
        credential: Option<&Credential>,
    ) -> AuthError {
        match (self, credential) {
            (Failure::AuthenticationFailed(message), Some(credential)) => AuthError::Rejected {
                username: credential.username().to_string(),
                source_db: credential.source().to_string(),
                message,
            },
            (Failure::Transport(message), _) => AuthError::Unreachable {
                address: address.to_string(),
                message,
            },
            (Failure::Denied(message), _) | (Failure::AuthenticationFailed(message), None) => {
                AuthError::Refused {
                    address: address.to_string(),
                    message,
                }
            }
            (
                Failure::Server {
                    code,
                    code_name,
                    message,
                },
                _,
            ) => AuthError::Refused {
                address: address.to_string(),
                message: format!("{} ({}): {}", code_name, code, message),
            },
        }
    }
}

pub fn command_error(database: &str, error: &Error) -> CommandError {
    classify(error).into_command_error(database)
}

pub fn listing_error(database: &str, error: &Error) -> Result<AuthorizationError, CommandError> {
    classify(error).into_listing_result(database)
}

pub fn auth_error(
    address: &ServerAddress,
    credential: Option<&Credential>,
    error: &Error,
) -> AuthError {
    classify(error).into_auth_error(address, credential)
}
