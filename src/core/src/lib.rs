//! rbacprobe core
//!
//! Shared vocabulary for the RBAC reproduction harness: the principal, role
//! and privilege model, the administrative command documents sent to the
//! server, the error taxonomy, and harness configuration.

pub mod commands;
pub mod config;
pub mod error;
pub mod types;

pub use commands::{create_role_command, create_user_command, grant_roles_command};
pub use config::{FixturesSection, HarnessConfig, ServerSection, SessionSection};
pub use error::{
    AssertionError, AuthError, AuthorizationError, CommandError, HarnessError, Result,
    StartupError, TeardownError,
};
pub use types::{
    AuthorizationOutcome, BuiltinRole, Credential, Privilege, ResourcePattern, Role, RoleRef,
    ServerAddress, User,
};
