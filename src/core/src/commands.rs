//! Administrative command documents
//!
//! Pure constructors for the user-management commands the scenarios send.
//! The only local validation is that a privilege grants at least one action;
//! anything else is for the server to accept or reject.

use crate::error::CommandError;
use crate::types::{Privilege, ResourcePattern, Role, RoleRef};
use bson::{doc, Bson, Document};

/// `{createUser: <name>, pwd: <secret>, roles: [...]}`
///
/// Bare role names resolve against the database the command is run on.
pub fn create_user_command(username: &str, password: &str, roles: &[RoleRef]) -> Document {
    doc! {
        "createUser": username,
        "pwd": password,
        "roles": role_list(roles),
    }
}

/// `{createRole: <name>, privileges: [{resource: {db, collection}, actions}], roles: []}`
pub fn create_role_command<S: AsRef<str>>(
    database: &str,
    collection: &str,
    role_name: &str,
    actions: &[S],
) -> Result<Document, CommandError> {
    let privilege = Privilege::new(
        ResourcePattern::collection(database, collection),
        actions.iter().map(|action| action.as_ref().to_string()),
    )?;
    Ok(Role::custom(role_name, database, vec![privilege]).to_create_command())
}

/// `{grantRolesToUser: <name>, roles: [...]}`
pub fn grant_roles_command(username: &str, roles: &[RoleRef]) -> Document {
    doc! {
        "grantRolesToUser": username,
        "roles": role_list(roles),
    }
}

fn role_list(roles: &[RoleRef]) -> Vec<Bson> {
    roles.iter().map(Bson::from).collect()
}
