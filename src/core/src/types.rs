//! Principal, role and privilege model

use crate::error::{AuthorizationError, CommandError};
use bson::{doc, Bson, Document};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Host and port the server listens on
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ServerAddress {
    pub host: String,
    pub port: u16,
}

impl ServerAddress {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for ServerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Username, password and the database the user is defined on.
///
/// The password never leaves this type except through [`Credential::password`];
/// `Debug` redacts it and there is no `Display`.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    username: String,
    password: String,
    source: String,
}

impl Credential {
    pub fn new(
        username: impl Into<String>,
        password: impl Into<String>,
        source: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            source: source.into(),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn password(&self) -> &str {
        &self.password
    }

    /// Authentication database
    pub fn source(&self) -> &str {
        &self.source
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("source", &self.source)
            .finish()
    }
}

/// Roles whose privileges are defined by the server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuiltinRole {
    Root,
    ReadAnyDatabase,
    Read,
}

impl BuiltinRole {
    pub fn name(&self) -> &'static str {
        match self {
            BuiltinRole::Root => "root",
            BuiltinRole::ReadAnyDatabase => "readAnyDatabase",
            BuiltinRole::Read => "read",
        }
    }
}

/// Reference to a role from a user document
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RoleRef {
    /// Resolved against the database the command runs on
    Named(String),
    /// Role defined on a specific database
    Qualified { role: String, db: String },
}

impl RoleRef {
    pub fn named(role: impl Into<String>) -> Self {
        RoleRef::Named(role.into())
    }

    pub fn qualified(role: impl Into<String>, db: impl Into<String>) -> Self {
        RoleRef::Qualified {
            role: role.into(),
            db: db.into(),
        }
    }

    pub fn role(&self) -> &str {
        match self {
            RoleRef::Named(role) | RoleRef::Qualified { role, .. } => role,
        }
    }
}

impl From<BuiltinRole> for RoleRef {
    fn from(role: BuiltinRole) -> Self {
        RoleRef::Named(role.name().to_string())
    }
}

impl From<&RoleRef> for Bson {
    fn from(role: &RoleRef) -> Self {
        match role {
            RoleRef::Named(name) => Bson::String(name.clone()),
            RoleRef::Qualified { role, db } => Bson::Document(doc! {
                "role": role.as_str(),
                "db": db.as_str(),
            }),
        }
    }
}

/// Resource a privilege applies to. No wildcards.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ResourcePattern {
    Collection { db: String, collection: String },
    /// Every collection of one database
    Database { db: String },
}

impl ResourcePattern {
    pub fn collection(db: impl Into<String>, collection: impl Into<String>) -> Self {
        ResourcePattern::Collection {
            db: db.into(),
            collection: collection.into(),
        }
    }

    pub fn database(db: impl Into<String>) -> Self {
        ResourcePattern::Database { db: db.into() }
    }

    pub fn to_document(&self) -> Document {
        match self {
            ResourcePattern::Collection { db, collection } => doc! {
                "db": db.as_str(),
                "collection": collection.as_str(),
            },
            // The server spells "all collections" as an empty collection name
            ResourcePattern::Database { db } => doc! {
                "db": db.as_str(),
                "collection": "",
            },
        }
    }
}

impl fmt::Display for ResourcePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourcePattern::Collection { db, collection } => write!(f, "{}.{}", db, collection),
            ResourcePattern::Database { db } => write!(f, "{}.*", db),
        }
    }
}

/// Actions permitted on one resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Privilege {
    resource: ResourcePattern,
    actions: Vec<String>,
}

impl Privilege {
    /// Fails when `actions` is empty
    pub fn new<I, S>(resource: ResourcePattern, actions: I) -> Result<Self, CommandError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let actions: Vec<String> = actions.into_iter().map(Into::into).collect();
        if actions.is_empty() {
            return Err(CommandError::EmptyActions {
                resource: resource.to_string(),
            });
        }
        Ok(Self { resource, actions })
    }

    pub fn resource(&self) -> &ResourcePattern {
        &self.resource
    }

    pub fn actions(&self) -> &[String] {
        &self.actions
    }

    pub fn to_document(&self) -> Document {
        doc! {
            "resource": self.resource.to_document(),
            "actions": self.actions.clone(),
        }
    }
}

/// A custom role owned by one database
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Role {
    pub name: String,
    pub database: String,
    pub privileges: Vec<Privilege>,
    /// Always empty for roles the harness creates
    pub roles: Vec<RoleRef>,
}

impl Role {
    pub fn custom(
        name: impl Into<String>,
        database: impl Into<String>,
        privileges: Vec<Privilege>,
    ) -> Self {
        Self {
            name: name.into(),
            database: database.into(),
            privileges,
            roles: Vec::new(),
        }
    }

    /// `createRole` document; must be run against [`Role::database`]
    pub fn to_create_command(&self) -> Document {
        let privileges: Vec<Document> =
            self.privileges.iter().map(Privilege::to_document).collect();
        let roles: Vec<Bson> = self.roles.iter().map(Bson::from).collect();
        doc! {
            "createRole": self.name.as_str(),
            "privileges": privileges,
            "roles": roles,
        }
    }
}

/// A user to be created on the server
#[derive(Clone, PartialEq, Eq)]
pub struct User {
    pub credential: Credential,
    pub roles: Vec<RoleRef>,
}

impl User {
    pub fn new(credential: Credential, roles: Vec<RoleRef>) -> Self {
        Self { credential, roles }
    }

    /// Database the `createUser` command must run against
    pub fn database(&self) -> &str {
        self.credential.source()
    }

    pub fn to_create_command(&self) -> Document {
        crate::commands::create_user_command(
            self.credential.username(),
            self.credential.password(),
            &self.roles,
        )
    }
}

impl fmt::Debug for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("User")
            .field("credential", &self.credential)
            .field("roles", &self.roles)
            .finish()
    }
}

/// Result of listing collections under a restricted credential
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthorizationOutcome {
    /// Collection names in the order the server returned them
    Granted(Vec<String>),
    Denied(AuthorizationError),
}

impl AuthorizationOutcome {
    pub fn is_granted(&self) -> bool {
        matches!(self, AuthorizationOutcome::Granted(_))
    }

    pub fn names(&self) -> Option<&[String]> {
        match self {
            AuthorizationOutcome::Granted(names) => Some(names),
            AuthorizationOutcome::Denied(_) => None,
        }
    }
}

impl From<Result<Vec<String>, AuthorizationError>> for AuthorizationOutcome {
    fn from(result: Result<Vec<String>, AuthorizationError>) -> Self {
        match result {
            Ok(names) => AuthorizationOutcome::Granted(names),
            Err(denial) => AuthorizationOutcome::Denied(denial),
        }
    }
}
