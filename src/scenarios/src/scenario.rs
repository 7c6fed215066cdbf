//! Scenario definitions

use crate::expectation::Expectation;
use bson::{doc, Document};
use rbacprobe_core::{
    create_role_command, BuiltinRole, CommandError, FixturesSection, RoleRef, User,
};
use std::fmt;

/// Action the custom roles grant
pub const LIST_COLLECTIONS: &str = "listCollections";

/// Document inserted to materialize the target collection
pub fn seed_document() -> Document {
    doc! { "key": "value" }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scenario {
    /// Custom role granting `listCollections` on the seeded collection
    CustomRole,
    /// Built-in `readAnyDatabase`, user defined on the admin database
    ReadAnyDatabase,
    /// Built-in `read` on the target database
    Read,
    /// Custom role granting `listCollections` on a different collection
    ForeignCollectionRole,
    /// A second anonymous `createUser` once an administrator exists
    BootstrapLockout,
}

/// Role and user to create with the admin session
#[derive(Debug, Clone)]
pub(crate) struct Provisioning {
    /// Database to run `createRole` on, and the command
    pub role: Option<(String, Document)>,
    pub user: User,
}

impl Scenario {
    pub const ALL: [Scenario; 5] = [
        Scenario::CustomRole,
        Scenario::ReadAnyDatabase,
        Scenario::Read,
        Scenario::ForeignCollectionRole,
        Scenario::BootstrapLockout,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Scenario::CustomRole => "custom-role",
            Scenario::ReadAnyDatabase => "read-any-database-role",
            Scenario::Read => "read-role",
            Scenario::ForeignCollectionRole => "foreign-collection-role",
            Scenario::BootstrapLockout => "bootstrap-lockout",
        }
    }

    /// Database the restricted user is created on and authenticates against
    pub fn user_database<'a>(&self, fixtures: &'a FixturesSection) -> &'a str {
        match self {
            Scenario::ReadAnyDatabase | Scenario::BootstrapLockout => {
                fixtures.admin_database.as_str()
            }
            _ => fixtures.target_database.as_str(),
        }
    }

    pub fn expectation(&self, fixtures: &FixturesSection) -> Expectation {
        match self {
            Scenario::CustomRole | Scenario::ReadAnyDatabase | Scenario::Read => {
                Expectation::Exactly(vec![fixtures.target_collection.clone()])
            }
            Scenario::ForeignCollectionRole => {
                Expectation::DeniedOrExcludes(fixtures.target_collection.clone())
            }
            Scenario::BootstrapLockout => Expectation::Denied,
        }
    }

    /// `None` for scenarios that provision nothing beyond the administrator
    pub(crate) fn provisioning(
        &self,
        fixtures: &FixturesSection,
    ) -> Result<Option<Provisioning>, CommandError> {
        let credential = fixtures.user_credential(self.user_database(fixtures));

        let provisioning = match self {
            Scenario::CustomRole | Scenario::ForeignCollectionRole => {
                let collection = if *self == Scenario::CustomRole {
                    &fixtures.target_collection
                } else {
                    &fixtures.foreign_collection
                };
                let role = create_role_command(
                    &fixtures.target_database,
                    collection,
                    &fixtures.custom_role,
                    &[LIST_COLLECTIONS],
                )?;
                Provisioning {
                    role: Some((fixtures.target_database.clone(), role)),
                    user: User::new(credential, vec![RoleRef::named(&fixtures.custom_role)]),
                }
            }
            Scenario::ReadAnyDatabase => Provisioning {
                role: None,
                user: User::new(credential, vec![BuiltinRole::ReadAnyDatabase.into()]),
            },
            Scenario::Read => Provisioning {
                role: None,
                user: User::new(credential, vec![BuiltinRole::Read.into()]),
            },
            Scenario::BootstrapLockout => return Ok(None),
        };

        Ok(Some(provisioning))
    }
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
