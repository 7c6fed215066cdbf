//! Connection handle used by one scenario step

use crate::classify;
use bson::{doc, Document};
use mongodb::Client;
use rbacprobe_core::{AuthorizationOutcome, CommandError, HarnessError, ServerAddress};
use tracing::debug;

/// A connection to one server, optionally authenticated.
///
/// Cloning shares the underlying connection pool. [`Session::close`] shuts
/// the pool down; [`crate::SessionFactory::scoped`] does that on every exit
/// path.
#[derive(Clone)]
pub struct Session {
    client: Client,
    address: ServerAddress,
    principal: Option<String>,
}

impl Session {
    pub(crate) fn new(client: Client, address: ServerAddress, principal: Option<String>) -> Self {
        Self {
            client,
            address,
            principal,
        }
    }

    pub fn address(&self) -> &ServerAddress {
        &self.address
    }

    /// `user@authdb`, or `None` for an anonymous session
    pub fn principal(&self) -> Option<&str> {
        self.principal.as_deref()
    }

    fn principal_label(&self) -> &str {
        self.principal().unwrap_or("<anonymous>")
    }

    pub(crate) async fn ping(&self, database: &str) -> Result<(), mongodb::error::Error> {
        self.client
            .database(database)
            .run_command(doc! { "ping": 1 }, None)
            .await
            .map(|_| ())
    }

    /// Run an administrative command and return the server's reply
    pub async fn run_command(
        &self,
        database: &str,
        command: Document,
    ) -> Result<Document, CommandError> {
        // Only the command name is logged: createUser carries a password
        let name = command.keys().next().cloned().unwrap_or_default();
        debug!(principal = self.principal_label(), database, "Running {}", name);

        self.client
            .database(database)
            .run_command(command, None)
            .await
            .map_err(|e| classify::command_error(database, &e))
    }

    pub async fn insert_one(
        &self,
        database: &str,
        collection: &str,
        document: Document,
    ) -> Result<(), CommandError> {
        debug!(principal = self.principal_label(), "Inserting into {}.{}", database, collection);

        self.client
            .database(database)
            .collection::<Document>(collection)
            .insert_one(document, None)
            .await
            .map(|_| ())
            .map_err(|e| classify::command_error(database, &e))
    }

    /// List collection names; a denial is returned as an outcome, not an error
    pub async fn list_outcome(&self, database: &str) -> Result<AuthorizationOutcome, CommandError> {
        debug!(principal = self.principal_label(), database, "Listing collections");

        match self.client.database(database).list_collection_names(None).await {
            Ok(names) => Ok(AuthorizationOutcome::Granted(names)),
            Err(e) => classify::listing_error(database, &e).map(AuthorizationOutcome::Denied),
        }
    }

    /// Collection names in the order the server returned them.
    ///
    /// A denial surfaces as [`HarnessError::Authorization`]; other failures
    /// as [`HarnessError::Command`].
    pub async fn list_collection_names(&self, database: &str) -> Result<Vec<String>, HarnessError> {
        match self.list_outcome(database).await? {
            AuthorizationOutcome::Granted(names) => Ok(names),
            AuthorizationOutcome::Denied(denial) => Err(denial.into()),
        }
    }

    /// Shut down the connection pool
    pub async fn close(self) {
        debug!(principal = self.principal_label(), "Closing session to {}", self.address);
        self.client.shutdown().await;
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("address", &self.address)
            .field("principal", &self.principal_label())
            .finish()
    }
}
