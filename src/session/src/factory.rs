//! Opening sessions

use crate::classify;
use crate::session::Session;
use mongodb::options::{
    ClientOptions, Credential as DriverCredential, ServerAddress as DriverAddress,
};
use mongodb::Client;
use rbacprobe_core::{AuthError, Credential, ServerAddress, SessionSection};
use std::future::Future;
use tracing::{debug, info};

/// Opens sessions against one server with shared driver settings
#[derive(Debug, Clone)]
pub struct SessionFactory {
    config: SessionSection,
}

impl SessionFactory {
    pub fn new(config: SessionSection) -> Self {
        Self { config }
    }

    /// Driver options for a direct connection to `address`
    pub fn options(
        &self,
        address: &ServerAddress,
        credential: Option<&Credential>,
    ) -> Result<ClientOptions, AuthError> {
        let host = DriverAddress::parse(address.to_string())
            .map_err(|e| AuthError::InvalidOptions(e.to_string()))?;

        let mut options = ClientOptions::builder()
            .hosts(vec![host])
            .direct_connection(true)
            .connect_timeout(self.config.connect_timeout())
            .server_selection_timeout(self.config.server_selection_timeout())
            .app_name(self.config.app_name.clone())
            .build();

        options.credential = credential.map(|credential| {
            DriverCredential::builder()
                .username(credential.username().to_string())
                .password(credential.password().to_string())
                .source(credential.source().to_string())
                .build()
        });

        Ok(options)
    }

    /// Unauthenticated session
    pub async fn connect(&self, address: &ServerAddress) -> Result<Session, AuthError> {
        self.open(address, None).await
    }

    /// Session authenticated as `credential` against its own database
    pub async fn connect_with(
        &self,
        address: &ServerAddress,
        credential: &Credential,
    ) -> Result<Session, AuthError> {
        self.open(address, Some(credential)).await
    }

    async fn open(
        &self,
        address: &ServerAddress,
        credential: Option<&Credential>,
    ) -> Result<Session, AuthError> {
        let options = self.options(address, credential)?;
        let client =
            Client::with_options(options).map_err(|e| AuthError::InvalidOptions(e.to_string()))?;

        let principal = credential.map(|c| format!("{}@{}", c.username(), c.source()));
        let session = Session::new(client, address.clone(), principal);

        // The driver connects (and authenticates) lazily; force it here so a
        // rejected credential fails at connect time
        let ping_db = credential.map_or("admin", Credential::source);
        if let Err(e) = session.ping(ping_db).await {
            let err = classify::auth_error(address, credential, &e);
            session.close().await;
            return Err(err);
        }

        info!(
            principal = session.principal().unwrap_or("<anonymous>"),
            "Connected to {}", address
        );
        Ok(session)
    }

    /// Run `body` with a fresh session and close it on every exit path.
    ///
    /// The body's own result is returned unchanged; closing never fails.
    pub async fn scoped<T, E, F, Fut>(
        &self,
        address: &ServerAddress,
        credential: Option<&Credential>,
        body: F,
    ) -> Result<T, E>
    where
        F: FnOnce(Session) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<AuthError>,
    {
        let session = self.open(address, credential).await?;
        let result = body(session.clone()).await;
        debug!("Scoped session finished (ok: {})", result.is_ok());
        session.close().await;
        result
    }
}
