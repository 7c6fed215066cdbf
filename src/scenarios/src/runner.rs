//! Scenario execution against a freshly started server

use crate::scenario::{seed_document, Scenario};
use rbacprobe_core::{
    create_user_command, AssertionError, AuthorizationError, AuthorizationOutcome, BuiltinRole,
    CommandError, HarnessConfig, HarnessError, Result, ServerAddress, TeardownError,
};
use rbacprobe_server::ServerLauncher;
use rbacprobe_session::SessionFactory;
use std::fmt;
use std::future::Future;
use std::time::{Duration, Instant};
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

/// Where a scenario run currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScenarioPhase {
    Ready,
    ServerRunning,
    AdminBootstrapped,
    RoleAndUserProvisioned,
    DataSeeded,
    Asserted,
    TornDown,
}

impl fmt::Display for ScenarioPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ScenarioPhase::Ready => "ready",
            ScenarioPhase::ServerRunning => "server-running",
            ScenarioPhase::AdminBootstrapped => "admin-bootstrapped",
            ScenarioPhase::RoleAndUserProvisioned => "role-and-user-provisioned",
            ScenarioPhase::DataSeeded => "data-seeded",
            ScenarioPhase::Asserted => "asserted",
            ScenarioPhase::TornDown => "torn-down",
        };
        f.write_str(name)
    }
}

fn enter(phase: ScenarioPhase) {
    info!(%phase, "Scenario phase");
}

/// Result of a passing scenario
#[derive(Debug, Clone)]
pub struct ScenarioReport {
    pub scenario: Scenario,
    pub run_id: Uuid,
    /// What the restricted user observed
    pub outcome: AuthorizationOutcome,
    pub elapsed: Duration,
}

/// Combine a body result with the teardown that followed it.
///
/// A body error always wins; a teardown failure behind it is attached as a
/// suppressed error. A teardown failure after a successful body is the error.
pub fn settle<T>(
    result: Result<T>,
    teardown: std::result::Result<(), TeardownError>,
) -> Result<T> {
    match (result, teardown) {
        (Ok(value), Ok(())) => Ok(value),
        (Ok(_), Err(teardown)) => Err(teardown.into()),
        (Err(err), Ok(())) => Err(err),
        (Err(err), Err(teardown)) => {
            warn!("Teardown failed after scenario error: {}", teardown);
            Err(err.with_suppressed(teardown))
        }
    }
}

/// Start a server, run `body` against it, and release the server on every
/// exit path.
///
/// A startup failure is returned without running `body`.
pub async fn with_server<T, F, Fut>(launcher: &ServerLauncher, body: F) -> Result<T>
where
    F: FnOnce(ServerAddress) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut server = launcher.start().await?;

    let result = body(server.address()).await;
    let teardown = server.release().await;

    settle(result, teardown)
}

/// Runs scenarios with one configuration
pub struct ScenarioRunner {
    config: HarnessConfig,
    launcher: ServerLauncher,
    sessions: SessionFactory,
}

impl ScenarioRunner {
    pub fn new(config: HarnessConfig) -> Self {
        let launcher = ServerLauncher::new(config.server.clone());
        let sessions = SessionFactory::new(config.session.clone());
        Self {
            config,
            launcher,
            sessions,
        }
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    /// Run one scenario end to end on a fresh server
    pub async fn run(&self, scenario: Scenario) -> Result<ScenarioReport> {
        let run_id = Uuid::new_v4();
        let span = info_span!("scenario", name = scenario.name(), %run_id);

        async move {
            let started = Instant::now();
            enter(ScenarioPhase::Ready);

            let outcome = with_server(&self.launcher, |address| {
                self.execute(scenario, address)
            })
            .await?;
            enter(ScenarioPhase::TornDown);

            let elapsed = started.elapsed();
            info!("Scenario passed in {:?}", elapsed);
            Ok(ScenarioReport {
                scenario,
                run_id,
                outcome,
                elapsed,
            })
        }
        .instrument(span)
        .await
    }

    async fn execute(
        &self,
        scenario: Scenario,
        address: ServerAddress,
    ) -> Result<AuthorizationOutcome> {
        enter(ScenarioPhase::ServerRunning);
        let fixtures = &self.config.fixtures;

        self.bootstrap_admin(&address).await?;
        enter(ScenarioPhase::AdminBootstrapped);

        let outcome = match scenario.provisioning(fixtures)? {
            Some(plan) => {
                let credential = plan.user.credential.clone();
                let target_db = fixtures.target_database.as_str();
                let target_coll = fixtures.target_collection.as_str();
                let admin = fixtures.admin_credential();

                self.sessions
                    .scoped(&address, Some(&admin), |session| async move {
                        if let Some((database, command)) = plan.role {
                            session.run_command(&database, command).await?;
                        }
                        session
                            .run_command(plan.user.database(), plan.user.to_create_command())
                            .await?;
                        enter(ScenarioPhase::RoleAndUserProvisioned);

                        session.insert_one(target_db, target_coll, seed_document()).await?;
                        let seeded = session.list_collection_names(target_db).await?;
                        debug!("Administrator sees {:?} in {}", seeded, target_db);
                        enter(ScenarioPhase::DataSeeded);
                        Ok::<_, HarnessError>(())
                    })
                    .await?;

                self.sessions
                    .scoped(&address, Some(&credential), |session| async move {
                        session
                            .list_outcome(target_db)
                            .await
                            .map_err(HarnessError::from)
                    })
                    .await?
            }
            None => self.attempt_second_bootstrap(&address).await?,
        };

        info!(granted = outcome.is_granted(), "Observed {:?}", outcome);
        scenario.expectation(fixtures).check(&outcome)?;
        enter(ScenarioPhase::Asserted);

        Ok(outcome)
    }

    /// Create the first administrator through the localhost exemption
    async fn bootstrap_admin(&self, address: &ServerAddress) -> Result<()> {
        let fixtures = &self.config.fixtures;
        let admin = fixtures.admin_credential();
        let command = create_user_command(
            admin.username(),
            admin.password(),
            &[BuiltinRole::Root.into()],
        );
        let database = admin.source();

        self.sessions
            .scoped(address, None, |session| async move {
                session
                    .run_command(database, command)
                    .await
                    .map(|_| ())
                    .map_err(HarnessError::from)
            })
            .await
    }

    /// Anonymous `createUser` once an administrator exists; the server must
    /// refuse it
    async fn attempt_second_bootstrap(
        &self,
        address: &ServerAddress,
    ) -> Result<AuthorizationOutcome> {
        let fixtures = &self.config.fixtures;
        let database = fixtures.admin_database.as_str();
        let command = create_user_command(
            &fixtures.user,
            &fixtures.user_password,
            &[BuiltinRole::Root.into()],
        );

        self.sessions
            .scoped(address, None, |session| async move {
                match session.run_command(database, command).await {
                    Ok(reply) => Err(HarnessError::from(AssertionError::NotRefused(format!(
                        "createUser on {} replied {}",
                        database, reply
                    )))),
                    Err(CommandError::Unauthorized { database, message }) => Ok(
                        AuthorizationOutcome::Denied(AuthorizationError::Denied {
                            database,
                            message,
                        }),
                    ),
                    Err(e) => Err(HarnessError::from(e)),
                }
            })
            .await
    }
}
