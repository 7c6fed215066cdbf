//! The localhost exemption closes once an administrator exists

use rbacprobe_core::{AuthorizationError, AuthorizationOutcome};
use rbacprobe_e2e_tests::run;
use rbacprobe_scenarios::Scenario;
use serial_test::serial;

#[tokio::test]
#[serial]
#[ignore = "Requires a mongod binary (set RBACPROBE_MONGOD)"]
async fn test_second_anonymous_create_user_is_refused() -> anyhow::Result<()> {
    let report = run(Scenario::BootstrapLockout).await?;

    match report.outcome {
        AuthorizationOutcome::Denied(AuthorizationError::Denied { database, .. }) => {
            assert_eq!(database, "admin");
        }
        other => panic!("Expected a refusal, got {:?}", other),
    }
    Ok(())
}
