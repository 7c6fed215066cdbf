//! Custom role granting `listCollections` on one collection
//!
//! The user holds only `listColls`, scoped to `test-db.test-coll`. Listing
//! `test-db` should return exactly the seeded collection.

use rbacprobe_core::AuthorizationOutcome;
use rbacprobe_e2e_tests::run;
use rbacprobe_scenarios::Scenario;
use serial_test::serial;

#[tokio::test]
#[serial]
#[ignore = "Requires a mongod binary (set RBACPROBE_MONGOD)"]
async fn test_custom_role_lists_seeded_collection() -> anyhow::Result<()> {
    let report = run(Scenario::CustomRole).await?;

    assert_eq!(
        report.outcome,
        AuthorizationOutcome::Granted(vec!["test-coll".to_string()])
    );
    Ok(())
}
