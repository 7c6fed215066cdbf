//! Built-in `read` on the target database

use rbacprobe_e2e_tests::run;
use rbacprobe_scenarios::Scenario;
use serial_test::serial;

#[tokio::test]
#[serial]
#[ignore = "Requires a mongod binary (set RBACPROBE_MONGOD)"]
async fn test_read_role_lists_seeded_collection() -> anyhow::Result<()> {
    let report = run(Scenario::Read).await?;

    assert!(report.outcome.is_granted());
    assert_eq!(report.outcome.names(), Some(&["test-coll".to_string()][..]));
    Ok(())
}
