//! Built-in `readAnyDatabase`, user defined on `admin`

use rbacprobe_e2e_tests::run;
use rbacprobe_scenarios::Scenario;
use serial_test::serial;

#[tokio::test]
#[serial]
#[ignore = "Requires a mongod binary (set RBACPROBE_MONGOD)"]
async fn test_read_any_database_lists_seeded_collection() -> anyhow::Result<()> {
    let report = run(Scenario::ReadAnyDatabase).await?;

    assert_eq!(report.outcome.names(), Some(&["test-coll".to_string()][..]));
    Ok(())
}
