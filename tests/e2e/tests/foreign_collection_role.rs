//! A privilege on another collection must not reveal the seeded one

use rbacprobe_e2e_tests::run;
use rbacprobe_scenarios::Scenario;
use serial_test::serial;

#[tokio::test]
#[serial]
#[ignore = "Requires a mongod binary (set RBACPROBE_MONGOD)"]
async fn test_foreign_collection_role_hides_seeded_collection() -> anyhow::Result<()> {
    let report = run(Scenario::ForeignCollectionRole).await?;

    if let Some(names) = report.outcome.names() {
        assert!(!names.contains(&"test-coll".to_string()), "saw {:?}", names);
    }
    Ok(())
}
