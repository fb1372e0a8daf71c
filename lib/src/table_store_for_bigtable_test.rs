use bigtable_roundtrip_test_utils_rs::bigtable::{connect, create_table, unique_table_id};
use bigtable_roundtrip_test_utils_rs::docker::{bigtable_emulator, BIGTABLE_EMULATOR_PORT};
use googleapis_tonic_google_bigtable_admin_v2::google::bigtable::admin::v2::bigtable_table_admin_client::BigtableTableAdminClient;
use serial_test::serial;

use crate::config::{ConnectionConfig, RoundtripConfig};
use crate::roundtrip_runner::{Provisioning, RoundtripRunner, RunStage, RunnerError};
use crate::table_store_for_bigtable::TableStoreForBigtable;
use crate::table_store_test_support::{exercise_roundtrip_flow, init_tracing};
use crate::types::{RowMutation, TableStore, TableStoreError};

#[tokio::test]
#[serial]
async fn test_roundtrip_on_bigtable() {
  init_tracing();

  let node = bigtable_emulator().await;
  let port = node
    .get_host_port_ipv4(BIGTABLE_EMULATOR_PORT)
    .await
    .expect("Failed to get Bigtable port");
  let channel = connect(port).await.expect("failed to connect to emulator");

  let store = TableStoreForBigtable::new(channel).with_max_versions(Some(1));
  let config = RoundtripConfig::default()
    .with_project_id("test-project")
    .with_instance_id("test-instance")
    .with_table_id(unique_table_id("roundtrip"));

  exercise_roundtrip_flow(store, config).await.expect("scenario failed");
}

#[tokio::test]
#[serial]
async fn test_errors_are_classified_on_bigtable() {
  init_tracing();

  let node = bigtable_emulator().await;
  let port = node
    .get_host_port_ipv4(BIGTABLE_EMULATOR_PORT)
    .await
    .expect("Failed to get Bigtable port");
  let channel = connect(port).await.expect("failed to connect to emulator");
  let store = TableStoreForBigtable::new(channel);

  let config = RoundtripConfig::default()
    .with_project_id("test-project")
    .with_instance_id("test-instance")
    .with_table_id(unique_table_id("classify"));
  let table = config.table_name();
  let families = vec![config.column_family.clone()];

  store.create_table(&table, &families).await.expect("create failed");
  let err = store.create_table(&table, &families).await.unwrap_err();
  assert!(err.is_already_exists(), "unexpected error: {:?}", err);

  let runner = RoundtripRunner::new(store.clone(), config.clone());
  assert_eq!(
    runner.ensure_table_exists(&table, &families).await.unwrap(),
    Provisioning::AlreadyExisted
  );
  assert!(store.read_row(&table, "row-missing").await.unwrap().is_none());

  store.delete_table(&table).await.expect("delete failed");
  let mutation = RowMutation::new("row-1").set_cell("cf1", "greeting", "Hello");
  let err = store.mutate_row(&table, &mutation).await.unwrap_err();
  assert!(matches!(err, TableStoreError::NotFound(_)), "unexpected error: {:?}", err);
}

#[tokio::test]
#[serial]
async fn test_existing_table_without_family_on_bigtable() {
  init_tracing();

  let node = bigtable_emulator().await;
  let port = node
    .get_host_port_ipv4(BIGTABLE_EMULATOR_PORT)
    .await
    .expect("Failed to get Bigtable port");
  let channel = connect(port).await.expect("failed to connect to emulator");

  let config = RoundtripConfig::default()
    .with_project_id("test-project")
    .with_instance_id("test-instance")
    .with_table_id(unique_table_id("shape"));
  let table = config.table_name();

  let mut table_admin = BigtableTableAdminClient::new(channel.clone());
  create_table(&mut table_admin, &table.parent(), table.table_id(), &["other"])
    .await
    .expect("failed to create table");

  let runner = RoundtripRunner::new(TableStoreForBigtable::new(channel), config);
  match runner.run().await {
    Err(RunnerError::MissingColumnFamilies { missing, .. }) => assert_eq!(missing, vec!["cf1".to_string()]),
    other => panic!("unexpected result: {:?}", other.map(|report| report.row_key)),
  }
}

#[tokio::test]
async fn test_unreachable_endpoint_fails_during_provisioning() {
  init_tracing();

  let channel = ConnectionConfig::new("127.0.0.1:1").connect().expect("endpoint should parse");
  let runner = RoundtripRunner::new(TableStoreForBigtable::new(channel), RoundtripConfig::default());

  let err = runner.run().await.unwrap_err();
  assert_eq!(err.stage(), RunStage::Provisioning);
  assert!(
    matches!(
      err,
      RunnerError::CreateTable {
        source: TableStoreError::IOError(_),
        ..
      }
    ),
    "unexpected error: {:?}",
    err
  );
}
