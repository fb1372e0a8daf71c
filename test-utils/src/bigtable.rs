use std::collections::HashMap;

use anyhow::{Context, Result};
use googleapis_tonic_google_bigtable_admin_v2::google::bigtable::admin::v2::bigtable_table_admin_client::BigtableTableAdminClient;
use googleapis_tonic_google_bigtable_admin_v2::google::bigtable::admin::v2::{ColumnFamily, CreateTableRequest, Table};
use rand::Rng;
use tonic::transport::Channel;

/// Opens a plaintext channel to an emulator listening on `127.0.0.1:{port}`.
pub async fn connect(port: u16) -> Result<Channel> {
  let endpoint = format!("http://127.0.0.1:{}", port);
  tracing::debug!("connecting to {}", endpoint);
  let channel = Channel::from_shared(endpoint.clone())
    .with_context(|| format!("invalid endpoint: {}", endpoint))?
    .connect()
    .await
    .with_context(|| format!("failed to connect to {}", endpoint))?;
  Ok(channel)
}

/// Returns a table id that is unlikely to collide with other test runs.
pub fn unique_table_id(prefix: &str) -> String {
  let suffix: u32 = rand::thread_rng().gen();
  format!("{}-{:08x}", prefix, suffix)
}

/// Creates a table directly through the admin API, bypassing the store under test.
pub async fn create_table(
  client: &mut BigtableTableAdminClient<Channel>,
  parent: &str,
  table_id: &str,
  families: &[&str],
) -> Result<()> {
  let column_families = families
    .iter()
    .map(|family| (family.to_string(), ColumnFamily::default()))
    .collect::<HashMap<_, _>>();

  let table = Table {
    column_families,
    ..Default::default()
  };

  client
    .create_table(CreateTableRequest {
      parent: parent.to_string(),
      table_id: table_id.to_string(),
      table: Some(table),
      ..Default::default()
    })
    .await
    .with_context(|| format!("failed to create table {}", table_id))?;
  Ok(())
}
