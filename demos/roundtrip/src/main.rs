use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

use bigtable_roundtrip_rs::config::{ConnectionConfig, RoundtripConfig};
use bigtable_roundtrip_rs::{RoundtripRunner, TableStoreForBigtable};

#[tokio::main]
async fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .with_target(false)
    .init();

  let connection = ConnectionConfig::from_env();
  let config = RoundtripConfig::from_env();
  tracing::info!("endpoint = {}, table = {}", connection.endpoint, config.table_name());

  let channel = connection
    .connect()
    .with_context(|| format!("invalid endpoint {}", connection.endpoint))?;
  let runner = RoundtripRunner::new(TableStoreForBigtable::new(channel), config);

  // Stage failures are already logged by the runner; the process still exits normally.
  match runner.run().await {
    Ok(report) if report.greeting_matches() => {
      tracing::info!("round trip of row {} completed ({:?})", report.row_key, report.provisioning)
    }
    Ok(report) => tracing::warn!(
      "row {} was read back, but {}:{} does not hold {:?}",
      report.row_key,
      report.column_family,
      report.column,
      report.greeting
    ),
    Err(err) => tracing::error!("run aborted while {}: {}", err.stage(), err),
  }
  Ok(())
}
