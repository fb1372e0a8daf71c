#![cfg(test)]

use std::error::Error as StdError;
use std::sync::Arc;

use crate::config::RoundtripConfig;
use crate::key_generator::FixedRowKeyGenerator;
use crate::roundtrip_runner::{Provisioning, RoundtripRunner};
use crate::types::{RowMutation, TableStore};

/// 任意のストアに対してテーブル作成とラウンドトリップの性質を検証する。
///
/// `config` にはまだ存在しないテーブルを指定すること。
pub async fn exercise_roundtrip_flow<S>(store: S, config: RoundtripConfig) -> Result<(), Box<dyn StdError + Send + Sync>>
where
  S: TableStore + Clone, {
  let table = config.table_name();
  let families = vec![config.column_family.clone()];
  let runner = RoundtripRunner::new(store.clone(), config.clone())
    .with_key_generator(Arc::new(FixedRowKeyGenerator::new("row-abc123", "Hello xyz!")));

  let provisioning = runner.ensure_table_exists(&table, &families).await?;
  assert_eq!(provisioning, Provisioning::Created);
  let existing = store.column_families(&table).await?;
  assert_eq!(existing.into_iter().collect::<Vec<_>>(), families);

  let report = runner.run().await?;
  assert_eq!(report.provisioning, Provisioning::AlreadyExisted);
  assert_eq!(report.row_key, "row-abc123");
  assert_eq!(
    report.row.latest_value(&config.column_family, &config.column),
    Some("Hello xyz!".as_bytes())
  );
  assert!(report.greeting_matches());

  let other = RowMutation::new("row-other").set_cell(config.column_family.clone(), config.column.clone(), "Hi");
  runner.insert_row(&table, &other).await?;

  let provisioning = runner.ensure_table_exists(&table, &families).await?;
  assert_eq!(provisioning, Provisioning::AlreadyExisted);
  let row = runner.read_row_back(&table, "row-other").await?;
  assert_eq!(row.latest_value(&config.column_family, &config.column), Some("Hi".as_bytes()));

  let again = runner.run().await?;
  assert_eq!(
    again.row.latest_value(&config.column_family, &config.column),
    report.row.latest_value(&config.column_family, &config.column)
  );

  store.delete_table(&table).await?;
  Ok(())
}

pub fn init_tracing() {
  let _ = tracing_subscriber::fmt()
    .with_max_level(tracing::Level::INFO)
    .with_target(false)
    .with_ansi(false)
    .without_time()
    .try_init();
}
