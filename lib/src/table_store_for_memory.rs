use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use tracing::instrument;

use crate::types::{Cell, RowData, RowMutation, TableName, TableStore, TableStoreError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOperation {
  CreateTable,
  ColumnFamilies,
  DeleteTable,
  MutateRow,
  ReadRow,
}

type MemoryRow = BTreeMap<String, BTreeMap<String, Vec<Cell>>>;

#[derive(Debug, Default)]
struct MemoryTable {
  families: BTreeSet<String>,
  rows: BTreeMap<String, MemoryRow>,
}

#[derive(Debug, Default)]
struct MemoryState {
  tables: HashMap<String, MemoryTable>,
  failures: HashMap<StoreOperation, String>,
  calls: Vec<StoreOperation>,
}

impl MemoryState {
  fn enter(&mut self, operation: StoreOperation) -> Result<(), TableStoreError> {
    self.calls.push(operation);
    match self.failures.get(&operation) {
      Some(message) => Err(TableStoreError::OtherError(message.clone())),
      None => Ok(()),
    }
  }

  fn table(&self, table: &TableName) -> Result<&MemoryTable, TableStoreError> {
    self
      .tables
      .get(&table.path())
      .ok_or_else(|| TableStoreError::NotFound(format!("table {} not found", table)))
  }
}

/// オンメモリの TableStore 実装。クローン同士は同じテーブルを共有する。
#[derive(Debug, Clone, Default)]
pub struct TableStoreForMemory {
  state: Arc<Mutex<MemoryState>>,
}

impl TableStoreForMemory {
  pub fn new() -> Self {
    Self::default()
  }

  /// 以降の `operation` の呼び出しをすべて `OtherError(message)` で失敗させる。
  pub async fn fail_on(&self, operation: StoreOperation, message: impl Into<String>) {
    self.state.lock().await.failures.insert(operation, message.into());
  }

  pub async fn clear_failures(&self) {
    self.state.lock().await.failures.clear();
  }

  /// これまでに呼ばれた操作を呼び出し順に返す。
  pub async fn calls(&self) -> Vec<StoreOperation> {
    self.state.lock().await.calls.clone()
  }

  pub async fn row_count(&self, table: &TableName) -> usize {
    let state = self.state.lock().await;
    state.table(table).map(|t| t.rows.len()).unwrap_or(0)
  }
}

#[async_trait]
impl TableStore for TableStoreForMemory {
  #[instrument(skip(self), fields(table = %table))]
  async fn create_table(&self, table: &TableName, families: &[String]) -> Result<(), TableStoreError> {
    let mut state = self.state.lock().await;
    state.enter(StoreOperation::CreateTable)?;
    let path = table.path();
    if state.tables.contains_key(&path) {
      return Err(TableStoreError::AlreadyExists(format!("table {} already exists", path)));
    }
    state.tables.insert(
      path,
      MemoryTable {
        families: families.iter().cloned().collect(),
        rows: BTreeMap::new(),
      },
    );
    Ok(())
  }

  #[instrument(skip(self), fields(table = %table))]
  async fn column_families(&self, table: &TableName) -> Result<BTreeSet<String>, TableStoreError> {
    let mut state = self.state.lock().await;
    state.enter(StoreOperation::ColumnFamilies)?;
    Ok(state.table(table)?.families.clone())
  }

  #[instrument(skip(self), fields(table = %table))]
  async fn delete_table(&self, table: &TableName) -> Result<(), TableStoreError> {
    let mut state = self.state.lock().await;
    state.enter(StoreOperation::DeleteTable)?;
    state
      .tables
      .remove(&table.path())
      .map(|_| ())
      .ok_or_else(|| TableStoreError::NotFound(format!("table {} not found", table)))
  }

  #[instrument(skip(self, mutation), fields(table = %table, row_key = mutation.row_key()))]
  async fn mutate_row(&self, table: &TableName, mutation: &RowMutation) -> Result<(), TableStoreError> {
    let mut state = self.state.lock().await;
    state.enter(StoreOperation::MutateRow)?;
    if mutation.is_empty() {
      return Err(TableStoreError::OtherError(format!(
        "mutation for row {} has no cells",
        mutation.row_key()
      )));
    }
    let families = &state.table(table)?.families;
    if let Some(missing) = mutation.cells().keys().find(|family| !families.contains(*family)) {
      return Err(TableStoreError::NotFound(format!(
        "column family {} not found in table {}",
        missing, table
      )));
    }

    let timestamp_micros = Utc::now().timestamp_millis() * 1_000;
    let memory_table = state
      .tables
      .get_mut(&table.path())
      .ok_or_else(|| TableStoreError::NotFound(format!("table {} not found", table)))?;
    let row = memory_table.rows.entry(mutation.row_key().to_string()).or_default();
    for (family, columns) in mutation.cells() {
      for (column, value) in columns {
        let versions = row.entry(family.clone()).or_default().entry(column.clone()).or_default();
        versions.insert(0, Cell::new(value.clone(), timestamp_micros));
      }
    }
    Ok(())
  }

  #[instrument(skip(self), fields(table = %table))]
  async fn read_row(&self, table: &TableName, row_key: &str) -> Result<Option<RowData>, TableStoreError> {
    let mut state = self.state.lock().await;
    state.enter(StoreOperation::ReadRow)?;
    let row = match state.table(table)?.rows.get(row_key) {
      Some(row) => row,
      None => return Ok(None),
    };
    let mut row_data = RowData::new(row_key);
    for (family, columns) in row {
      for (column, cells) in columns {
        for cell in cells {
          row_data.push_cell(family.clone(), column.clone(), cell.clone());
        }
      }
    }
    Ok(Some(row_data))
  }
}
