use std::fmt::{self, Display, Formatter};
use std::sync::Arc;

use thiserror::Error;
use tracing::{error, info, warn};

use crate::config::RoundtripConfig;
use crate::key_generator::{RandomRowKeyGenerator, RowKeyGenerator};
use crate::types::{RowData, RowMutation, TableName, TableStore, TableStoreError};

/// 実行ステージ。宣言順に実行される。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStage {
  Provisioning,
  Inserting,
  Reading,
}

impl Display for RunStage {
  fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
    match self {
      RunStage::Provisioning => write!(f, "provisioning"),
      RunStage::Inserting => write!(f, "inserting"),
      RunStage::Reading => write!(f, "reading"),
    }
  }
}

/// `ensure_table_exists` がテーブルを用意した方法。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provisioning {
  Created,
  AlreadyExisted,
}

#[derive(Debug, Error)]
pub enum RunnerError {
  #[error("failed to create table {table}: {source}")]
  CreateTable {
    table: String,
    #[source]
    source: TableStoreError,
  },
  #[error("failed to inspect table {table}: {source}")]
  InspectTable {
    table: String,
    #[source]
    source: TableStoreError,
  },
  #[error("table {table} is missing column families {missing:?}")]
  MissingColumnFamilies { table: String, missing: Vec<String> },
  #[error("failed to insert row {row_key}: {source}")]
  InsertRow {
    row_key: String,
    #[source]
    source: TableStoreError,
  },
  #[error("failed to read row {row_key}: {source}")]
  ReadRow {
    row_key: String,
    #[source]
    source: TableStoreError,
  },
  #[error("row {row_key} was not found")]
  RowNotFound { row_key: String },
}

impl RunnerError {
  pub fn stage(&self) -> RunStage {
    match self {
      RunnerError::CreateTable { .. } | RunnerError::InspectTable { .. } | RunnerError::MissingColumnFamilies { .. } => {
        RunStage::Provisioning
      }
      RunnerError::InsertRow { .. } => RunStage::Inserting,
      RunnerError::ReadRow { .. } | RunnerError::RowNotFound { .. } => RunStage::Reading,
    }
  }
}

/// 完了した実行の結果。
#[derive(Debug, Clone)]
pub struct RoundtripReport {
  pub table: TableName,
  pub provisioning: Provisioning,
  pub column_family: String,
  pub column: String,
  pub row_key: String,
  pub greeting: String,
  pub row: RowData,
}

impl RoundtripReport {
  /// 最新の保存値がこの実行で書き込んだ挨拶と一致する場合に `true` を返す。
  pub fn greeting_matches(&self) -> bool {
    self.row.latest_value(&self.column_family, &self.column) == Some(self.greeting.as_bytes())
  }
}

/// テーブルを用意し、生成した1行を書き込んで読み戻す。
#[derive(Debug, Clone)]
pub struct RoundtripRunner<S: TableStore> {
  store: S,
  config: RoundtripConfig,
  key_generator: Arc<dyn RowKeyGenerator>,
}

impl<S: TableStore> RoundtripRunner<S> {
  pub fn new(store: S, config: RoundtripConfig) -> Self {
    Self {
      store,
      config,
      key_generator: Arc::new(RandomRowKeyGenerator),
    }
  }

  pub fn with_key_generator(mut self, key_generator: Arc<dyn RowKeyGenerator>) -> Self {
    self.key_generator = key_generator;
    self
  }

  pub fn config(&self) -> &RoundtripConfig {
    &self.config
  }

  pub fn store(&self) -> &S {
    &self.store
  }

  /// `families` を持つ `table` を作成する。既に存在する場合も成功として扱う。
  pub async fn ensure_table_exists(
    &self,
    table: &TableName,
    families: &[String],
  ) -> Result<Provisioning, RunnerError> {
    info!("creating table {}...", table.table_id());
    match self.store.create_table(table, families).await {
      Ok(()) => {
        info!("table {} created", table.table_id());
        Ok(Provisioning::Created)
      }
      Err(TableStoreError::AlreadyExists(_)) => {
        info!("table {} already exists", table.table_id());
        if self.config.verify_existing_families {
          self.verify_column_families(table, families).await?;
        }
        Ok(Provisioning::AlreadyExisted)
      }
      Err(source) => {
        error!("failed to create table {}: {}", table.table_id(), source);
        Err(RunnerError::CreateTable {
          table: table.to_string(),
          source,
        })
      }
    }
  }

  async fn verify_column_families(&self, table: &TableName, families: &[String]) -> Result<(), RunnerError> {
    let existing = self
      .store
      .column_families(table)
      .await
      .map_err(|source| {
        error!("failed to inspect table {}: {}", table.table_id(), source);
        RunnerError::InspectTable {
          table: table.to_string(),
          source,
        }
      })?;
    let missing = families
      .iter()
      .filter(|family| !existing.contains(*family))
      .cloned()
      .collect::<Vec<_>>();
    if missing.is_empty() {
      Ok(())
    } else {
      warn!("table {} lacks column families {:?}", table.table_id(), missing);
      Err(RunnerError::MissingColumnFamilies {
        table: table.to_string(),
        missing,
      })
    }
  }

  /// `mutation` を1つのアトミックな書き込みとして適用し、応答を待つ。
  pub async fn insert_row(&self, table: &TableName, mutation: &RowMutation) -> Result<(), RunnerError> {
    info!("inserting row {}...", mutation.row_key());
    self.store.mutate_row(table, mutation).await.map_err(|source| {
      error!("failed to insert row {}: {}", mutation.row_key(), source);
      RunnerError::InsertRow {
        row_key: mutation.row_key().to_string(),
        source,
      }
    })?;
    info!("row {} inserted", mutation.row_key());
    Ok(())
  }

  pub async fn read_row_back(&self, table: &TableName, row_key: &str) -> Result<RowData, RunnerError> {
    info!("reading row {}...", row_key);
    let row = self.store.read_row(table, row_key).await.map_err(|source| {
      error!("failed to read row {}: {}", row_key, source);
      RunnerError::ReadRow {
        row_key: row_key.to_string(),
        source,
      }
    })?;
    match row {
      Some(row) => {
        match row.to_pretty_json() {
          Ok(json) => info!("row data: {}", json),
          Err(err) => warn!("row {} could not be rendered: {}", row_key, err),
        }
        Ok(row)
      }
      None => {
        error!("row {} was not found", row_key);
        Err(RunnerError::RowNotFound {
          row_key: row_key.to_string(),
        })
      }
    }
  }

  /// Provisioning -> Inserting -> Reading の順に実行する。失敗したステージで終了し、ロールバックはしない。
  pub async fn run(&self) -> Result<RoundtripReport, RunnerError> {
    let table = self.config.table_name();
    let families = vec![self.config.column_family.clone()];
    let provisioning = self.ensure_table_exists(&table, &families).await?;

    let row_key = self.key_generator.generate_row_key();
    let greeting = self.key_generator.generate_greeting();
    let mutation = RowMutation::new(row_key.clone()).set_cell(
      self.config.column_family.clone(),
      self.config.column.clone(),
      greeting.clone(),
    );
    self.insert_row(&table, &mutation).await?;

    let row = self.read_row_back(&table, &row_key).await?;
    Ok(RoundtripReport {
      table,
      provisioning,
      column_family: self.config.column_family.clone(),
      column: self.config.column.clone(),
      row_key,
      greeting,
      row,
    })
  }
}
