use std::collections::{BTreeMap, BTreeSet};
use std::error::Error as StdError;
use std::fmt::{self, Debug, Display, Formatter};

use async_trait::async_trait;
use serde::{Serialize, Serializer};
use thiserror::Error;

/// テーブルを一意に識別する名前。
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableName {
  project_id: String,
  instance_id: String,
  table_id: String,
}

impl TableName {
  pub fn new(project_id: impl Into<String>, instance_id: impl Into<String>, table_id: impl Into<String>) -> Self {
    Self {
      project_id: project_id.into(),
      instance_id: instance_id.into(),
      table_id: table_id.into(),
    }
  }

  pub fn project_id(&self) -> &str {
    &self.project_id
  }

  pub fn instance_id(&self) -> &str {
    &self.instance_id
  }

  pub fn table_id(&self) -> &str {
    &self.table_id
  }

  /// インスタンスのリソース名(`projects/{p}/instances/{i}`)を返す。
  pub fn parent(&self) -> String {
    format!("projects/{}/instances/{}", self.project_id, self.instance_id)
  }

  /// テーブルのリソース名(`projects/{p}/instances/{i}/tables/{t}`)を返す。
  pub fn path(&self) -> String {
    format!("{}/tables/{}", self.parent(), self.table_id)
  }
}

impl Display for TableName {
  fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.path())
  }
}

/// 1行に対するアトミックな書き込み。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowMutation {
  row_key: String,
  cells: BTreeMap<String, BTreeMap<String, Vec<u8>>>,
}

impl RowMutation {
  pub fn new(row_key: impl Into<String>) -> Self {
    Self {
      row_key: row_key.into(),
      cells: BTreeMap::new(),
    }
  }

  pub fn set_cell(mut self, family: impl Into<String>, column: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
    self
      .cells
      .entry(family.into())
      .or_default()
      .insert(column.into(), value.into());
    self
  }

  pub fn row_key(&self) -> &str {
    &self.row_key
  }

  /// カラムファミリー -> (カラム名 -> 値) を返す。
  pub fn cells(&self) -> &BTreeMap<String, BTreeMap<String, Vec<u8>>> {
    &self.cells
  }

  pub fn is_empty(&self) -> bool {
    self.cells.values().all(|columns| columns.is_empty())
  }
}

/// セルの1バージョン。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Cell {
  #[serde(serialize_with = "serialize_utf8_lossy")]
  pub value: Vec<u8>,
  #[serde(rename = "timestamp")]
  pub timestamp_micros: i64,
  pub labels: Vec<String>,
}

impl Cell {
  pub fn new(value: impl Into<Vec<u8>>, timestamp_micros: i64) -> Self {
    Self {
      value: value.into(),
      timestamp_micros,
      labels: vec![],
    }
  }

  pub fn value_as_str(&self) -> Option<&str> {
    std::str::from_utf8(&self.value).ok()
  }
}

fn serialize_utf8_lossy<S: Serializer>(value: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
  serializer.serialize_str(&String::from_utf8_lossy(value))
}

/// 読み出した行。セルは各カラムごとに新しい順に並ぶ。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RowData {
  key: String,
  families: BTreeMap<String, BTreeMap<String, Vec<Cell>>>,
}

impl RowData {
  pub fn new(key: impl Into<String>) -> Self {
    Self {
      key: key.into(),
      families: BTreeMap::new(),
    }
  }

  pub fn key(&self) -> &str {
    &self.key
  }

  pub fn families(&self) -> &BTreeMap<String, BTreeMap<String, Vec<Cell>>> {
    &self.families
  }

  pub fn push_cell(&mut self, family: impl Into<String>, column: impl Into<String>, cell: Cell) {
    self
      .families
      .entry(family.into())
      .or_default()
      .entry(column.into())
      .or_default()
      .push(cell);
  }

  pub fn cells(&self, family: &str, column: &str) -> &[Cell] {
    self
      .families
      .get(family)
      .and_then(|columns| columns.get(column))
      .map(Vec::as_slice)
      .unwrap_or(&[])
  }

  /// 指定したカラムの最新の値を返す。
  pub fn latest_value(&self, family: &str, column: &str) -> Option<&[u8]> {
    self.cells(family, column).first().map(|cell| cell.value.as_slice())
  }

  pub fn is_empty(&self) -> bool {
    self.families.is_empty()
  }

  /// `{family: {column: [{value, timestamp, labels}]}}` 形式の整形済み JSON を返す。
  pub fn to_pretty_json(&self) -> Result<String, TableStoreError> {
    serde_json::to_string_pretty(&self.families).map_err(|err| TableStoreError::OtherError(err.to_string()))
  }
}

#[derive(Debug, Error)]
pub enum TableStoreError {
  #[error("AlreadyExists: {0}")]
  AlreadyExists(String),
  #[error("NotFound: {0}")]
  NotFound(String),
  #[error("IOError: {0}")]
  IOError(#[source] Box<dyn StdError + Send + Sync + 'static>),
  #[error("OtherError: {0}")]
  OtherError(String),
}

impl TableStoreError {
  pub fn is_already_exists(&self) -> bool {
    matches!(self, TableStoreError::AlreadyExists(_))
  }
}

/// テーブルストアを表すトレイト。
#[async_trait]
pub trait TableStore: Debug + Send + Sync + 'static {
  /// 指定したカラムファミリーを持つテーブルを作成する。既に存在する場合は `AlreadyExists` を返す。
  async fn create_table(&self, table: &TableName, families: &[String]) -> Result<(), TableStoreError>;

  /// テーブルのカラムファミリー名を返す。
  async fn column_families(&self, table: &TableName) -> Result<BTreeSet<String>, TableStoreError>;

  /// テーブルを削除する。
  async fn delete_table(&self, table: &TableName) -> Result<(), TableStoreError>;

  /// 1行をアトミックに書き込む。
  async fn mutate_row(&self, table: &TableName, mutation: &RowMutation) -> Result<(), TableStoreError>;

  /// 1行を読み出す。存在しない場合は `None` を返す。
  async fn read_row(&self, table: &TableName, row_key: &str) -> Result<Option<RowData>, TableStoreError>;
}
