use std::collections::{BTreeSet, HashMap};
use std::fmt;

use async_trait::async_trait;
use googleapis_tonic_google_bigtable_admin_v2::google::bigtable::admin::v2::bigtable_table_admin_client::BigtableTableAdminClient;
use googleapis_tonic_google_bigtable_admin_v2::google::bigtable::admin::v2::table::{TimestampGranularity, View};
use googleapis_tonic_google_bigtable_admin_v2::google::bigtable::admin::v2::{
  gc_rule, ColumnFamily, CreateTableRequest, DeleteTableRequest, GcRule, GetTableRequest, Table,
};
use googleapis_tonic_google_bigtable_v2::google::bigtable::v2::bigtable_client::BigtableClient;
use googleapis_tonic_google_bigtable_v2::google::bigtable::v2::read_rows_response::cell_chunk::RowStatus;
use googleapis_tonic_google_bigtable_v2::google::bigtable::v2::read_rows_response::CellChunk;
use googleapis_tonic_google_bigtable_v2::google::bigtable::v2::{
  mutation, MutateRowRequest, Mutation, ReadRowsRequest, RowSet,
};
use tonic::transport::Channel;
use tonic::{Code, Status};
use tracing::{debug, instrument};

use crate::types::{Cell, RowData, RowMutation, TableName, TableStore, TableStoreError};

/// Bigtable のデータ API とテーブル管理 API (gRPC) を使う TableStore 実装。
#[derive(Clone)]
pub struct TableStoreForBigtable {
  data_client: BigtableClient<Channel>,
  admin_client: BigtableTableAdminClient<Channel>,
  max_versions: Option<i32>,
}

impl fmt::Debug for TableStoreForBigtable {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("TableStoreForBigtable")
      .field("max_versions", &self.max_versions)
      .finish_non_exhaustive()
  }
}

impl TableStoreForBigtable {
  pub fn new(channel: Channel) -> Self {
    Self::from_clients(BigtableClient::new(channel.clone()), BigtableTableAdminClient::new(channel))
  }

  pub fn from_clients(data_client: BigtableClient<Channel>, admin_client: BigtableTableAdminClient<Channel>) -> Self {
    Self {
      data_client,
      admin_client,
      max_versions: None,
    }
  }

  /// このストアが作成する全カラムファミリーに `MaxNumVersions` の GC ルールを付ける。
  pub fn with_max_versions(mut self, max_versions: Option<i32>) -> Self {
    self.max_versions = max_versions;
    self
  }

  fn column_family(&self) -> ColumnFamily {
    ColumnFamily {
      gc_rule: self.max_versions.map(|n| GcRule {
        rule: Some(gc_rule::Rule::MaxNumVersions(n)),
      }),
      ..Default::default()
    }
  }

  async fn fetch_rows(&self, request: ReadRowsRequest) -> Result<Vec<RowData>, TableStoreError> {
    let mut client = self.data_client.clone();
    let mut stream = client.read_rows(request).await.map_err(status_to_error)?.into_inner();
    let mut rows = Vec::new();
    let mut acc = RowAccumulator::default();
    while let Some(response) = stream.message().await.map_err(status_to_error)? {
      for chunk in response.chunks {
        acc.push_chunk(chunk, &mut rows)?;
      }
    }
    if let Some(row) = acc.finish_row() {
      rows.push(row);
    }
    Ok(rows)
  }
}

#[async_trait]
impl TableStore for TableStoreForBigtable {
  #[instrument(skip(self), fields(table = %table))]
  async fn create_table(&self, table: &TableName, families: &[String]) -> Result<(), TableStoreError> {
    let column_families = families
      .iter()
      .map(|family| (family.clone(), self.column_family()))
      .collect::<HashMap<_, _>>();
    let request = CreateTableRequest {
      parent: table.parent(),
      table_id: table.table_id().to_string(),
      table: Some(Table {
        column_families,
        granularity: TimestampGranularity::Millis as i32,
        ..Default::default()
      }),
      ..Default::default()
    };
    let mut client = self.admin_client.clone();
    client.create_table(request).await.map_err(status_to_error)?;
    Ok(())
  }

  #[instrument(skip(self), fields(table = %table))]
  async fn column_families(&self, table: &TableName) -> Result<BTreeSet<String>, TableStoreError> {
    let mut client = self.admin_client.clone();
    let response = client
      .get_table(GetTableRequest {
        name: table.path(),
        view: View::SchemaView as i32,
      })
      .await
      .map_err(status_to_error)?;
    Ok(response.into_inner().column_families.into_keys().collect())
  }

  #[instrument(skip(self), fields(table = %table))]
  async fn delete_table(&self, table: &TableName) -> Result<(), TableStoreError> {
    let mut client = self.admin_client.clone();
    client
      .delete_table(DeleteTableRequest { name: table.path() })
      .await
      .map_err(status_to_error)?;
    Ok(())
  }

  #[instrument(skip(self, mutation), fields(table = %table, row_key = mutation.row_key()))]
  async fn mutate_row(&self, table: &TableName, mutation: &RowMutation) -> Result<(), TableStoreError> {
    if mutation.is_empty() {
      return Err(TableStoreError::OtherError(format!(
        "mutation for row {} has no cells",
        mutation.row_key()
      )));
    }
    let mutations = mutation
      .cells()
      .iter()
      .flat_map(|(family, columns)| {
        columns
          .iter()
          .map(move |(column, value)| set_cell(family, column.as_bytes(), value.clone()))
      })
      .collect::<Vec<_>>();
    debug!("applying {} cell mutation(s)", mutations.len());
    let mut client = self.data_client.clone();
    client
      .mutate_row(MutateRowRequest {
        table_name: table.path(),
        row_key: mutation.row_key().as_bytes().to_vec(),
        mutations,
        ..Default::default()
      })
      .await
      .map_err(status_to_error)?;
    Ok(())
  }

  #[instrument(skip(self), fields(table = %table))]
  async fn read_row(&self, table: &TableName, row_key: &str) -> Result<Option<RowData>, TableStoreError> {
    let request = ReadRowsRequest {
      table_name: table.path(),
      rows: Some(RowSet {
        row_keys: vec![row_key.as_bytes().to_vec()],
        row_ranges: vec![],
      }),
      rows_limit: 1,
      ..Default::default()
    };
    let rows = self.fetch_rows(request).await?;
    Ok(rows.into_iter().find(|row| row.key() == row_key))
  }
}

fn set_cell(family: &str, qualifier: &[u8], value: Vec<u8>) -> Mutation {
  Mutation {
    mutation: Some(mutation::Mutation::SetCell(mutation::SetCell {
      family_name: family.to_string(),
      column_qualifier: qualifier.to_vec(),
      timestamp_micros: -1,
      value,
    })),
  }
}

fn status_to_error(status: Status) -> TableStoreError {
  match status.code() {
    Code::AlreadyExists => TableStoreError::AlreadyExists(status.message().to_string()),
    Code::NotFound => TableStoreError::NotFound(status.message().to_string()),
    _ => TableStoreError::IOError(Box::new(status)),
  }
}

/// ストリームで届く `CellChunk` を行にまとめる。
///
/// 直前のチャンクが分割値 (`value_size > 0`) を予告していない限り、チャンクは新しいセルを開始する。
/// ファミリーと修飾子が省略されたチャンクは直前のセルのものを引き継ぐ。
#[derive(Default)]
struct RowAccumulator {
  key: Vec<u8>,
  family: Option<String>,
  qualifier: Option<Vec<u8>>,
  timestamp_micros: i64,
  labels: Vec<String>,
  value: Vec<u8>,
  in_split_cell: bool,
  cells: Vec<(String, String, Cell)>,
}

impl RowAccumulator {
  fn push_chunk(&mut self, chunk: CellChunk, rows: &mut Vec<RowData>) -> Result<(), TableStoreError> {
    if matches!(chunk.row_status, Some(RowStatus::ResetRow(true))) {
      self.reset();
      return Ok(());
    }

    if !chunk.row_key.is_empty() && self.key != chunk.row_key {
      if let Some(row) = self.start_row(chunk.row_key.clone()) {
        rows.push(row);
      }
    }

    if !self.in_split_cell {
      if let Some(family) = chunk.family_name {
        self.family = Some(family);
      }
      if let Some(qualifier) = chunk.qualifier {
        self.qualifier = Some(qualifier);
      }
      self.timestamp_micros = chunk.timestamp_micros;
      self.labels = chunk.labels;
    }

    self.value.extend_from_slice(&chunk.value);
    self.in_split_cell = chunk.value_size > 0;
    if !self.in_split_cell {
      self.commit_cell()?;
    }

    if matches!(chunk.row_status, Some(RowStatus::CommitRow(true))) {
      if let Some(row) = self.finish_row() {
        rows.push(row);
      }
    }

    Ok(())
  }

  fn start_row(&mut self, key: Vec<u8>) -> Option<RowData> {
    let row = self.finish_row();
    self.key = key;
    row
  }

  fn commit_cell(&mut self) -> Result<(), TableStoreError> {
    let (family, qualifier) = match (&self.family, &self.qualifier) {
      (Some(family), Some(qualifier)) => (family.clone(), qualifier.clone()),
      _ => {
        return Err(TableStoreError::OtherError(format!(
          "cell chunk for row {} has no family or qualifier",
          String::from_utf8_lossy(&self.key)
        )))
      }
    };
    let cell = Cell {
      value: std::mem::take(&mut self.value),
      timestamp_micros: self.timestamp_micros,
      labels: std::mem::take(&mut self.labels),
    };
    self
      .cells
      .push((family, String::from_utf8_lossy(&qualifier).into_owned(), cell));
    Ok(())
  }

  fn finish_row(&mut self) -> Option<RowData> {
    if self.key.is_empty() {
      return None;
    }
    let key = std::mem::take(&mut self.key);
    let cells = std::mem::take(&mut self.cells);
    self.family = None;
    self.qualifier = None;
    self.value.clear();
    self.in_split_cell = false;
    if cells.is_empty() {
      return None;
    }
    let mut row = RowData::new(String::from_utf8_lossy(&key).into_owned());
    for (family, column, cell) in cells {
      row.push_cell(family, column, cell);
    }
    Some(row)
  }

  fn reset(&mut self) {
    self.key.clear();
    self.cells.clear();
    self.family = None;
    self.qualifier = None;
    self.labels.clear();
    self.value.clear();
    self.in_split_cell = false;
  }
}
