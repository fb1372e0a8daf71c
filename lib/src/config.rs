use std::env;

use tonic::transport::Channel;
use tracing::debug;

use crate::types::{TableName, TableStoreError};

pub const DEFAULT_PROJECT_ID: &str = "my-project";
pub const DEFAULT_INSTANCE_ID: &str = "my-instance";
pub const DEFAULT_TABLE_ID: &str = "sample-table";
pub const DEFAULT_COLUMN_FAMILY: &str = "cf1";
pub const DEFAULT_COLUMN: &str = "greeting";
pub const DEFAULT_ENDPOINT: &str = "localhost:8086";

pub const EMULATOR_HOST_ENV: &str = "BIGTABLE_EMULATOR_HOST";
pub const PROJECT_ENV: &str = "GOOGLE_CLOUD_PROJECT";

/// ラウンドトリップ実行で使う名前。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundtripConfig {
  pub project_id: String,
  pub instance_id: String,
  pub table_id: String,
  pub column_family: String,
  pub column: String,
  /// 既存テーブルに `column_family` が無い場合は失敗させる。
  pub verify_existing_families: bool,
}

impl Default for RoundtripConfig {
  fn default() -> Self {
    Self {
      project_id: DEFAULT_PROJECT_ID.to_string(),
      instance_id: DEFAULT_INSTANCE_ID.to_string(),
      table_id: DEFAULT_TABLE_ID.to_string(),
      column_family: DEFAULT_COLUMN_FAMILY.to_string(),
      column: DEFAULT_COLUMN.to_string(),
      verify_existing_families: true,
    }
  }
}

impl RoundtripConfig {
  /// 既定値を返す。`GOOGLE_CLOUD_PROJECT` が設定されていればプロジェクトIDに使う。
  pub fn from_env() -> Self {
    let config = Self::default();
    match env::var(PROJECT_ENV) {
      Ok(project_id) if !project_id.is_empty() => config.with_project_id(project_id),
      _ => config,
    }
  }

  pub fn with_project_id(mut self, project_id: impl Into<String>) -> Self {
    self.project_id = project_id.into();
    self
  }

  pub fn with_instance_id(mut self, instance_id: impl Into<String>) -> Self {
    self.instance_id = instance_id.into();
    self
  }

  pub fn with_table_id(mut self, table_id: impl Into<String>) -> Self {
    self.table_id = table_id.into();
    self
  }

  pub fn with_column_family(mut self, column_family: impl Into<String>) -> Self {
    self.column_family = column_family.into();
    self
  }

  pub fn with_column(mut self, column: impl Into<String>) -> Self {
    self.column = column.into();
    self
  }

  pub fn with_verify_existing_families(mut self, verify: bool) -> Self {
    self.verify_existing_families = verify;
    self
  }

  pub fn table_name(&self) -> TableName {
    TableName::new(&self.project_id, &self.instance_id, &self.table_id)
  }
}

/// Bigtable 互換エンドポイントの接続先。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
  pub endpoint: String,
}

impl Default for ConnectionConfig {
  fn default() -> Self {
    Self {
      endpoint: DEFAULT_ENDPOINT.to_string(),
    }
  }
}

impl ConnectionConfig {
  pub fn new(endpoint: impl Into<String>) -> Self {
    Self {
      endpoint: endpoint.into(),
    }
  }

  /// `BIGTABLE_EMULATOR_HOST` (`host:port`) を読む。未設定なら `localhost:8086`。
  pub fn from_env() -> Self {
    match env::var(EMULATOR_HOST_ENV) {
      Ok(endpoint) if !endpoint.is_empty() => Self::new(endpoint),
      _ => Self::default(),
    }
  }

  /// エンドポイントを URI として返す。`host:port` のみの場合は平文の http とみなす。
  pub fn uri(&self) -> String {
    if self.endpoint.contains("://") {
      self.endpoint.clone()
    } else {
      format!("http://{}", self.endpoint)
    }
  }

  /// 遅延接続のチャネルを返す。到達できないエンドポイントは最初の RPC で失敗する。
  pub fn connect(&self) -> Result<Channel, TableStoreError> {
    let uri = self.uri();
    debug!("connecting lazily to {}", uri);
    let endpoint = Channel::from_shared(uri)
      .map_err(|err| TableStoreError::OtherError(format!("invalid endpoint {}: {}", self.endpoint, err)))?;
    Ok(endpoint.connect_lazy())
  }
}
