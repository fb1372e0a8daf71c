use std::fmt::Debug;

use rand::Rng;

const BASE36_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
const ROW_KEY_SUFFIX_LEN: usize = 8;
const GREETING_SUFFIX_LEN: usize = 6;

pub trait RowKeyGenerator: Debug + Send + Sync + 'static {
  fn generate_row_key(&self) -> String;
  fn generate_greeting(&self) -> String;
}

/// 非暗号論的な乱数源から `row-xxxxxxxx` 形式のキーと `Hello xxxxxx!` 形式の挨拶を生成する。
#[derive(Debug, Clone, Default)]
pub struct RandomRowKeyGenerator;

impl RowKeyGenerator for RandomRowKeyGenerator {
  fn generate_row_key(&self) -> String {
    format!("row-{}", random_base36(ROW_KEY_SUFFIX_LEN))
  }

  fn generate_greeting(&self) -> String {
    format!("Hello {}!", random_base36(GREETING_SUFFIX_LEN))
  }
}

#[derive(Debug, Clone)]
pub struct FixedRowKeyGenerator {
  row_key: String,
  greeting: String,
}

impl FixedRowKeyGenerator {
  pub fn new(row_key: impl Into<String>, greeting: impl Into<String>) -> Self {
    Self {
      row_key: row_key.into(),
      greeting: greeting.into(),
    }
  }
}

impl RowKeyGenerator for FixedRowKeyGenerator {
  fn generate_row_key(&self) -> String {
    self.row_key.clone()
  }

  fn generate_greeting(&self) -> String {
    self.greeting.clone()
  }
}

fn random_base36(len: usize) -> String {
  let mut rng = rand::thread_rng();
  (0..len)
    .map(|_| BASE36_ALPHABET[rng.gen_range(0..BASE36_ALPHABET.len())] as char)
    .collect()
}
