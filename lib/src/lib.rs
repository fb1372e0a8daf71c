pub mod config;
pub mod key_generator;
mod roundtrip_runner;
mod table_store_for_bigtable;
#[cfg(test)]
mod table_store_for_bigtable_test;
mod table_store_for_memory;
#[cfg(test)]
mod table_store_test_support;
pub mod types;

pub use roundtrip_runner::*;
pub use table_store_for_bigtable::*;
pub use table_store_for_memory::*;
