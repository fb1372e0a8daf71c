pub mod bigtable;
pub mod docker;
