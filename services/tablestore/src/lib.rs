//! Table store client shared by the transform and validator services
//!
//! Provides:
//! - A small typed table model (`Value`, `Column`, `Schema`, `Table`)
//! - The `TableStore` contract: read, count, atomic overwrite
//! - A Postgres implementation (sqlx) and in-memory / dry-run implementations
//! - The catalog of curated table names

pub mod catalog;
pub mod error;
pub mod memory;
pub mod postgres;
pub mod store;
pub mod table;
pub mod value;

pub use error::StoreError;
pub use memory::{DryRunStore, MemoryTableStore};
pub use postgres::PgTableStore;
pub use store::{TableStore, WriteMode};
pub use table::{Column, Schema, Table};
pub use value::{ColumnType, Value};
