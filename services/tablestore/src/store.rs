//! The table-store client contract
//!
//! Every component receives a store explicitly and names the table it reads or
//! writes on each call. Overwrites are all-or-nothing: a failed write leaves the
//! previously committed table untouched.

use crate::error::StoreError;
use crate::table::{Schema, Table};
use serde::Serialize;
use std::future::Future;

/// How an overwrite treats the existing table's schema
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteMode {
    /// Replace content only. An existing table must have exactly the new schema.
    Strict,
    /// Replace content and schema.
    EvolveSchema,
}

pub trait TableStore {
    /// Schema of an existing table, `None` when the table does not exist
    fn table_schema(
        &self,
        name: &str,
    ) -> impl Future<Output = Result<Option<Schema>, StoreError>> + Send;

    /// Full snapshot of a table
    fn read_table(&self, name: &str) -> impl Future<Output = Result<Table, StoreError>> + Send;

    fn count_rows(&self, name: &str) -> impl Future<Output = Result<u64, StoreError>> + Send;

    /// Atomically replace a table with `table`
    fn overwrite_table(
        &self,
        name: &str,
        table: &Table,
        mode: WriteMode,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;
}

/// Reject a strict overwrite whose schema differs from the existing table
pub fn check_strict_schema(
    name: &str,
    existing: Option<&Schema>,
    incoming: &Schema,
) -> Result<(), StoreError> {
    match existing {
        Some(existing) if existing != incoming => Err(StoreError::SchemaMismatch {
            table: name.to_string(),
            existing: existing.describe(),
            incoming: incoming.describe(),
        }),
        _ => Ok(()),
    }
}

/// Lower-case SQL identifier: `[a-z_][a-z0-9_]*`, at most 63 bytes
pub fn validate_identifier(name: &str) -> Result<(), StoreError> {
    let mut chars = name.chars();
    let valid_start = chars
        .next()
        .map(|c| c.is_ascii_lowercase() || c == '_')
        .unwrap_or(false);
    let valid_rest = chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');

    if valid_start && valid_rest && name.len() <= 63 {
        Ok(())
    } else {
        Err(StoreError::InvalidIdentifier(name.to_string()))
    }
}
