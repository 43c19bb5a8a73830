use crate::value::ColumnType;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("table '{0}' does not exist")]
    NotFound(String),

    #[error("'{0}' is not a valid table or column identifier")]
    InvalidIdentifier(String),

    #[error("schema mismatch on '{table}': existing [{existing}], new [{incoming}]")]
    SchemaMismatch {
        table: String,
        existing: String,
        incoming: String,
    },

    #[error("row {row} has {found} values but the schema has {expected} columns")]
    RowArity {
        row: usize,
        expected: usize,
        found: usize,
    },

    #[error("column '{column}' has {found} values but the table has {expected} rows")]
    ColumnLength {
        column: String,
        expected: usize,
        found: usize,
    },

    #[error("column '{column}' expects {expected} values, got {found}")]
    ValueType {
        column: String,
        expected: ColumnType,
        found: ColumnType,
    },

    #[error("column '{column}' of '{table}' has unsupported type '{data_type}'")]
    UnsupportedType {
        table: String,
        column: String,
        data_type: String,
    },

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}
