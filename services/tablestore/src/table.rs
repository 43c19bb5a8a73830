//! In-memory tables: an ordered schema plus row-major cells

use crate::error::StoreError;
use crate::value::{ColumnType, Value};
use serde::{Deserialize, Serialize};

/// A named, typed column
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub ty: ColumnType,
}

impl Column {
    pub fn new(name: impl Into<String>, ty: ColumnType) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }
}

/// Ordered column list. Column names are unique within a schema.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Schema {
    columns: Vec<Column>,
}

impl Schema {
    pub fn new(columns: Vec<Column>) -> Self {
        Self { columns }
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index_of(name).is_some()
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    /// Comma-separated `name:type` list, used in error messages
    pub fn describe(&self) -> String {
        self.columns
            .iter()
            .map(|c| format!("{}:{}", c.name, c.ty))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// A full table snapshot: schema plus every row
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    schema: Schema,
    rows: Vec<Vec<Value>>,
}

impl Table {
    pub fn new(schema: Schema) -> Self {
        Self {
            schema,
            rows: Vec::new(),
        }
    }

    /// Build a table, checking every row against the schema
    pub fn with_rows(schema: Schema, rows: Vec<Vec<Value>>) -> Result<Self, StoreError> {
        let mut table = Self::new(schema);
        table.rows.reserve(rows.len());
        for row in rows {
            table.push_row(row)?;
        }
        Ok(table)
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Append a row. Arity must match and every non-null cell must carry the
    /// column's type.
    pub fn push_row(&mut self, row: Vec<Value>) -> Result<(), StoreError> {
        if row.len() != self.schema.len() {
            return Err(StoreError::RowArity {
                row: self.rows.len(),
                expected: self.schema.len(),
                found: row.len(),
            });
        }
        for (value, column) in row.iter().zip(self.schema.columns()) {
            check_type(column, value)?;
        }
        self.rows.push(row);
        Ok(())
    }

    /// Cell lookup by row index and column name
    pub fn value(&self, row: usize, column: &str) -> Option<&Value> {
        let idx = self.schema.index_of(column)?;
        self.rows.get(row).map(|r| &r[idx])
    }

    /// Replace a column's type and convert its cells in place.
    /// Returns false when the column does not exist.
    pub fn retype_column(
        &mut self,
        name: &str,
        ty: ColumnType,
        convert: impl Fn(&Value) -> Value,
    ) -> Result<bool, StoreError> {
        let Some(idx) = self.schema.index_of(name) else {
            return Ok(false);
        };
        let column = Column::new(name, ty);
        for row in &mut self.rows {
            let converted = convert(&row[idx]);
            check_type(&column, &converted)?;
            row[idx] = converted;
        }
        self.schema.columns[idx] = column;
        Ok(true)
    }

    /// Remove a column; returns false when it does not exist
    pub fn drop_column(&mut self, name: &str) -> bool {
        let Some(idx) = self.schema.index_of(name) else {
            return false;
        };
        self.schema.columns.remove(idx);
        for row in &mut self.rows {
            row.remove(idx);
        }
        true
    }

    /// Set a whole column: replaces an existing column of the same name in
    /// place, otherwise appends it.
    pub fn set_column(&mut self, column: Column, values: Vec<Value>) -> Result<(), StoreError> {
        if values.len() != self.rows.len() {
            return Err(StoreError::ColumnLength {
                column: column.name,
                expected: self.rows.len(),
                found: values.len(),
            });
        }
        for value in &values {
            check_type(&column, value)?;
        }
        match self.schema.index_of(&column.name) {
            Some(idx) => {
                for (row, value) in self.rows.iter_mut().zip(values) {
                    row[idx] = value;
                }
                self.schema.columns[idx] = column;
            }
            None => {
                for (row, value) in self.rows.iter_mut().zip(values) {
                    row.push(value);
                }
                self.schema.columns.push(column);
            }
        }
        Ok(())
    }
}

fn check_type(column: &Column, value: &Value) -> Result<(), StoreError> {
    match value.column_type() {
        Some(found) if found != column.ty => Err(StoreError::ValueType {
            column: column.name.clone(),
            expected: column.ty,
            found,
        }),
        _ => Ok(()),
    }
}
