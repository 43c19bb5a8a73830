//! Postgres-backed table store
//!
//! Each overwrite runs in a single transaction: the DDL (create, truncate or
//! drop-and-recreate) and every insert batch commit together or not at all.
//!
//! Reads and counts accept any existing table. Columns whose Postgres type
//! has no `ColumnType` are read as text; only a strict overwrite rejects them.

use crate::error::StoreError;
use crate::store::{check_strict_schema, validate_identifier, TableStore, WriteMode};
use crate::table::{Column, Schema, Table};
use crate::value::{ColumnType, Value};
use chrono::{NaiveDate, NaiveDateTime};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::query_builder::Separated;
use sqlx::{Executor, Postgres, QueryBuilder, Row};

/// Postgres accepts at most 65535 bind parameters per statement
const BIND_LIMIT: usize = 65_535;

pub const DEFAULT_BATCH_ROWS: usize = 1000;

#[derive(Debug, Clone)]
pub struct PgTableStore {
    pool: PgPool,
    batch_rows: usize,
}

impl PgTableStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            batch_rows: DEFAULT_BATCH_ROWS,
        }
    }

    pub async fn connect(db_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(db_url)
            .await?;
        Ok(Self::new(pool))
    }

    /// Rows per INSERT statement (clamped to the bind-parameter limit)
    pub fn with_batch_rows(mut self, batch_rows: usize) -> Self {
        self.batch_rows = batch_rows.max(1);
        self
    }

    fn rows_per_statement(&self, column_count: usize) -> usize {
        (BIND_LIMIT / column_count.max(1)).clamp(1, self.batch_rows)
    }
}

/// (column_name, data_type) pairs from information_schema, in column order
async fn existing_columns<'e, E>(executor: E, name: &str) -> Result<Vec<(String, String)>, StoreError>
where
    E: Executor<'e, Database = Postgres>,
{
    let rows = sqlx::query_as(
        r#"
        SELECT column_name::text, data_type::text
        FROM information_schema.columns
        WHERE table_schema = current_schema() AND table_name = $1
        ORDER BY ordinal_position
        "#,
    )
    .bind(name)
    .fetch_all(executor)
    .await?;
    Ok(rows)
}

/// Schema used for strict comparison before a write; every column type must
/// map exactly
fn exact_schema(name: &str, columns: Vec<(String, String)>) -> Result<Option<Schema>, StoreError> {
    if columns.is_empty() {
        return Ok(None);
    }

    let columns = columns
        .into_iter()
        .map(|(column, data_type)| match ColumnType::from_sql_type(&data_type) {
            Some(ty) => Ok(Column::new(column, ty)),
            None => Err(StoreError::UnsupportedType {
                table: name.to_string(),
                column,
                data_type,
            }),
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Some(Schema::new(columns)))
}

/// Schema for reading, plus the matching select list. Columns of unmapped
/// types (uuid, jsonb, arrays...) are read as their text form.
fn readable_schema(columns: Vec<(String, String)>) -> Option<(Schema, Vec<String>)> {
    if columns.is_empty() {
        return None;
    }

    let (columns, select): (Vec<Column>, Vec<String>) = columns
        .into_iter()
        .map(|(name, data_type)| match ColumnType::from_sql_type(&data_type) {
            Some(ty) => {
                let column = Column::new(name, ty);
                let expr = select_expr(&column);
                (column, expr)
            }
            None => {
                let expr = format!("{}::text", quote(&name));
                (Column::new(name, ColumnType::Text), expr)
            }
        })
        .unzip();

    Some((Schema::new(columns), select))
}

fn quote(identifier: &str) -> String {
    format!("\"{}\"", identifier)
}

/// Select expression that normalizes integer and numeric widths
fn select_expr(column: &Column) -> String {
    let quoted = quote(&column.name);
    match column.ty {
        ColumnType::Int => format!("{}::bigint", quoted),
        ColumnType::Float => format!("{}::double precision", quoted),
        ColumnType::Timestamp => format!("{}::timestamp", quoted),
        _ => quoted,
    }
}

fn create_table_sql(name: &str, schema: &Schema) -> String {
    let columns = schema
        .columns()
        .iter()
        .map(|c| format!("{} {}", quote(&c.name), c.ty.sql_type()))
        .collect::<Vec<_>>()
        .join(", ");
    format!("CREATE TABLE {} ({})", quote(name), columns)
}

fn decode_cell(row: &PgRow, idx: usize, ty: ColumnType) -> Result<Value, sqlx::Error> {
    Ok(match ty {
        ColumnType::Bool => row.try_get::<Option<bool>, _>(idx)?.into(),
        ColumnType::Int => row
            .try_get::<Option<i64>, _>(idx)?
            .map_or(Value::Null, Value::Int),
        ColumnType::Float => row.try_get::<Option<f64>, _>(idx)?.into(),
        ColumnType::Text => row.try_get::<Option<String>, _>(idx)?.into(),
        ColumnType::Date => row.try_get::<Option<NaiveDate>, _>(idx)?.into(),
        ColumnType::Timestamp => row
            .try_get::<Option<NaiveDateTime>, _>(idx)?
            .map_or(Value::Null, Value::Timestamp),
    })
}

/// Bind one cell; nulls are bound with the column's type so Postgres accepts them
fn push_value(b: &mut Separated<'_, '_, Postgres, &'static str>, value: &Value, ty: ColumnType) {
    match value {
        Value::Null => match ty {
            ColumnType::Bool => b.push_bind(None::<bool>),
            ColumnType::Int => b.push_bind(None::<i64>),
            ColumnType::Float => b.push_bind(None::<f64>),
            ColumnType::Text => b.push_bind(None::<String>),
            ColumnType::Date => b.push_bind(None::<NaiveDate>),
            ColumnType::Timestamp => b.push_bind(None::<NaiveDateTime>),
        },
        Value::Bool(v) => b.push_bind(*v),
        Value::Int(v) => b.push_bind(*v),
        Value::Float(v) => b.push_bind(*v),
        Value::Text(v) => b.push_bind(v.clone()),
        Value::Date(v) => b.push_bind(*v),
        Value::Timestamp(v) => b.push_bind(*v),
    };
}

impl TableStore for PgTableStore {
    async fn table_schema(&self, name: &str) -> Result<Option<Schema>, StoreError> {
        validate_identifier(name)?;
        let columns = existing_columns(&self.pool, name).await?;
        Ok(readable_schema(columns).map(|(schema, _)| schema))
    }

    async fn read_table(&self, name: &str) -> Result<Table, StoreError> {
        validate_identifier(name)?;
        let columns = existing_columns(&self.pool, name).await?;
        let (schema, select) =
            readable_schema(columns).ok_or_else(|| StoreError::NotFound(name.to_string()))?;

        let sql = format!("SELECT {} FROM {}", select.join(", "), quote(name));
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;

        let mut table = Table::new(schema.clone());
        for row in &rows {
            let values = schema
                .columns()
                .iter()
                .enumerate()
                .map(|(idx, column)| decode_cell(row, idx, column.ty))
                .collect::<Result<Vec<_>, _>>()?;
            table.push_row(values)?;
        }

        tracing::debug!(table = name, rows = table.len(), "read table");
        Ok(table)
    }

    async fn count_rows(&self, name: &str) -> Result<u64, StoreError> {
        validate_identifier(name)?;
        let (exists,): (bool,) = sqlx::query_as(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM information_schema.tables
                WHERE table_schema = current_schema() AND table_name = $1
            )
            "#,
        )
        .bind(name)
        .fetch_one(&self.pool)
        .await?;
        if !exists {
            return Err(StoreError::NotFound(name.to_string()));
        }
        let (count,): (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM {}", quote(name)))
            .fetch_one(&self.pool)
            .await?;
        Ok(count.max(0) as u64)
    }

    async fn overwrite_table(
        &self,
        name: &str,
        table: &Table,
        mode: WriteMode,
    ) -> Result<(), StoreError> {
        validate_identifier(name)?;
        for column in table.schema().names() {
            validate_identifier(column)?;
        }

        let mut tx = self.pool.begin().await?;
        let existing = exact_schema(name, existing_columns(&mut *tx, name).await?)?;

        match (mode, existing) {
            (WriteMode::Strict, Some(existing)) => {
                check_strict_schema(name, Some(&existing), table.schema())?;
                sqlx::query(&format!("TRUNCATE TABLE {}", quote(name)))
                    .execute(&mut *tx)
                    .await?;
            }
            (WriteMode::EvolveSchema, Some(_)) => {
                sqlx::query(&format!("DROP TABLE {}", quote(name)))
                    .execute(&mut *tx)
                    .await?;
                sqlx::query(&create_table_sql(name, table.schema()))
                    .execute(&mut *tx)
                    .await?;
            }
            (_, None) => {
                sqlx::query(&create_table_sql(name, table.schema()))
                    .execute(&mut *tx)
                    .await?;
            }
        }

        let columns = table.schema().columns();
        if !columns.is_empty() {
            let column_list = columns
                .iter()
                .map(|c| quote(&c.name))
                .collect::<Vec<_>>()
                .join(", ");
            let per_statement = self.rows_per_statement(columns.len());

            for chunk in table.rows().chunks(per_statement) {
                let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(format!(
                    "INSERT INTO {} ({}) ",
                    quote(name),
                    column_list
                ));
                builder.push_values(chunk, |mut b, row| {
                    for (value, column) in row.iter().zip(columns) {
                        push_value(&mut b, value, column.ty);
                    }
                });
                builder.build().execute(&mut *tx).await?;
            }
        }

        tx.commit().await?;
        tracing::debug!(table = name, rows = table.len(), ?mode, "overwrote table");
        Ok(())
    }
}
