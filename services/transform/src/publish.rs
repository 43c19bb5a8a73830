//! Table publisher: full-table overwrites with a fixed write mode per table
//!
//! Write modes are resolved against the store for every output before the
//! first write, so a strict schema mismatch aborts with nothing published.

use crate::error::PipelineError;
use crate::records::columns;
use serde::Serialize;
use tablestore::catalog;
use tablestore::store::check_strict_schema;
use tablestore::{Schema, Table, TableStore, WriteMode};

/// Pass-through tables keep their shape across runs. Everything else may gain
/// columns: curated heating adds `heating_balance_mwh` to the raw table it
/// replaces, and DimPlant carries whatever the reference file adds.
pub fn write_mode(table: &str) -> WriteMode {
    match table {
        catalog::DIM_DATE | catalog::CURATED_ENERGY => WriteMode::Strict,
        _ => WriteMode::EvolveSchema,
    }
}

/// True when the two schemas differ only in the type of `date`
fn only_date_retyped(existing: &Schema, incoming: &Schema) -> bool {
    existing.len() == incoming.len()
        && existing
            .columns()
            .iter()
            .zip(incoming.columns())
            .all(|(old, new)| old.name == new.name && (old.ty == new.ty || new.name == columns::DATE))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PublishedTable {
    pub table: String,
    pub rows: usize,
    pub mode: WriteMode,
}

pub struct Publisher<'a, S> {
    store: &'a S,
    published: Vec<PublishedTable>,
}

impl<'a, S: TableStore + Sync> Publisher<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self {
            store,
            published: Vec::new(),
        }
    }

    /// Write mode for one output, checked against the stored schema.
    ///
    /// Curated energy replaces the raw table of the same name, whose `date`
    /// may be stored as text or timestamp. That one-time retype to DATE is
    /// written with schema evolution; any other strict mismatch is an error.
    pub async fn resolve_mode(&self, name: &str, table: &Table) -> Result<WriteMode, PipelineError> {
        let publish_error = |source| PipelineError::Publish {
            table: name.to_string(),
            source,
        };

        let mode = write_mode(name);
        if mode != WriteMode::Strict {
            return Ok(mode);
        }
        let existing = self.store.table_schema(name).await.map_err(publish_error)?;
        match existing {
            Some(existing)
                if name == catalog::CURATED_ENERGY
                    && existing != *table.schema()
                    && only_date_retyped(&existing, table.schema()) =>
            {
                tracing::info!(table = name, "retyping date column to DATE");
                Ok(WriteMode::EvolveSchema)
            }
            existing => {
                check_strict_schema(name, existing.as_ref(), table.schema()).map_err(publish_error)?;
                Ok(mode)
            }
        }
    }

    /// Resolve every output's write mode, in order
    pub async fn plan(&self, outputs: &[(&str, &Table)]) -> Result<Vec<WriteMode>, PipelineError> {
        let mut modes = Vec::with_capacity(outputs.len());
        for (name, table) in outputs {
            modes.push(self.resolve_mode(name, table).await?);
        }
        Ok(modes)
    }

    /// Overwrite `name` with `table`. A rejected write leaves the stored table
    /// as it was and aborts the run.
    pub async fn publish(
        &mut self,
        name: &str,
        table: &Table,
        mode: WriteMode,
    ) -> Result<(), PipelineError> {
        self.store
            .overwrite_table(name, table, mode)
            .await
            .map_err(|source| PipelineError::Publish {
                table: name.to_string(),
                source,
            })?;

        tracing::info!(table = name, rows = table.len(), mode = ?mode, "published");
        self.published.push(PublishedTable {
            table: name.to_string(),
            rows: table.len(),
            mode,
        });
        Ok(())
    }

    pub fn finish(self) -> Vec<PublishedTable> {
        self.published
    }
}
