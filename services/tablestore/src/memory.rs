//! In-process stores: a plain in-memory store and a dry-run wrapper that reads
//! through to another store but keeps every write local.

use crate::error::StoreError;
use crate::store::{check_strict_schema, validate_identifier, TableStore, WriteMode};
use crate::table::{Schema, Table};
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Default)]
pub struct MemoryTableStore {
    tables: Mutex<BTreeMap<String, Table>>,
}

impl MemoryTableStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed or replace a table without any schema checks
    pub fn insert(&self, name: &str, table: Table) {
        self.lock().insert(name.to_string(), table);
    }

    pub fn get(&self, name: &str) -> Option<Table> {
        self.lock().get(name).cloned()
    }

    /// Names of every stored table, sorted
    pub fn table_names(&self) -> Vec<String> {
        self.lock().keys().cloned().collect()
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<String, Table>> {
        // Poisoning is ignored: every write is a single map insert.
        self.tables.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl TableStore for MemoryTableStore {
    async fn table_schema(&self, name: &str) -> Result<Option<Schema>, StoreError> {
        Ok(self.lock().get(name).map(|t| t.schema().clone()))
    }

    async fn read_table(&self, name: &str) -> Result<Table, StoreError> {
        self.get(name)
            .ok_or_else(|| StoreError::NotFound(name.to_string()))
    }

    async fn count_rows(&self, name: &str) -> Result<u64, StoreError> {
        self.lock()
            .get(name)
            .map(|t| t.len() as u64)
            .ok_or_else(|| StoreError::NotFound(name.to_string()))
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

        let mut tables = self.lock();
        if mode == WriteMode::Strict {
            check_strict_schema(name, tables.get(name).map(|t| t.schema()), table.schema())?;
        }
        tables.insert(name.to_string(), table.clone());
        Ok(())
    }
}

/// Reads from `inner` until a table has been written, then serves the local
/// copy. Nothing is ever written to `inner`.
#[derive(Debug)]
pub struct DryRunStore<S> {
    inner: S,
    written: MemoryTableStore,
}

impl<S> DryRunStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            written: MemoryTableStore::new(),
        }
    }

    /// The wrapped store, which no write ever reaches
    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Tables that a live run would have overwritten, with their contents
    pub fn pending_writes(&self) -> Vec<(String, Table)> {
        self.written
            .table_names()
            .into_iter()
            .filter_map(|name| self.written.get(&name).map(|t| (name, t)))
            .collect()
    }
}

impl<S: TableStore + Sync> TableStore for DryRunStore<S> {
    async fn table_schema(&self, name: &str) -> Result<Option<Schema>, StoreError> {
        match self.written.table_schema(name).await? {
            Some(schema) => Ok(Some(schema)),
            None => self.inner.table_schema(name).await,
        }
    }

    async fn read_table(&self, name: &str) -> Result<Table, StoreError> {
        match self.written.get(name) {
            Some(table) => Ok(table),
            None => self.inner.read_table(name).await,
        }
    }

    async fn count_rows(&self, name: &str) -> Result<u64, StoreError> {
        match self.written.get(name) {
            Some(table) => Ok(table.len() as u64),
            None => self.inner.count_rows(name).await,
        }
    }

    async fn overwrite_table(
        &self,
        name: &str,
        table: &Table,
        mode: WriteMode,
    ) -> Result<(), StoreError> {
        // Strict writes are checked against whatever a live run would see
        if mode == WriteMode::Strict {
            let existing = self.table_schema(name).await?;
            check_strict_schema(name, existing.as_ref(), table.schema())?;
        }
        self.written
            .overwrite_table(name, table, WriteMode::EvolveSchema)
            .await
    }
}
