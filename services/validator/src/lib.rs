//! Curated table quality gate
//!
//! Counts the rows of every curated table and classifies each one. All tables
//! are checked even after a failure, so one report lists every problem.

use serde::Serialize;
use tablestore::TableStore;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TableStatus {
    Ok { rows: u64 },
    Empty,
    Unreadable { reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableCheck {
    pub table: String,
    #[serde(flatten)]
    pub status: TableStatus,
}

impl TableCheck {
    pub fn passed(&self) -> bool {
        matches!(self.status, TableStatus::Ok { .. })
    }

    /// One-line failure message, `None` for a passing table
    pub fn failure(&self) -> Option<String> {
        match &self.status {
            TableStatus::Ok { .. } => None,
            TableStatus::Empty => Some(format!("{} exists but is empty.", self.table)),
            TableStatus::Unreadable { reason } => {
                Some(format!("{} missing or unreadable: {}", self.table, reason))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationReport {
    pub checks: Vec<TableCheck>,
}

impl ValidationReport {
    pub fn passed(&self) -> bool {
        self.checks.iter().all(TableCheck::passed)
    }

    pub fn failures(&self) -> Vec<String> {
        self.checks.iter().filter_map(TableCheck::failure).collect()
    }
}

pub async fn check_table<S: TableStore>(store: &S, table: &str) -> TableCheck {
    let status = match store.count_rows(table).await {
        Ok(0) => TableStatus::Empty,
        Ok(rows) => TableStatus::Ok { rows },
        Err(e) => TableStatus::Unreadable {
            reason: e.to_string(),
        },
    };
    match &status {
        TableStatus::Ok { rows } => tracing::info!(table, rows, "table ok"),
        TableStatus::Empty => tracing::warn!(table, "table is empty"),
        TableStatus::Unreadable { reason } => tracing::warn!(table, %reason, "table unreadable"),
    }
    TableCheck {
        table: table.to_string(),
        status,
    }
}

/// Check every table in order
pub async fn validate_tables<S, T>(store: &S, tables: &[T]) -> ValidationReport
where
    S: TableStore,
    T: AsRef<str>,
{
    let mut checks = Vec::with_capacity(tables.len());
    for table in tables {
        checks.push(check_table(store, table.as_ref()).await);
    }
    ValidationReport { checks }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_messages() {
        let empty = TableCheck {
            table: "dimdate".to_string(),
            status: TableStatus::Empty,
        };
        let missing = TableCheck {
            table: "dimplant".to_string(),
            status: TableStatus::Unreadable {
                reason: "table not found: dimplant".to_string(),
            },
        };
        assert_eq!(empty.failure().unwrap(), "dimdate exists but is empty.");
        assert_eq!(
            missing.failure().unwrap(),
            "dimplant missing or unreadable: table not found: dimplant"
        );
    }

    #[test]
    fn test_report_json_shape() {
        let report = ValidationReport {
            checks: vec![TableCheck {
                table: "dimdate".to_string(),
                status: TableStatus::Ok { rows: 3 },
            }],
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "checks": [{ "table": "dimdate", "status": "ok", "rows": 3 }] })
        );
    }
}
