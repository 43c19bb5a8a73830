//! Plant capacity reference loader
//!
//! Responsibilities:
//! - Read the reference file (CSV, or the first sheet of an XLS/XLSX/ODS workbook)
//! - Normalize headers and infer one type per column
//! - Drop `plant_type` (it duplicates `energy_source` from the energy facts)
//! - Fail on a missing `plant_id` / `installed_capacity_mw` column
//!
//! plant_id is NOT deduplicated here; the file owner guarantees one row per plant.

use crate::error::PipelineError;
use crate::records::{columns, require_columns};
use calamine::{open_workbook_auto, Data, Reader};
use std::path::Path;
use tablestore::value::{parse_date, parse_timestamp};
use tablestore::{Column, ColumnType, Schema, Table, Value};

pub const DEFAULT_REFERENCE_PATH: &str = "Files/plant_capacity.csv";

const REQUIRED: &[&str] = &[columns::PLANT_ID, columns::INSTALLED_CAPACITY_MW];

#[derive(Debug, Clone, PartialEq)]
pub struct CapacityRecord {
    pub plant_id: Option<String>,
    pub installed_capacity_mw: Option<f64>,
}

/// Cleaned reference set: the table (without `plant_type`) and typed rows
#[derive(Debug, Clone)]
pub struct CapacityReference {
    pub table: Table,
    pub records: Vec<CapacityRecord>,
}

impl CapacityReference {
    pub fn from_table(origin: &Path, mut table: Table) -> Result<Self, PipelineError> {
        let label = origin.display().to_string();
        table.drop_column(columns::PLANT_TYPE);
        let positions = require_columns(&label, table.schema(), REQUIRED)?;

        let records = table
            .rows()
            .iter()
            .map(|row| CapacityRecord {
                plant_id: row[positions[0]].as_key(),
                installed_capacity_mw: row[positions[1]].as_f64(),
            })
            .collect();

        Ok(Self { table, records })
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Header row plus raw cells (empty cells are `None`)
#[derive(Debug)]
struct Grid {
    headers: Vec<String>,
    cells: Vec<Vec<Option<String>>>,
}

/// Load the reference file at `path`
pub fn load_reference(path: &Path) -> Result<CapacityReference, PipelineError> {
    let grid = if is_workbook(path) {
        read_workbook_grid(path)?
    } else {
        let bytes = std::fs::read(path).map_err(|source| PipelineError::ReferenceIo {
            path: path.to_path_buf(),
            source,
        })?;
        read_csv_grid(&decode_text(&bytes), path)?
    };

    let table = infer_table(grid, path)?;
    tracing::info!(
        path = %path.display(),
        rows = table.len(),
        columns = %table.schema().describe(),
        "loaded capacity reference"
    );
    CapacityReference::from_table(path, table)
}

/// Parse reference CSV content that is already in memory
pub fn parse_reference_csv(content: &str, origin: &Path) -> Result<CapacityReference, PipelineError> {
    let grid = read_csv_grid(content, origin)?;
    let table = infer_table(grid, origin)?;
    CapacityReference::from_table(origin, table)
}

fn is_workbook(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| matches!(e.to_lowercase().as_str(), "xls" | "xlsx" | "xlsm" | "xlsb" | "ods"))
        .unwrap_or(false)
}

/// Decode file bytes: honour a BOM, else UTF-8, else Windows-1252
fn decode_text(bytes: &[u8]) -> String {
    if let Some((encoding, bom_len)) = encoding_rs::Encoding::for_bom(bytes) {
        let (text, _) = encoding.decode_without_bom_handling(&bytes[bom_len..]);
        return text.into_owned();
    }
    match encoding_rs::UTF_8.decode_without_bom_handling_and_without_replacement(bytes) {
        Some(text) => text.into_owned(),
        None => {
            let (text, _, _) = encoding_rs::WINDOWS_1252.decode(bytes);
            text.into_owned()
        }
    }
}

fn reference_error(origin: &Path, message: impl Into<String>) -> PipelineError {
    PipelineError::Reference {
        path: origin.to_path_buf(),
        message: message.into(),
    }
}

fn read_csv_grid(content: &str, origin: &Path) -> Result<Grid, PipelineError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(content.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| reference_error(origin, format!("cannot read header row: {}", e)))?
        .iter()
        .map(|h| h.to_string())
        .collect();

    let mut cells = Vec::new();
    for (line_idx, result) in reader.records().enumerate() {
        let line_num = line_idx + 2; // 1-indexed, after the header
        let record = result
            .map_err(|e| reference_error(origin, format!("line {}: {}", line_num, e)))?;
        if record.len() > headers.len() {
            return Err(reference_error(
                origin,
                format!(
                    "line {}: expected at most {} fields, found {}",
                    line_num,
                    headers.len(),
                    record.len()
                ),
            ));
        }
        let mut row: Vec<Option<String>> = record
            .iter()
            .map(|s| (!s.is_empty()).then(|| s.to_string()))
            .collect();
        row.resize(headers.len(), None);
        cells.push(row);
    }

    Ok(Grid { headers, cells })
}

fn read_workbook_grid(path: &Path) -> Result<Grid, PipelineError> {
    let mut workbook = open_workbook_auto(path)
        .map_err(|e| reference_error(path, format!("cannot open workbook: {}", e)))?;

    let sheet_name = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| reference_error(path, "workbook has no sheets"))?;
    let range = workbook
        .worksheet_range(&sheet_name)
        .map_err(|e| reference_error(path, format!("cannot read sheet '{}': {}", sheet_name, e)))?;

    let mut rows = range.rows();
    let headers: Vec<String> = rows
        .next()
        .ok_or_else(|| reference_error(path, format!("sheet '{}' has no header row", sheet_name)))?
        .iter()
        .map(|cell| cell_text(cell).unwrap_or_default())
        .collect();

    let cells = rows
        .map(|row| {
            let mut out: Vec<Option<String>> = row.iter().map(cell_text).collect();
            out.resize(headers.len(), None);
            out.truncate(headers.len());
            out
        })
        .collect();

    Ok(Grid { headers, cells })
}

fn cell_text(cell: &Data) -> Option<String> {
    match cell {
        Data::Empty => None,
        Data::String(s) if s.trim().is_empty() => None,
        Data::String(s) => Some(s.trim().to_string()),
        other => Some(format!("{}", other)),
    }
}

/// Lower-case snake_case identifier for a header
fn normalize_header(header: &str) -> String {
    let normalized: String = header
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    match normalized.chars().next() {
        Some(c) if c.is_ascii_digit() => format!("_{}", normalized),
        _ => normalized,
    }
}

/// Narrowest type that accepts every non-empty cell of a column
fn infer_column_type<'a>(values: impl Iterator<Item = &'a str> + Clone) -> ColumnType {
    let mut values = values.peekable();
    if values.peek().is_none() {
        return ColumnType::Text;
    }
    if values.clone().all(|v| v.parse::<i64>().is_ok()) {
        ColumnType::Int
    } else if values.clone().all(|v| v.parse::<f64>().is_ok()) {
        ColumnType::Float
    } else if values
        .clone()
        .all(|v| v.eq_ignore_ascii_case("true") || v.eq_ignore_ascii_case("false"))
    {
        ColumnType::Bool
    } else if values.clone().all(|v| parse_date(v).is_some() && !v.contains([' ', 'T'])) {
        ColumnType::Date
    } else if values.clone().all(|v| parse_timestamp(v).is_some()) {
        ColumnType::Timestamp
    } else {
        ColumnType::Text
    }
}

fn parse_cell(raw: &str, ty: ColumnType) -> Value {
    match ty {
        ColumnType::Int => raw.parse().map_or(Value::Null, Value::Int),
        ColumnType::Float => raw.parse().map_or(Value::Null, Value::Float),
        ColumnType::Bool => Value::Bool(raw.eq_ignore_ascii_case("true")),
        ColumnType::Date => parse_date(raw).map_or(Value::Null, Value::Date),
        ColumnType::Timestamp => parse_timestamp(raw).map_or(Value::Null, Value::Timestamp),
        ColumnType::Text => Value::Text(raw.to_string()),
    }
}

fn infer_table(grid: Grid, origin: &Path) -> Result<Table, PipelineError> {
    let mut names: Vec<String> = Vec::with_capacity(grid.headers.len());
    for (idx, header) in grid.headers.iter().enumerate() {
        let name = normalize_header(header);
        if name.is_empty() {
            return Err(reference_error(origin, format!("column {} has an empty header", idx + 1)));
        }
        if names.contains(&name) {
            return Err(reference_error(origin, format!("duplicate column '{}'", name)));
        }
        names.push(name);
    }

    // The join key keeps its text form: "001" must still match "001"
    let types: Vec<ColumnType> = names
        .iter()
        .enumerate()
        .map(|(col, name)| {
            if name == columns::PLANT_ID {
                return ColumnType::Text;
            }
            infer_column_type(
                grid.cells
                    .iter()
                    .filter_map(move |row| row[col].as_deref()),
            )
        })
        .collect();

    let schema = Schema::new(
        names
            .into_iter()
            .zip(&types)
            .map(|(name, ty)| Column::new(name, *ty))
            .collect(),
    );

    let rows = grid
        .cells
        .into_iter()
        .map(|row| {
            row.iter()
                .zip(&types)
                .map(|(cell, ty)| cell.as_deref().map_or(Value::Null, |raw| parse_cell(raw, *ty)))
                .collect()
        })
        .collect();

    Table::with_rows(schema, rows).map_err(|e| reference_error(origin, e.to_string()))
}
