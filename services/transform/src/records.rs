//! Typed views over the raw fact tables
//!
//! A loaded fact table keeps its full `Table` (so curated pass-throughs carry
//! every source column) next to a typed record per row. Required columns are
//! checked once at load time; a missing one is a fatal schema error.

use crate::error::PipelineError;
use chrono::NaiveDate;
use tablestore::{ColumnType, Schema, Table, Value};

pub mod columns {
    pub const DATE: &str = "date";
    pub const PLANT_ID: &str = "plant_id";
    pub const PLANT_NAME: &str = "plant_name";
    pub const ENERGY_SOURCE: &str = "energy_source";
    pub const MWH_PRODUCED: &str = "mwh_produced";
    pub const HEATING_PRODUCED_MWH: &str = "heating_produced_mwh";
    pub const HEATING_CONSUMED_MWH: &str = "heating_consumed_mwh";
    pub const HEATING_BALANCE_MWH: &str = "heating_balance_mwh";
    pub const CO2_KG: &str = "co2_kg";
    pub const INSTALLED_CAPACITY_MW: &str = "installed_capacity_mw";
    pub const PLANT_TYPE: &str = "plant_type";
}

/// Composite (plant_id, date) join key. Null in either part never matches.
pub type DayKey = (String, NaiveDate);

pub fn day_key(plant_id: &Option<String>, date: Option<NaiveDate>) -> Option<DayKey> {
    Some((plant_id.clone()?, date?))
}

pub trait FactRecord: Sized {
    /// Columns that must be present, in the order `decode` receives them
    const REQUIRED: &'static [&'static str];

    /// Decode one row; `positions[i]` is the index of `REQUIRED[i]`
    fn decode(row: &[Value], positions: &[usize]) -> Self;
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnergyRecord {
    pub date: Option<NaiveDate>,
    pub plant_id: Option<String>,
    pub plant_name: Option<String>,
    pub energy_source: Option<String>,
    pub mwh_produced: Option<f64>,
}

impl FactRecord for EnergyRecord {
    const REQUIRED: &'static [&'static str] = &[
        columns::DATE,
        columns::PLANT_ID,
        columns::PLANT_NAME,
        columns::ENERGY_SOURCE,
        columns::MWH_PRODUCED,
    ];

    fn decode(row: &[Value], positions: &[usize]) -> Self {
        Self {
            date: row[positions[0]].as_date(),
            plant_id: row[positions[1]].as_key(),
            plant_name: row[positions[2]].as_key(),
            energy_source: row[positions[3]].as_key(),
            mwh_produced: row[positions[4]].as_f64(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HeatingRecord {
    pub date: Option<NaiveDate>,
    pub plant_id: Option<String>,
    pub heating_produced_mwh: Option<f64>,
    pub heating_consumed_mwh: Option<f64>,
}

impl FactRecord for HeatingRecord {
    const REQUIRED: &'static [&'static str] = &[
        columns::DATE,
        columns::PLANT_ID,
        columns::HEATING_PRODUCED_MWH,
        columns::HEATING_CONSUMED_MWH,
    ];

    fn decode(row: &[Value], positions: &[usize]) -> Self {
        Self {
            date: row[positions[0]].as_date(),
            plant_id: row[positions[1]].as_key(),
            heating_produced_mwh: row[positions[2]].as_f64(),
            heating_consumed_mwh: row[positions[3]].as_f64(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Co2Record {
    pub date: Option<NaiveDate>,
    pub plant_id: Option<String>,
    pub co2_kg: Option<f64>,
}

impl FactRecord for Co2Record {
    const REQUIRED: &'static [&'static str] = &[columns::DATE, columns::PLANT_ID, columns::CO2_KG];

    fn decode(row: &[Value], positions: &[usize]) -> Self {
        Self {
            date: row[positions[0]].as_date(),
            plant_id: row[positions[1]].as_key(),
            co2_kg: row[positions[2]].as_f64(),
        }
    }
}

/// A loaded fact table: the full table plus one typed record per row
#[derive(Debug, Clone)]
pub struct Facts<R> {
    pub table: Table,
    pub records: Vec<R>,
}

impl<R: FactRecord> Facts<R> {
    /// Check required columns, normalize `date` to a date type, decode rows
    pub fn from_table(name: &str, mut table: Table) -> Result<Self, PipelineError> {
        let positions = require_columns(name, table.schema(), R::REQUIRED)?;
        normalize_dates(name, &mut table)?;
        let records = table
            .rows()
            .iter()
            .map(|row| R::decode(row, &positions))
            .collect();
        Ok(Self { table, records })
    }
}

impl<R> Facts<R> {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Positions of `required` in `schema`, or a schema error naming the first
/// missing column
pub fn require_columns(
    table: &str,
    schema: &Schema,
    required: &[&str],
) -> Result<Vec<usize>, PipelineError> {
    required
        .iter()
        .map(|column| {
            schema.index_of(column).ok_or_else(|| PipelineError::Schema {
                table: table.to_string(),
                column: column.to_string(),
            })
        })
        .collect()
}

/// Cast the `date` column to a calendar date; unparseable values become null
pub fn normalize_dates(name: &str, table: &mut Table) -> Result<(), PipelineError> {
    table
        .retype_column(columns::DATE, ColumnType::Date, |v| v.as_date().into())
        .map_err(PipelineError::build(name))?;
    Ok(())
}
