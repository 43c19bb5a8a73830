//! Dimension builder: DimDate and DimPlant
//!
//! DimPlant deduplication is structural: exact duplicate
//! (plant_id, plant_name, energy_source) rows collapse, but one plant_id with
//! two different names or sources keeps both rows. `conflicting_plants` lists
//! those ids so the run can report them.

use crate::error::PipelineError;
use crate::join::left_join;
use crate::records::{columns, require_columns, EnergyRecord, Facts};
use crate::reference::CapacityReference;
use chrono::NaiveDate;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use tablestore::catalog;
use tablestore::{Column, ColumnType, Schema, Table, Value};

/// Typed view of one DimPlant row
#[derive(Debug, Clone, PartialEq)]
pub struct PlantRecord {
    pub plant_id: Option<String>,
    pub plant_name: Option<String>,
    pub energy_source: Option<String>,
    pub installed_capacity_mw: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct DimPlant {
    pub table: Table,
    pub records: Vec<PlantRecord>,
}

/// One row per distinct date in the energy facts, ascending (null first)
pub fn build_dim_date(energy: &Facts<EnergyRecord>) -> Result<Table, PipelineError> {
    let dates: BTreeSet<Option<NaiveDate>> = energy.records.iter().map(|r| r.date).collect();

    let schema = Schema::new(vec![Column::new(columns::DATE, ColumnType::Date)]);
    let rows = dates.into_iter().map(|d| vec![Value::from(d)]).collect();
    Table::with_rows(schema, rows).map_err(PipelineError::build(catalog::DIM_DATE))
}

/// Distinct plant identities from the energy facts, left-joined to the
/// capacity reference on plant_id
pub fn build_dim_plant(
    energy: &Facts<EnergyRecord>,
    reference: &CapacityReference,
) -> Result<DimPlant, PipelineError> {
    const IDENTITY: &[&str] = &[columns::PLANT_ID, columns::PLANT_NAME, columns::ENERGY_SOURCE];

    let positions = require_columns(catalog::RAW_ENERGY, energy.table.schema(), IDENTITY)?;
    let base_columns: Vec<Column> = positions
        .iter()
        .map(|&idx| energy.table.schema().columns()[idx].clone())
        .collect();

    let mut seen = HashSet::new();
    let mut base_records: Vec<&EnergyRecord> = Vec::new();
    let mut base_rows = Vec::new();
    for (row, record) in energy.table.rows().iter().zip(&energy.records) {
        let identity = (
            record.plant_id.clone(),
            record.plant_name.clone(),
            record.energy_source.clone(),
        );
        if seen.insert(identity) {
            base_rows.push(positions.iter().map(|&idx| row[idx].clone()).collect());
            base_records.push(record);
        }
    }
    let base = Table::with_rows(Schema::new(base_columns), base_rows)
        .map_err(PipelineError::build(catalog::DIM_PLANT))?;

    let base_keys: Vec<Option<String>> = base_records.iter().map(|r| r.plant_id.clone()).collect();
    let reference_keys: Vec<Option<String>> =
        reference.records.iter().map(|r| r.plant_id.clone()).collect();

    let joined = left_join(&base, &base_keys, &reference.table, &reference_keys)
        .map_err(PipelineError::build(catalog::DIM_PLANT))?;

    let records = joined
        .lineage
        .iter()
        .map(|&(base_idx, reference_idx)| {
            let identity = base_records[base_idx];
            PlantRecord {
                plant_id: identity.plant_id.clone(),
                plant_name: identity.plant_name.clone(),
                energy_source: identity.energy_source.clone(),
                installed_capacity_mw: reference_idx
                    .and_then(|idx| reference.records[idx].installed_capacity_mw),
            }
        })
        .collect();

    Ok(DimPlant {
        table: joined.table,
        records,
    })
}

/// plant_ids that occur on more than one DimPlant row, sorted
pub fn conflicting_plants(dim: &DimPlant) -> Vec<String> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for id in dim.records.iter().filter_map(|r| r.plant_id.as_deref()) {
        *counts.entry(id).or_default() += 1;
    }
    counts
        .into_iter()
        .filter(|(_, n)| *n > 1)
        .map(|(id, _)| id.to_string())
        .collect()
}
