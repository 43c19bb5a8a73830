//! KPI enrichment engine
//!
//! Responsibilities:
//! - Join curated energy facts to DimPlant (plant_id) and CO2 (plant_id, date)
//! - Derive load factor, utilization and the renewable split
//! - Join heating KPIs to CO2 and derive emissions intensity
//!
//! Every derived metric is `Option<f64>`. A zero or null divisor yields null,
//! never an error and never infinity.

use crate::dimensions::{DimPlant, PlantRecord};
use crate::error::PipelineError;
use crate::join::left_join;
use crate::records::{day_key, Co2Record, DayKey, EnergyRecord, Facts, HeatingRecord};
use std::collections::HashMap;
use tablestore::catalog;
use tablestore::{Column, ColumnType, Table, Value};

/// Energy sources classified as renewable (compared lower-cased)
pub const RENEWABLE_SOURCES: [&str; 4] = ["wind", "solar", "hydro", "biomass"];

pub const HOURS_PER_DAY: f64 = 24.0;

pub mod derived {
    pub const THEORETICAL_MAX_MWH: &str = "theoretical_max_mwh";
    pub const LOAD_FACTOR: &str = "load_factor";
    pub const CAPACITY_UTILIZATION_PCT: &str = "capacity_utilization_pct";
    pub const IS_RENEWABLE: &str = "is_renewable";
    pub const RENEWABLE_MWH: &str = "renewable_mwh";
    pub const NON_RENEWABLE_MWH: &str = "non_renewable_mwh";
    pub const CO2_KG_PER_MWH_HEAT: &str = "co2_kg_per_mwh_heat";
}

// =============================================================================
// METRICS
// =============================================================================

pub fn theoretical_max_mwh(installed_capacity_mw: Option<f64>) -> Option<f64> {
    installed_capacity_mw.map(|mw| mw * HOURS_PER_DAY)
}

/// mwh / theoretical max, only when the theoretical max is positive
pub fn load_factor(mwh_produced: Option<f64>, theoretical_max: Option<f64>) -> Option<f64> {
    guarded_ratio(mwh_produced, theoretical_max)
}

pub fn capacity_utilization_pct(load_factor: Option<f64>) -> Option<f64> {
    load_factor.map(|lf| lf * 100.0)
}

pub fn is_renewable(energy_source: Option<&str>) -> Option<bool> {
    let source = energy_source?.to_lowercase();
    Some(RENEWABLE_SOURCES.contains(&source.as_str()))
}

/// (renewable_mwh, non_renewable_mwh) from one classification decision.
/// The branch not taken is 0; an unknown classification zeroes both.
pub fn renewable_split(mwh_produced: Option<f64>, renewable: Option<bool>) -> (Option<f64>, Option<f64>) {
    match renewable {
        Some(true) => (mwh_produced, Some(0.0)),
        Some(false) => (Some(0.0), mwh_produced),
        None => (Some(0.0), Some(0.0)),
    }
}

pub fn co2_per_mwh_heat(co2_kg: Option<f64>, heating_produced_mwh: Option<f64>) -> Option<f64> {
    guarded_ratio(co2_kg, heating_produced_mwh)
}

fn guarded_ratio(numerator: Option<f64>, denominator: Option<f64>) -> Option<f64> {
    match denominator {
        Some(d) if d > 0.0 => numerator.map(|n| n / d),
        _ => None,
    }
}

// =============================================================================
// CO2 KEY CHECK
// =============================================================================

/// Number of CO2 rows whose (plant_id, date) key was already seen. Rows with a
/// null key part are ignored since they never join.
pub fn duplicate_co2_keys(co2: &Facts<Co2Record>) -> usize {
    let mut seen: HashMap<DayKey, usize> = HashMap::new();
    for record in &co2.records {
        if let Some(key) = day_key(&record.plant_id, record.date) {
            *seen.entry(key).or_default() += 1;
        }
    }
    seen.values().map(|n| n - 1).sum()
}

fn co2_keys(co2: &Facts<Co2Record>) -> Vec<Option<DayKey>> {
    co2.records
        .iter()
        .map(|r| day_key(&r.plant_id, r.date))
        .collect()
}

// =============================================================================
// ENERGY KPI
// =============================================================================

pub fn build_energy_kpi(
    energy: &Facts<EnergyRecord>,
    dim_plant: &DimPlant,
    co2: &Facts<Co2Record>,
) -> Result<Table, PipelineError> {
    let table_name = catalog::ENERGY_KPI;

    let energy_keys: Vec<Option<String>> =
        energy.records.iter().map(|r| r.plant_id.clone()).collect();
    let plant_keys: Vec<Option<String>> =
        dim_plant.records.iter().map(|r| r.plant_id.clone()).collect();
    let with_plant = left_join(&energy.table, &energy_keys, &dim_plant.table, &plant_keys)
        .map_err(PipelineError::build(table_name))?;

    let day_keys: Vec<Option<DayKey>> = with_plant
        .lineage
        .iter()
        .map(|&(e, _)| day_key(&energy.records[e].plant_id, energy.records[e].date))
        .collect();
    let with_co2 = left_join(&with_plant.table, &day_keys, &co2.table, &co2_keys(co2))
        .map_err(PipelineError::build(table_name))?;

    let mut theoretical = Vec::with_capacity(with_co2.lineage.len());
    let mut factors = Vec::with_capacity(with_co2.lineage.len());
    let mut utilization = Vec::with_capacity(with_co2.lineage.len());
    let mut renewable_flags = Vec::with_capacity(with_co2.lineage.len());
    let mut renewable = Vec::with_capacity(with_co2.lineage.len());
    let mut non_renewable = Vec::with_capacity(with_co2.lineage.len());

    for &(joined_idx, _) in &with_co2.lineage {
        let (energy_idx, plant_idx) = with_plant.lineage[joined_idx];
        let record = &energy.records[energy_idx];
        let plant: Option<&PlantRecord> = plant_idx.map(|idx| &dim_plant.records[idx]);

        let tmax = theoretical_max_mwh(plant.and_then(|p| p.installed_capacity_mw));
        let lf = load_factor(record.mwh_produced, tmax);
        let flag = is_renewable(plant.and_then(|p| p.energy_source.as_deref()));
        let (ren, non_ren) = renewable_split(record.mwh_produced, flag);

        theoretical.push(Value::from(tmax));
        factors.push(Value::from(lf));
        utilization.push(Value::from(capacity_utilization_pct(lf)));
        renewable_flags.push(Value::from(flag));
        renewable.push(Value::from(ren));
        non_renewable.push(Value::from(non_ren));
    }

    let mut table = with_co2.table;
    let derived_columns = [
        (derived::THEORETICAL_MAX_MWH, ColumnType::Float, theoretical),
        (derived::LOAD_FACTOR, ColumnType::Float, factors),
        (derived::CAPACITY_UTILIZATION_PCT, ColumnType::Float, utilization),
        (derived::IS_RENEWABLE, ColumnType::Bool, renewable_flags),
        (derived::RENEWABLE_MWH, ColumnType::Float, renewable),
        (derived::NON_RENEWABLE_MWH, ColumnType::Float, non_renewable),
    ];
    for (name, ty, values) in derived_columns {
        table
            .set_column(Column::new(name, ty), values)
            .map_err(PipelineError::build(table_name))?;
    }
    Ok(table)
}

// =============================================================================
// HEATING KPI
// =============================================================================

/// The heating KPI table is the curated heating table, published under its
/// own name
pub fn build_heating_kpi(curated_heating: &Table) -> Table {
    curated_heating.clone()
}

/// Heating KPI rows left-joined to CO2 on (plant_id, date), plus
/// `co2_kg_per_mwh_heat`
pub fn build_heating_emissions(
    heating: &Facts<HeatingRecord>,
    heating_kpi: &Table,
    co2: &Facts<Co2Record>,
) -> Result<Table, PipelineError> {
    let table_name = catalog::HEATING_EMISSIONS;

    let heating_keys: Vec<Option<DayKey>> = heating
        .records
        .iter()
        .map(|r| day_key(&r.plant_id, r.date))
        .collect();
    let joined = left_join(heating_kpi, &heating_keys, &co2.table, &co2_keys(co2))
        .map_err(PipelineError::build(table_name))?;

    let intensity = joined
        .lineage
        .iter()
        .map(|&(h, c)| {
            let co2_kg = c.and_then(|idx| co2.records[idx].co2_kg);
            Value::from(co2_per_mwh_heat(co2_kg, heating.records[h].heating_produced_mwh))
        })
        .collect();

    let mut table = joined.table;
    table
        .set_column(
            Column::new(derived::CO2_KG_PER_MWH_HEAT, ColumnType::Float),
            intensity,
        )
        .map_err(PipelineError::build(table_name))?;
    Ok(table)
}
