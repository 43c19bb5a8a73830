//! Run orchestration
//!
//! Responsibilities:
//! - Read the three raw fact tables (schema checked at load)
//! - Check CO2 key uniqueness before any join
//! - Build every output table, then publish them in a fixed order
//!
//! All tables are built and every write mode is checked against the store
//! before the first write, so a build failure or a strict schema mismatch
//! publishes nothing. A failure during the writes themselves stops the run;
//! tables already published stay.

use crate::curated::{curate_energy, curate_heating};
use crate::dimensions::{build_dim_date, build_dim_plant, conflicting_plants};
use crate::error::PipelineError;
use crate::kpi::{build_energy_kpi, build_heating_emissions, build_heating_kpi, duplicate_co2_keys};
use crate::publish::{PublishedTable, Publisher};
use crate::records::{Co2Record, EnergyRecord, FactRecord, Facts, HeatingRecord};
use crate::reference::CapacityReference;
use serde::Serialize;
use tablestore::catalog;
use tablestore::{Table, TableStore};

#[derive(Debug, Clone, Copy, Default)]
pub struct PipelineOptions {
    /// Fail the run when the CO2 facts repeat a (plant_id, date) key
    pub strict_co2_keys: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub energy_rows: usize,
    pub heating_rows: usize,
    pub co2_rows: usize,
    pub reference_rows: usize,
    pub duplicate_co2_keys: usize,
    pub conflicting_plants: Vec<String>,
    pub published: Vec<PublishedTable>,
}

impl RunSummary {
    /// Rows written to `table` in this run
    pub fn rows(&self, table: &str) -> Option<usize> {
        self.published
            .iter()
            .find(|p| p.table == table)
            .map(|p| p.rows)
    }
}

async fn load_facts<R: FactRecord, S: TableStore>(
    store: &S,
    name: &str,
) -> Result<Facts<R>, PipelineError> {
    let table = store
        .read_table(name)
        .await
        .map_err(|source| PipelineError::Read {
            table: name.to_string(),
            source,
        })?;
    let facts = Facts::from_table(name, table)?;
    tracing::info!(table = name, rows = facts.len(), "loaded facts");
    Ok(facts)
}

pub async fn run<S: TableStore + Sync>(
    store: &S,
    reference: &CapacityReference,
    options: PipelineOptions,
) -> Result<RunSummary, PipelineError> {
    // =========================================================================
    // LOAD
    // =========================================================================
    let energy: Facts<EnergyRecord> = load_facts(store, catalog::RAW_ENERGY).await?;
    let heating: Facts<HeatingRecord> = load_facts(store, catalog::RAW_HEATING).await?;
    let co2: Facts<Co2Record> = load_facts(store, catalog::RAW_CO2).await?;

    let duplicates = duplicate_co2_keys(&co2);
    if duplicates > 0 {
        if options.strict_co2_keys {
            return Err(PipelineError::CardinalityAnomaly {
                table: catalog::RAW_CO2.to_string(),
                duplicates,
            });
        }
        tracing::warn!(
            table = catalog::RAW_CO2,
            duplicates,
            "duplicate (plant_id, date) keys; joined rows will be multiplied"
        );
    }

    // =========================================================================
    // BUILD
    // =========================================================================
    let dim_date = build_dim_date(&energy)?;
    let dim_plant = build_dim_plant(&energy, reference)?;
    let conflicts = conflicting_plants(&dim_plant);
    if !conflicts.is_empty() {
        tracing::warn!(
            table = catalog::DIM_PLANT,
            plant_ids = ?conflicts,
            "plant_id appears with more than one name or energy source"
        );
    }
    tracing::info!(
        dim_date = dim_date.len(),
        dim_plant = dim_plant.table.len(),
        "built dimensions"
    );

    let curated_energy = curate_energy(&energy);
    let energy_kpi = build_energy_kpi(&energy, &dim_plant, &co2)?;
    let curated_heating = curate_heating(&heating)?;
    let heating_kpi = build_heating_kpi(&curated_heating);
    let heating_emissions = build_heating_emissions(&heating, &heating_kpi, &co2)?;

    // =========================================================================
    // PUBLISH
    // =========================================================================
    let outputs: [(&str, &Table); 7] = [
        (catalog::DIM_DATE, &dim_date),
        (catalog::DIM_PLANT, &dim_plant.table),
        (catalog::CURATED_ENERGY, &curated_energy),
        (catalog::ENERGY_KPI, &energy_kpi),
        (catalog::CURATED_HEATING, &curated_heating),
        (catalog::HEATING_KPI, &heating_kpi),
        (catalog::HEATING_EMISSIONS, &heating_emissions),
    ];
    let mut publisher = Publisher::new(store);
    let modes = publisher.plan(&outputs).await?;
    for ((name, table), mode) in outputs.into_iter().zip(modes) {
        publisher.publish(name, table, mode).await?;
    }

    let summary = RunSummary {
        energy_rows: energy.len(),
        heating_rows: heating.len(),
        co2_rows: co2.len(),
        reference_rows: reference.len(),
        duplicate_co2_keys: duplicates,
        conflicting_plants: conflicts,
        published: publisher.finish(),
    };
    tracing::info!(
        dim_plant = dim_plant.table.len(),
        energy_kpi = energy_kpi.len(),
        heating_emissions = heating_emissions.len(),
        "transform complete"
    );
    Ok(summary)
}
