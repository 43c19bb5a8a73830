//! Full runs of the transform against the in-memory store

use std::path::Path;
use tablestore::{Column, ColumnType, DryRunStore, MemoryTableStore, Schema, Table, Value, WriteMode};
use transform::reference::parse_reference_csv;
use transform::{run, CapacityReference, PipelineError, PipelineOptions};

fn table(columns: &[(&str, ColumnType)], rows: Vec<Vec<Value>>) -> Table {
    let schema = Schema::new(
        columns
            .iter()
            .map(|(name, ty)| Column::new(*name, *ty))
            .collect(),
    );
    Table::with_rows(schema, rows).unwrap()
}

fn date(s: &str) -> Value {
    Value::from(s).as_date().into()
}

fn energy(rows: &[(&str, &str, &str, &str, f64)]) -> Table {
    table(
        &[
            ("date", ColumnType::Date),
            ("plant_id", ColumnType::Text),
            ("plant_name", ColumnType::Text),
            ("energy_source", ColumnType::Text),
            ("mwh_produced", ColumnType::Float),
        ],
        rows.iter()
            .map(|(d, id, name, source, mwh)| {
                vec![date(d), Value::from(*id), Value::from(*name), Value::from(*source), Value::Float(*mwh)]
            })
            .collect(),
    )
}

fn heating(rows: &[(&str, &str, f64, f64)]) -> Table {
    table(
        &[
            ("date", ColumnType::Date),
            ("plant_id", ColumnType::Text),
            ("heating_produced_mwh", ColumnType::Float),
            ("heating_consumed_mwh", ColumnType::Float),
        ],
        rows.iter()
            .map(|(d, id, produced, consumed)| {
                vec![date(d), Value::from(*id), Value::Float(*produced), Value::Float(*consumed)]
            })
            .collect(),
    )
}

fn co2(rows: &[(&str, &str, f64)]) -> Table {
    table(
        &[
            ("date", ColumnType::Date),
            ("plant_id", ColumnType::Text),
            ("co2_kg", ColumnType::Float),
        ],
        rows.iter()
            .map(|(d, id, kg)| vec![date(d), Value::from(*id), Value::Float(*kg)])
            .collect(),
    )
}

fn reference() -> CapacityReference {
    parse_reference_csv(
        "plant_id,installed_capacity_mw,plant_type\nP1,10,solar\nP2,25,gas\n",
        Path::new("plant_capacity.csv"),
    )
    .unwrap()
}

fn seeded_store() -> MemoryTableStore {
    let store = MemoryTableStore::new();
    store.insert(
        "factenergydaily",
        energy(&[
            ("2024-01-01", "P1", "Solar Farm", "solar", 100.0),
            ("2024-01-01", "P3", "Gas Plant", "gas", 80.0),
            ("2024-01-02", "P3", "Gas Plant", "gas", 60.0),
        ]),
    );
    store.insert("factheatingdaily", heating(&[("2024-01-01", "P2", 50.0, 5.0)]));
    store.insert("factco2daily", co2(&[("2024-01-01", "P3", 1200.0)]));
    store
}

fn float(table: &Table, row: usize, column: &str) -> Option<f64> {
    table.value(row, column).and_then(Value::as_f64)
}

// -----------------------------------------------------------------------------
// END TO END
// -----------------------------------------------------------------------------

#[tokio::test]
async fn test_run_publishes_every_output_table() {
    let store = seeded_store();
    let summary = run(&store, &reference(), PipelineOptions::default()).await.unwrap();

    let published: Vec<_> = summary.published.iter().map(|p| p.table.as_str()).collect();
    assert_eq!(
        published,
        [
            "dimdate",
            "dimplant",
            "factenergydaily",
            "fact_energy_kpi_daily",
            "factheatingdaily",
            "fact_heating_kpi_daily",
            "fact_heating_emissions_daily",
        ]
    );
    assert_eq!(summary.rows("dimdate"), Some(2));
    assert_eq!(summary.rows("dimplant"), Some(2));
    assert_eq!(summary.rows("fact_energy_kpi_daily"), Some(3));
    assert_eq!(summary.duplicate_co2_keys, 0);
    assert!(summary.conflicting_plants.is_empty());

    for name in ["dimdate", "dimplant", "fact_energy_kpi_daily", "fact_heating_emissions_daily"] {
        assert!(store.get(name).is_some(), "{name} was not written");
    }
}

#[tokio::test]
async fn test_solar_plant_kpis() {
    let store = seeded_store();
    run(&store, &reference(), PipelineOptions::default()).await.unwrap();

    let kpi = store.get("fact_energy_kpi_daily").unwrap();
    assert_eq!(kpi.value(0, "plant_id"), Some(&Value::from("P1")));
    assert_eq!(float(&kpi, 0, "theoretical_max_mwh"), Some(240.0));
    assert!((float(&kpi, 0, "load_factor").unwrap() - 100.0 / 240.0).abs() < 1e-9);
    assert!((float(&kpi, 0, "capacity_utilization_pct").unwrap() - 41.6667).abs() < 1e-3);
    assert_eq!(kpi.value(0, "is_renewable"), Some(&Value::Bool(true)));
    assert_eq!(float(&kpi, 0, "renewable_mwh"), Some(100.0));
    assert_eq!(float(&kpi, 0, "non_renewable_mwh"), Some(0.0));
}

#[tokio::test]
async fn test_unmapped_plant_degrades_to_null_metrics() {
    let store = seeded_store();
    run(&store, &reference(), PipelineOptions::default()).await.unwrap();

    let dim = store.get("dimplant").unwrap();
    let p3_rows: Vec<usize> = (0..dim.len())
        .filter(|&i| dim.value(i, "plant_id") == Some(&Value::from("P3")))
        .collect();
    assert_eq!(p3_rows.len(), 1);
    assert_eq!(dim.value(p3_rows[0], "installed_capacity_mw"), Some(&Value::Null));

    let kpi = store.get("fact_energy_kpi_daily").unwrap();
    assert_eq!(kpi.value(1, "load_factor"), Some(&Value::Null));
    assert_eq!(float(&kpi, 1, "co2_kg"), Some(1200.0));
    assert_eq!(float(&kpi, 1, "non_renewable_mwh"), Some(80.0));
    assert_eq!(kpi.value(2, "co2_kg"), Some(&Value::Null));
}

#[tokio::test]
async fn test_heating_without_co2() {
    let store = seeded_store();
    run(&store, &reference(), PipelineOptions::default()).await.unwrap();

    let curated = store.get("factheatingdaily").unwrap();
    assert_eq!(float(&curated, 0, "heating_balance_mwh"), Some(45.0));

    let emissions = store.get("fact_heating_emissions_daily").unwrap();
    assert_eq!(emissions.len(), 1);
    assert_eq!(emissions.value(0, "co2_kg"), Some(&Value::Null));
    assert_eq!(emissions.value(0, "co2_kg_per_mwh_heat"), Some(&Value::Null));
    assert_eq!(float(&emissions, 0, "heating_balance_mwh"), Some(45.0));
}

#[tokio::test]
async fn test_heating_kpi_mirrors_curated_heating() {
    let store = seeded_store();
    let summary = run(&store, &reference(), PipelineOptions::default()).await.unwrap();

    let curated = store.get("factheatingdaily").unwrap();
    let kpi = store.get("fact_heating_kpi_daily").unwrap();
    assert_eq!(kpi, curated);
    assert_eq!(float(&kpi, 0, "heating_balance_mwh"), Some(45.0));

    let published = summary
        .published
        .iter()
        .find(|p| p.table == "fact_heating_kpi_daily")
        .unwrap();
    assert_eq!(published.mode, WriteMode::EvolveSchema);
    assert_eq!(published.rows, 1);
}

#[tokio::test]
async fn test_text_dates_in_raw_tables() {
    let store = MemoryTableStore::new();
    store.insert(
        "factenergydaily",
        table(
            &[
                ("date", ColumnType::Text),
                ("plant_id", ColumnType::Text),
                ("plant_name", ColumnType::Text),
                ("energy_source", ColumnType::Text),
                ("mwh_produced", ColumnType::Float),
            ],
            vec![vec![
                Value::from("2024-01-01"),
                Value::from("P1"),
                Value::from("Solar Farm"),
                Value::from("solar"),
                Value::Float(100.0),
            ]],
        ),
    );
    store.insert(
        "factheatingdaily",
        table(
            &[
                ("date", ColumnType::Text),
                ("plant_id", ColumnType::Text),
                ("heating_produced_mwh", ColumnType::Float),
                ("heating_consumed_mwh", ColumnType::Float),
            ],
            vec![vec![Value::from("2024-01-01"), Value::from("P1"), Value::Float(50.0), Value::Float(5.0)]],
        ),
    );
    store.insert(
        "factco2daily",
        table(
            &[("date", ColumnType::Text), ("plant_id", ColumnType::Text), ("co2_kg", ColumnType::Float)],
            vec![vec![Value::from("2024-01-01"), Value::from("P1"), Value::Float(500.0)]],
        ),
    );

    let summary = run(&store, &reference(), PipelineOptions::default()).await.unwrap();

    let energy = store.get("factenergydaily").unwrap();
    assert_eq!(energy.schema().column("date").unwrap().ty, ColumnType::Date);
    assert_eq!(energy.value(0, "date"), Some(&date("2024-01-01")));
    let energy_publish = summary
        .published
        .iter()
        .find(|p| p.table == "factenergydaily")
        .unwrap();
    assert_eq!(energy_publish.mode, WriteMode::EvolveSchema);

    let kpi = store.get("fact_energy_kpi_daily").unwrap();
    assert_eq!(float(&kpi, 0, "co2_kg"), Some(500.0));
    let emissions = store.get("fact_heating_emissions_daily").unwrap();
    assert_eq!(float(&emissions, 0, "co2_kg_per_mwh_heat"), Some(10.0));

    // The second run finds a DATE column and stays strict
    let again = run(&store, &reference(), PipelineOptions::default()).await.unwrap();
    let energy_publish = again
        .published
        .iter()
        .find(|p| p.table == "factenergydaily")
        .unwrap();
    assert_eq!(energy_publish.mode, WriteMode::Strict);
}

#[tokio::test]
async fn test_rerun_is_accepted_by_strict_tables() {
    let store = seeded_store();
    let first = run(&store, &reference(), PipelineOptions::default()).await.unwrap();
    let kpi = store.get("fact_energy_kpi_daily").unwrap();

    let second = run(&store, &reference(), PipelineOptions::default()).await.unwrap();

    assert_eq!(first.published, second.published);
    assert_eq!(store.get("fact_energy_kpi_daily").unwrap(), kpi);
}

// -----------------------------------------------------------------------------
// FAILURES
// -----------------------------------------------------------------------------

#[tokio::test]
async fn test_missing_column_aborts_before_publishing() {
    let store = seeded_store();
    store.insert(
        "factco2daily",
        table(&[("date", ColumnType::Date), ("co2_kg", ColumnType::Float)], vec![]),
    );

    let err = run(&store, &reference(), PipelineOptions::default()).await.unwrap_err();

    assert!(matches!(err, PipelineError::Schema { ref table, ref column } if table == "factco2daily" && column == "plant_id"));
    assert!(store.get("dimdate").is_none());
    assert!(store.get("fact_energy_kpi_daily").is_none());
}

#[tokio::test]
async fn test_missing_input_table_is_read_error() {
    let store = seeded_store();
    let empty = MemoryTableStore::new();
    empty.insert("factenergydaily", store.get("factenergydaily").unwrap());

    let err = run(&empty, &reference(), PipelineOptions::default()).await.unwrap_err();
    assert!(matches!(err, PipelineError::Read { ref table, .. } if table == "factheatingdaily"));
}

#[tokio::test]
async fn test_strict_mismatch_publishes_nothing() {
    let store = seeded_store();
    let raw_energy = store.get("factenergydaily").unwrap();
    let old_dates = table(
        &[("date", ColumnType::Date), ("fiscal_year", ColumnType::Int)],
        vec![vec![date("2023-12-31"), Value::Int(2023)]],
    );
    store.insert("dimdate", old_dates.clone());

    let err = run(&store, &reference(), PipelineOptions::default()).await.unwrap_err();

    assert!(matches!(err, PipelineError::Publish { ref table, .. } if table == "dimdate"));
    assert_eq!(store.get("dimdate"), Some(old_dates));
    assert_eq!(store.get("factenergydaily"), Some(raw_energy));
    for name in ["dimplant", "fact_energy_kpi_daily", "fact_heating_kpi_daily", "fact_heating_emissions_daily"] {
        assert!(store.get(name).is_none(), "{name} was written");
    }
}

#[tokio::test]
async fn test_duplicate_co2_keys() {
    let store = seeded_store();
    store.insert(
        "factco2daily",
        co2(&[("2024-01-01", "P3", 1200.0), ("2024-01-01", "P3", 1300.0)]),
    );

    let err = run(&store, &reference(), PipelineOptions { strict_co2_keys: true })
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::CardinalityAnomaly { duplicates: 1, .. }));
    assert!(store.get("dimdate").is_none());

    let summary = run(&store, &reference(), PipelineOptions::default()).await.unwrap();
    assert_eq!(summary.duplicate_co2_keys, 1);
    assert_eq!(summary.rows("fact_energy_kpi_daily"), Some(4));
}

#[tokio::test]
async fn test_dry_run_leaves_store_untouched() {
    let seeded = seeded_store();
    let before: Vec<(String, Option<Table>)> = seeded
        .table_names()
        .into_iter()
        .map(|name| {
            let table = seeded.get(&name);
            (name, table)
        })
        .collect();
    let dry = DryRunStore::new(seeded);

    run(&dry, &reference(), PipelineOptions::default()).await.unwrap();

    let pending: Vec<_> = dry.pending_writes().into_iter().map(|(name, _)| name).collect();
    assert_eq!(pending.len(), 7);
    assert!(pending.contains(&"fact_heating_emissions_daily".to_string()));

    let inner = dry.inner();
    assert_eq!(
        inner.table_names(),
        ["factco2daily", "factenergydaily", "factheatingdaily"]
    );
    for (name, table) in before {
        assert_eq!(inner.get(&name), table, "{name} changed");
    }
    assert!(inner.get("factheatingdaily").unwrap().schema().column("heating_balance_mwh").is_none());
}
