//! Curated fact builder
//!
//! Energy and CO2 pass through unchanged (with `date` already normalized at
//! load). Heating gains `heating_balance_mwh`.

use crate::error::PipelineError;
use crate::records::{columns, EnergyRecord, Facts, HeatingRecord};
use tablestore::catalog;
use tablestore::{Column, ColumnType, Table, Value};

/// produced - consumed; null when either side is null
pub fn heating_balance(produced: Option<f64>, consumed: Option<f64>) -> Option<f64> {
    Some(produced? - consumed?)
}

pub fn curate_energy(energy: &Facts<EnergyRecord>) -> Table {
    energy.table.clone()
}

/// Heating facts plus `heating_balance_mwh`. An existing column of that name
/// is replaced in place.
pub fn curate_heating(heating: &Facts<HeatingRecord>) -> Result<Table, PipelineError> {
    let balances = heating
        .records
        .iter()
        .map(|r| Value::from(heating_balance(r.heating_produced_mwh, r.heating_consumed_mwh)))
        .collect();

    let mut table = heating.table.clone();
    table
        .set_column(
            Column::new(columns::HEATING_BALANCE_MWH, ColumnType::Float),
            balances,
        )
        .map_err(PipelineError::build(catalog::CURATED_HEATING))?;
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tablestore::Schema;

    fn heating(rows: Vec<(Value, Value)>) -> Facts<HeatingRecord> {
        let schema = Schema::new(vec![
            Column::new("date", ColumnType::Date),
            Column::new("plant_id", ColumnType::Text),
            Column::new("heating_produced_mwh", ColumnType::Float),
            Column::new("heating_consumed_mwh", ColumnType::Float),
        ]);
        let rows = rows
            .into_iter()
            .map(|(produced, consumed)| {
                vec![
                    Value::from("2024-01-01").as_date().into(),
                    Value::from("P1"),
                    produced,
                    consumed,
                ]
            })
            .collect();
        Facts::from_table("factheatingdaily", Table::with_rows(schema, rows).unwrap()).unwrap()
    }

    #[test]
    fn test_heating_balance() {
        assert_eq!(heating_balance(Some(50.0), Some(20.0)), Some(30.0));
        assert_eq!(heating_balance(Some(10.0), Some(25.0)), Some(-15.0));
        assert_eq!(heating_balance(None, Some(1.0)), None);
        assert_eq!(heating_balance(Some(1.0), None), None);
    }

    #[test]
    fn test_curate_heating_appends_balance() {
        let facts = heating(vec![
            (Value::Float(50.0), Value::Float(20.0)),
            (Value::Null, Value::Float(5.0)),
        ]);
        let curated = curate_heating(&facts).unwrap();

        assert_eq!(
            curated.schema().names().last(),
            Some("heating_balance_mwh")
        );
        assert_eq!(curated.len(), 2);
        assert_eq!(curated.value(0, "heating_balance_mwh"), Some(&Value::Float(30.0)));
        assert_eq!(curated.value(1, "heating_balance_mwh"), Some(&Value::Null));
    }

    #[test]
    fn test_curate_heating_is_repeatable() {
        let facts = heating(vec![(Value::Float(8.0), Value::Float(3.0))]);
        let first = curate_heating(&facts).unwrap();

        let again = Facts::<HeatingRecord>::from_table("factheatingdaily", first.clone()).unwrap();
        let second = curate_heating(&again).unwrap();

        assert_eq!(first, second);
    }
}
