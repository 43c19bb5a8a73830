//! Hash left join over tables
//!
//! Output columns are every left column followed by the right columns whose
//! names the left side does not already carry. Each left row yields one output
//! row per matching right row, or a single row with nulls when nothing matches.
//! A `None` key never matches anything. Shadowed right column names are
//! returned in `Joined::shadowed` and logged at debug level.

use std::collections::HashMap;
use std::hash::Hash;
use tablestore::{Column, Schema, StoreError, Table, Value};

#[derive(Debug, Clone)]
pub struct Joined {
    pub table: Table,
    /// Per output row: (left row index, matched right row index)
    pub lineage: Vec<(usize, Option<usize>)>,
    /// Right columns not carried because the left side has the same name
    pub shadowed: Vec<String>,
}

pub fn left_join<K: Hash + Eq>(
    left: &Table,
    left_keys: &[Option<K>],
    right: &Table,
    right_keys: &[Option<K>],
) -> Result<Joined, StoreError> {
    debug_assert_eq!(left.len(), left_keys.len());
    debug_assert_eq!(right.len(), right_keys.len());

    let mut carried: Vec<(usize, Column)> = Vec::new();
    let mut shadowed = Vec::new();
    for (idx, column) in right.schema().columns().iter().enumerate() {
        if left.schema().contains(&column.name) {
            shadowed.push(column.name.clone());
        } else {
            carried.push((idx, column.clone()));
        }
    }
    if !shadowed.is_empty() {
        tracing::debug!(columns = ?shadowed, "right-side columns shadowed by the left side");
    }

    let mut columns = left.schema().columns().to_vec();
    columns.extend(carried.iter().map(|(_, c)| c.clone()));
    let mut table = Table::new(Schema::new(columns));

    let mut index: HashMap<&K, Vec<usize>> = HashMap::new();
    for (idx, key) in right_keys.iter().enumerate() {
        if let Some(key) = key {
            index.entry(key).or_default().push(idx);
        }
    }

    let mut lineage = Vec::with_capacity(left.len());
    for (left_idx, (row, key)) in left.rows().iter().zip(left_keys).enumerate() {
        let matches = key.as_ref().and_then(|k| index.get(k));
        match matches {
            Some(right_rows) => {
                for &right_idx in right_rows {
                    let right_row = &right.rows()[right_idx];
                    let mut out = row.clone();
                    out.extend(carried.iter().map(|(idx, _)| right_row[*idx].clone()));
                    table.push_row(out)?;
                    lineage.push((left_idx, Some(right_idx)));
                }
            }
            None => {
                let mut out = row.clone();
                out.extend(carried.iter().map(|_| Value::Null));
                table.push_row(out)?;
                lineage.push((left_idx, None));
            }
        }
    }

    Ok(Joined {
        table,
        lineage,
        shadowed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tablestore::ColumnType;

    fn table(columns: &[(&str, ColumnType)], rows: Vec<Vec<Value>>) -> Table {
        let schema = Schema::new(
            columns
                .iter()
                .map(|(name, ty)| Column::new(*name, *ty))
                .collect(),
        );
        Table::with_rows(schema, rows).unwrap()
    }

    fn keys(table: &Table) -> Vec<Option<String>> {
        (0..table.len())
            .map(|i| table.value(i, "plant_id").and_then(Value::as_key))
            .collect()
    }

    #[test]
    fn test_left_join_keeps_unmatched_and_drops_duplicate_names() {
        let left = table(
            &[("plant_id", ColumnType::Text), ("mwh", ColumnType::Float)],
            vec![
                vec![Value::from("P1"), Value::Float(1.0)],
                vec![Value::from("P9"), Value::Float(2.0)],
                vec![Value::Null, Value::Float(3.0)],
            ],
        );
        let right = table(
            &[("plant_id", ColumnType::Text), ("capacity", ColumnType::Float)],
            vec![vec![Value::from("P1"), Value::Float(10.0)]],
        );

        let joined = left_join(&left, &keys(&left), &right, &keys(&right)).unwrap();

        let names: Vec<_> = joined.table.schema().names().collect();
        assert_eq!(names, ["plant_id", "mwh", "capacity"]);
        assert_eq!(joined.table.len(), 3);
        assert_eq!(joined.table.value(0, "capacity"), Some(&Value::Float(10.0)));
        assert_eq!(joined.table.value(1, "capacity"), Some(&Value::Null));
        assert_eq!(joined.table.value(2, "capacity"), Some(&Value::Null));
        assert_eq!(joined.lineage, vec![(0, Some(0)), (1, None), (2, None)]);
    }

    #[test]
    fn test_left_value_wins_on_name_collision() {
        let left = table(
            &[("plant_id", ColumnType::Text), ("co2_kg", ColumnType::Float)],
            vec![vec![Value::from("P1"), Value::Float(1.0)]],
        );
        let right = table(
            &[("plant_id", ColumnType::Text), ("co2_kg", ColumnType::Float)],
            vec![vec![Value::from("P1"), Value::Float(99.0)]],
        );

        let joined = left_join(&left, &keys(&left), &right, &keys(&right)).unwrap();

        assert_eq!(joined.shadowed, ["plant_id", "co2_kg"]);
        assert_eq!(joined.table.schema().len(), 2);
        assert_eq!(joined.table.value(0, "co2_kg"), Some(&Value::Float(1.0)));
        assert_eq!(joined.lineage, vec![(0, Some(0))]);
    }

    #[test]
    fn test_null_keys_never_match_each_other() {
        let left = table(
            &[("plant_id", ColumnType::Text)],
            vec![vec![Value::Null]],
        );
        let right = table(
            &[("plant_id", ColumnType::Text), ("capacity", ColumnType::Float)],
            vec![vec![Value::Null, Value::Float(10.0)]],
        );

        let joined = left_join(&left, &keys(&left), &right, &keys(&right)).unwrap();
        assert_eq!(joined.lineage, vec![(0, None)]);
    }

    #[test]
    fn test_duplicate_right_keys_multiply_rows() {
        let left = table(
            &[("plant_id", ColumnType::Text)],
            vec![vec![Value::from("P1")]],
        );
        let right = table(
            &[("plant_id", ColumnType::Text), ("co2_kg", ColumnType::Float)],
            vec![
                vec![Value::from("P1"), Value::Float(1.0)],
                vec![Value::from("P1"), Value::Float(2.0)],
            ],
        );

        let joined = left_join(&left, &keys(&left), &right, &keys(&right)).unwrap();
        assert_eq!(joined.table.len(), 2);
        assert_eq!(joined.lineage, vec![(0, Some(0)), (0, Some(1))]);
    }
}
