use super::reshape::{reshape, MissingColumn, YearColumn, YearColumns};
use super::table::RawTable;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{HashMap, VecDeque};

static QUANTITY_HEADER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{4})$").expect("quantity header pattern"));
static VALUE_HEADER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{4})\.1$").expect("value header pattern"));

#[derive(Debug, Clone, PartialEq)]
pub struct JoinedRow {
    pub keys: Vec<String>,
    pub year: String,
    pub quantity: Option<f64>,
    pub value: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct JoinedTable {
    pub key_columns: Vec<String>,
    pub rows: Vec<JoinedRow>,
}

/// Split the year headers of an import/export feed into the quantity family
/// (`YYYY`) and the value family (`YYYY.1`). Other headers belong to neither.
pub fn measure_families(table: &RawTable) -> (Vec<YearColumn>, Vec<YearColumn>) {
    let mut quantities = Vec::new();
    let mut values = Vec::new();
    for header in &table.headers {
        if let Some(caps) = QUANTITY_HEADER.captures(header) {
            quantities.push(YearColumn::new(header.clone(), &caps[1]));
        } else if let Some(caps) = VALUE_HEADER.captures(header) {
            values.push(YearColumn::new(header.clone(), &caps[1]));
        }
    }
    (quantities, values)
}

/// Reshape both measure families and inner-join them on (keys, year).
///
/// A (keys, year) pair present in only one family is dropped. When the same
/// key repeats, rows pair up in order of occurrence, so each pair yields at
/// most min(quantity rows, value rows) joined rows.
pub fn split_and_join(
    table: &RawTable,
    key_columns: &[&str],
    quantity_columns: &[YearColumn],
    value_columns: &[YearColumn],
) -> Result<JoinedTable, MissingColumn> {
    let quantities = reshape(table, key_columns, YearColumns::Selected(quantity_columns))?;
    let values = reshape(table, key_columns, YearColumns::Selected(value_columns))?;

    let mut pending: HashMap<(Vec<String>, String), VecDeque<Option<f64>>> = HashMap::new();
    for row in values.rows {
        pending
            .entry((row.ids, row.year))
            .or_default()
            .push_back(row.value);
    }

    let mut rows = Vec::with_capacity(quantities.len());
    for row in quantities.rows {
        let key = (row.ids, row.year);
        let Some(value) = pending.get_mut(&key).and_then(|queue| queue.pop_front()) else {
            continue;
        };
        let (keys, year) = key;
        rows.push(JoinedRow {
            keys,
            year,
            quantity: row.value,
            value,
        });
    }

    Ok(JoinedTable {
        key_columns: quantities.id_columns,
        rows,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    fn join_all(table: &RawTable) -> JoinedTable {
        let (quantities, values) = measure_families(table);
        split_and_join(table, &["País"], &quantities, &values).unwrap()
    }

    #[test]
    fn test_measure_families() {
        let table = RawTable::new(
            strings(&["Id", "País", "2020", "2020.1", "2021", "2021.1", "notes"]),
            vec![],
        );
        let (quantities, values) = measure_families(&table);

        assert_eq!(
            quantities,
            vec![YearColumn::new("2020", "2020"), YearColumn::new("2021", "2021")]
        );
        assert_eq!(
            values,
            vec![YearColumn::new("2020.1", "2020"), YearColumn::new("2021.1", "2021")]
        );
    }

    #[test]
    fn test_join_single_row() {
        let table = RawTable::new(
            strings(&["Id", "País", "2020.1", "2020"]),
            vec![strings(&["1", "Brasil", "1000", "100"])],
        );

        let joined = join_all(&table);

        assert_eq!(joined.key_columns, strings(&["País"]));
        assert_eq!(
            joined.rows,
            vec![JoinedRow {
                keys: strings(&["Brasil"]),
                year: "2020".to_string(),
                quantity: Some(100.0),
                value: Some(1000.0),
            }]
        );
    }

    #[test]
    fn test_join_drops_years_missing_from_one_family() {
        // 2021 has a quantity but no value column
        let table = RawTable::new(
            strings(&["Id", "País", "2020", "2020.1", "2021"]),
            vec![strings(&["1", "Chile", "5", "50", "7"])],
        );

        let joined = join_all(&table);

        assert_eq!(joined.rows.len(), 1);
        assert_eq!(joined.rows[0].year, "2020");
    }

    #[test]
    fn test_join_keeps_absent_measures() {
        let table = RawTable::new(
            strings(&["Id", "País", "2020", "2020.1"]),
            vec![strings(&["1", "Chile", "nd", "50"])],
        );

        let joined = join_all(&table);

        assert_eq!(joined.rows.len(), 1);
        assert_eq!(joined.rows[0].quantity, None);
        assert_eq!(joined.rows[0].value, Some(50.0));
    }

    #[test]
    fn test_join_pairs_duplicate_keys_by_occurrence() {
        let table = RawTable::new(
            strings(&["Id", "País", "2020", "2020.1"]),
            vec![
                strings(&["10", "Outros", "1", "11"]),
                strings(&["11", "Outros", "2", "22"]),
            ],
        );

        let joined = join_all(&table);

        let pairs: Vec<(Option<f64>, Option<f64>)> =
            joined.rows.iter().map(|r| (r.quantity, r.value)).collect();
        assert_eq!(pairs, vec![(Some(1.0), Some(11.0)), (Some(2.0), Some(22.0))]);
    }

    #[test]
    fn test_join_row_count_bounded_by_smaller_family() {
        let table = RawTable::new(
            strings(&["Id", "País", "2019", "2020", "2020.1", "2021.1"]),
            vec![
                strings(&["1", "Brasil", "1", "2", "20", "30"]),
                strings(&["2", "Chile", "3", "4", "40", "50"]),
            ],
        );
        let (quantities, values) = measure_families(&table);
        let quantity_rows = table.len() * quantities.len();
        let value_rows = table.len() * values.len();

        let joined = split_and_join(&table, &["País"], &quantities, &values).unwrap();

        assert!(joined.rows.len() <= quantity_rows.min(value_rows));
        assert!(joined.rows.iter().all(|r| r.year == "2020"));
    }
}
