use super::table::{coerce_measure, RawTable};
use crate::error::PipelineError;

/// A wide-table column holding one year's measure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct YearColumn {
    /// Header as it appears in the raw table (e.g. `2020.1`)
    pub header: String,
    /// Year label written to the long table (e.g. `2020`)
    pub year: String,
}

impl YearColumn {
    pub fn new(header: impl Into<String>, year: impl Into<String>) -> Self {
        Self {
            header: header.into(),
            year: year.into(),
        }
    }
}

/// Which columns of the wide table are unpivoted.
#[derive(Debug, Clone, Copy)]
pub enum YearColumns<'a> {
    /// Every column that is not an id column; the header is the year.
    Remaining,
    Selected(&'a [YearColumn]),
}

#[derive(Debug, Clone, PartialEq)]
pub struct LongRow {
    /// Id values, in the order of `LongTable::id_columns`
    pub ids: Vec<String>,
    pub year: String,
    pub value: Option<f64>,
}

/// Melted form of a wide table: one row per (entity, year column).
#[derive(Debug, Clone, PartialEq)]
pub struct LongTable {
    pub id_columns: Vec<String>,
    pub rows: Vec<LongRow>,
}

impl LongTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Stable sort by (first id, year).
    pub fn sort(&mut self) {
        self.rows.sort_by(|a, b| {
            a.ids
                .first()
                .cmp(&b.ids.first())
                .then_with(|| a.year.cmp(&b.year))
        });
    }
}

/// A column the reshape needed is not in the raw table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingColumn(pub String);

impl MissingColumn {
    pub fn for_source(self, source_key: &str) -> PipelineError {
        PipelineError::MissingColumn {
            source_key: source_key.to_string(),
            column: self.0,
        }
    }
}

/// Unpivot `table`: every row is crossed with every year column, so N rows
/// and K year columns give exactly N×K long rows. Values that are not
/// numbers become absent. Output is sorted by (first id, year).
pub fn reshape(
    table: &RawTable,
    id_columns: &[&str],
    year_columns: YearColumns<'_>,
) -> Result<LongTable, MissingColumn> {
    let id_indices = id_columns
        .iter()
        .map(|name| table.column_index(name).ok_or_else(|| MissingColumn(name.to_string())))
        .collect::<Result<Vec<_>, _>>()?;

    let years: Vec<(usize, String)> = match year_columns {
        YearColumns::Remaining => table
            .headers
            .iter()
            .enumerate()
            .filter(|(idx, _)| !id_indices.contains(idx))
            .map(|(idx, header)| (idx, header.clone()))
            .collect(),
        YearColumns::Selected(selected) => selected
            .iter()
            .map(|col| {
                table
                    .column_index(&col.header)
                    .map(|idx| (idx, col.year.clone()))
                    .ok_or_else(|| MissingColumn(col.header.clone()))
            })
            .collect::<Result<Vec<_>, _>>()?,
    };

    let mut rows = Vec::with_capacity(table.len() * years.len());
    for raw in &table.rows {
        let ids: Vec<String> = id_indices.iter().map(|&idx| raw[idx].clone()).collect();
        for (idx, year) in &years {
            rows.push(LongRow {
                ids: ids.clone(),
                year: year.clone(),
                value: coerce_measure(&raw[*idx]),
            });
        }
    }

    let mut long = LongTable {
        id_columns: id_columns.iter().map(|c| c.to_string()).collect(),
        rows,
    };
    long.sort();
    Ok(long)
}
