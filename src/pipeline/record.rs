use crate::error::{PipelineError, Result};
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::collections::BTreeMap;
use std::fmt;

/// One cell of a normalized record.
#[derive(Debug, Clone, PartialEq)]
pub enum Field {
    Text(String),
    /// Numeric measure; `None` when the source had no usable number.
    Measure(Option<f64>),
}

impl Field {
    pub fn text(value: impl Into<String>) -> Self {
        Field::Text(value.into())
    }
}

/// String form used for CSV cells and equality filters. Absent measures are
/// empty; integral measures keep one decimal (`100.0`).
impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Field::Text(s) => write!(f, "{}", s),
            Field::Measure(None) => Ok(()),
            Field::Measure(Some(v)) if v.fract() == 0.0 && v.abs() < 1e16 => write!(f, "{:.1}", v),
            Field::Measure(Some(v)) => write!(f, "{}", v),
        }
    }
}

impl Serialize for Field {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Field::Text(s) => serializer.serialize_str(s),
            Field::Measure(Some(v)) => serializer.serialize_f64(*v),
            Field::Measure(None) => serializer.serialize_none(),
        }
    }
}

/// A fully preprocessed dataset: ordered columns and one `Field` per column
/// per row.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Field>>,
}

impl NormalizedTable {
    pub fn new(columns: &[&str]) -> Self {
        Self {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            rows: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn push(&mut self, row: Vec<Field>) {
        debug_assert_eq!(row.len(), self.columns.len());
        self.rows.push(row);
    }

    pub fn extend(&mut self, other: NormalizedTable) {
        debug_assert_eq!(self.columns, other.columns);
        self.rows.extend(other.rows);
    }

    /// Stable sort on the string form of the given columns, in order.
    pub fn sort_by_columns(&mut self, columns: &[&str]) {
        let indices: Vec<usize> = columns.iter().filter_map(|c| self.column_index(c)).collect();
        self.rows.sort_by(|a, b| {
            indices
                .iter()
                .map(|&idx| cmp_fields(&a[idx], &b[idx]))
                .find(|ord| ord.is_ne())
                .unwrap_or(std::cmp::Ordering::Equal)
        });
    }

    /// Distinct string values of a column, in first-seen order.
    pub fn distinct(&self, column: &str) -> Vec<String> {
        let Some(idx) = self.column_index(column) else {
            return Vec::new();
        };
        let mut seen = std::collections::HashSet::new();
        self.rows
            .iter()
            .map(|row| row[idx].to_string())
            .filter(|value| seen.insert(value.clone()))
            .collect()
    }

    /// Every identifier must map to exactly one name.
    pub fn check_identity(&self, id_column: &str, name_column: &str) -> Result<()> {
        check_single_valued(self, id_column, name_column).map_err(|(id, names)| {
            PipelineError::IdentityViolation { id, names }
        })
    }

    /// Every identifier must originate from exactly one source.
    pub fn check_provenance(&self, id_column: &str, source_column: &str) -> Result<()> {
        check_single_valued(self, id_column, source_column).map_err(|(id, sources)| {
            PipelineError::ProvenanceCollision { id, sources }
        })
    }

    /// Borrowing view that serializes one row as an object in column order.
    pub fn record<'a>(&'a self, row: &'a [Field]) -> RecordView<'a> {
        RecordView {
            columns: &self.columns,
            row,
        }
    }

    /// Write the table as CSV: a header line then one line per row.
    pub fn write_csv<W: std::io::Write>(&self, writer: W) -> Result<()> {
        write_csv_rows(&self.columns, self.rows.iter().map(|r| r.as_slice()), writer)
    }
}

/// CSV writer shared by the full-table export and filtered views.
pub fn write_csv_rows<'a, W, I>(columns: &[String], rows: I, writer: W) -> Result<()>
where
    W: std::io::Write,
    I: IntoIterator<Item = &'a [Field]>,
{
    let mut out = csv::Writer::from_writer(writer);
    out.write_record(columns)?;
    for row in rows {
        out.write_record(row.iter().map(|field| field.to_string()))?;
    }
    out.flush()?;
    Ok(())
}

fn cmp_fields(a: &Field, b: &Field) -> std::cmp::Ordering {
    match (a, b) {
        (Field::Measure(x), Field::Measure(y)) => x
            .partial_cmp(y)
            .unwrap_or(std::cmp::Ordering::Equal),
        _ => a.to_string().cmp(&b.to_string()),
    }
}

/// Returns the first key of `key_column` seen with more than one value of
/// `value_column`, with all its values.
fn check_single_valued(
    table: &NormalizedTable,
    key_column: &str,
    value_column: &str,
) -> std::result::Result<(), (String, Vec<String>)> {
    let (Some(key_idx), Some(value_idx)) =
        (table.column_index(key_column), table.column_index(value_column))
    else {
        return Ok(());
    };

    let mut values_by_key: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for row in &table.rows {
        let values = values_by_key.entry(row[key_idx].to_string()).or_default();
        let value = row[value_idx].to_string();
        if !values.contains(&value) {
            values.push(value);
        }
    }

    match values_by_key.into_iter().find(|(_, values)| values.len() > 1) {
        Some(violation) => Err(violation),
        None => Ok(()),
    }
}

pub struct RecordView<'a> {
    columns: &'a [String],
    row: &'a [Field],
}

impl Serialize for RecordView<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.columns.len()))?;
        for (column, field) in self.columns.iter().zip(self.row) {
            map.serialize_entry(column, field)?;
        }
        map.end()
    }
}
