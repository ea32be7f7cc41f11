use crate::constants::{DEFAULT_DRAW, DEFAULT_PAGE_LENGTH, DEFAULT_PAGE_START};
use crate::pipeline::record::RecordView;
use crate::pipeline::{Dataset, Field, NormalizedTable};
use serde::Serialize;
use std::collections::HashMap;
use std::str::FromStr;

/// Parsed grid request: equality filters plus a `start`/`length` window.
#[derive(Debug, Clone, PartialEq)]
pub struct GridRequest {
    pub start: usize,
    pub length: usize,
    pub draw: u64,
    pub filters: Vec<(&'static str, String)>,
}

impl GridRequest {
    /// Read paging and filter parameters. Parameters that are not filter fields
    /// of `dataset`, and empty filter values, are ignored. Paging parameters
    /// that are present but not integers are rejected.
    pub fn from_params(dataset: Dataset, params: &HashMap<String, String>) -> Result<Self, String> {
        Ok(Self {
            start: parse_param(params, "start", DEFAULT_PAGE_START)?,
            length: parse_param(params, "length", DEFAULT_PAGE_LENGTH)?,
            draw: parse_param(params, "draw", DEFAULT_DRAW)?,
            filters: filters(dataset, params),
        })
    }

    /// Rows matching every filter, in table order.
    pub fn filter<'a>(&self, table: &'a NormalizedTable) -> Vec<&'a [Field]> {
        let filters: Vec<(Option<usize>, &str)> = self
            .filters
            .iter()
            .map(|(column, value)| (table.column_index(column), value.as_str()))
            .collect();

        table
            .rows
            .iter()
            .filter(|row| {
                filters.iter().all(|(idx, wanted)| match idx {
                    Some(idx) => row[*idx].to_string() == *wanted,
                    None => true,
                })
            })
            .map(|row| row.as_slice())
            .collect()
    }

    /// Apply filters and paging to `table`.
    pub fn page<'a>(&self, table: &'a NormalizedTable) -> GridPage<'a> {
        let filtered = self.filter(table);
        let records_filtered = filtered.len();
        let data = filtered
            .into_iter()
            .skip(self.start)
            .take(self.length)
            .map(|row| table.record(row))
            .collect();

        GridPage {
            draw: self.draw,
            records_total: table.len(),
            records_filtered,
            data,
        }
    }
}

/// Grid response body.
#[derive(Serialize)]
pub struct GridPage<'a> {
    pub draw: u64,
    #[serde(rename = "recordsTotal")]
    pub records_total: usize,
    #[serde(rename = "recordsFiltered")]
    pub records_filtered: usize,
    pub data: Vec<RecordView<'a>>,
}

fn filters(dataset: Dataset, params: &HashMap<String, String>) -> Vec<(&'static str, String)> {
    dataset
        .filter_fields()
        .iter()
        .filter_map(|field| {
            params
                .get(*field)
                .filter(|value| !value.is_empty())
                .map(|value| (*field, value.clone()))
        })
        .collect()
}

fn parse_param<T: FromStr>(params: &HashMap<String, String>, name: &str, default: T) -> Result<T, String> {
    match params.get(name).map(|v| v.trim()) {
        None | Some("") => Ok(default),
        Some(raw) => raw
            .parse()
            .map_err(|_| format!("Query parameter '{}' must be a non-negative integer, got '{}'", name, raw)),
    }
}
