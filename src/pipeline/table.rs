use crate::error::Result;
use csv::{ReaderBuilder, Trim};
use std::collections::HashMap;

/// A wide table exactly as published: header names plus string cells.
#[derive(Debug, Clone, PartialEq)]
pub struct RawTable {
    /// Column names; duplicates already disambiguated with `.1`, `.2`, ...
    pub headers: Vec<String>,
    /// One entry per data row, padded or truncated to `headers.len()`.
    pub rows: Vec<Vec<String>>,
}

impl RawTable {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        let width = headers.len();
        let rows = rows
            .into_iter()
            .map(|mut row| {
                row.resize(width, String::new());
                row
            })
            .collect();
        Self {
            headers: dedupe_headers(headers),
            rows,
        }
    }

    /// Parse a delimited payload. The feeds mix encodings and ragged lines,
    /// so decoding is lossy and the reader is flexible.
    pub fn parse(bytes: &[u8], separator: u8) -> Result<Self> {
        let text = String::from_utf8_lossy(bytes);
        let text = text.trim_start_matches('\u{feff}');

        let mut reader = ReaderBuilder::new()
            .delimiter(separator)
            .has_headers(true)
            .flexible(true)
            .trim(Trim::All)
            .from_reader(text.as_bytes());

        let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record?;
            if record.iter().all(|cell| cell.is_empty()) {
                continue;
            }
            rows.push(record.iter().map(str::to_string).collect());
        }

        Ok(Self::new(headers, rows))
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Repeated header names get a `.N` suffix per extra occurrence, so the
/// import/export feeds' `1970;1970` pairs become `1970` and `1970.1`.
fn dedupe_headers(headers: Vec<String>) -> Vec<String> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    headers
        .into_iter()
        .map(|header| {
            let count = seen.entry(header.clone()).or_insert(0);
            let name = if *count == 0 {
                header
            } else {
                format!("{}.{}", header, count)
            };
            *count += 1;
            name
        })
        .collect()
}

/// Coerce a published cell into a measure. Blank, dash and "nd" style
/// placeholders become absent instead of zero.
pub fn coerce_measure(cell: &str) -> Option<f64> {
    let cell = cell.trim();
    if cell.is_empty() {
        return None;
    }
    let parsed = match cell.parse::<f64>() {
        Ok(v) => Some(v),
        // Decimal comma without thousands separators
        Err(_) if cell.contains(',') && !cell.contains('.') => cell.replace(',', ".").parse().ok(),
        Err(_) => None,
    };
    parsed.filter(|v| v.is_finite())
}

/// Upper-case the first letter of every alphabetic run, lower-case the rest.
pub fn title_case(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut previous_cased = false;
    for ch in text.trim().chars() {
        if ch.is_alphabetic() {
            if previous_cased {
                out.extend(ch.to_lowercase());
            } else {
                out.extend(ch.to_uppercase());
            }
            previous_cased = true;
        } else {
            out.push(ch);
            previous_cased = false;
        }
    }
    out
}
