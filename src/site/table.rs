use crate::app::ports::RemoteFetcher;
use crate::error::{PipelineError, Result};
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use serde::Serialize;
use tracing::{debug, instrument};

static DATA_TABLE: Lazy<Selector> = Lazy::new(|| Selector::parse("table.tb_dados").expect("data table selector"));
static HEAD_CELLS: Lazy<Selector> = Lazy::new(|| Selector::parse("thead tr th").expect("header selector"));
static BODY_ROWS: Lazy<Selector> = Lazy::new(|| Selector::parse("tbody tr").expect("row selector"));
static FOOT_CELLS: Lazy<Selector> = Lazy::new(|| Selector::parse("tfoot tr td").expect("footer selector"));
static CELLS: Lazy<Selector> = Lazy::new(|| Selector::parse("td").expect("cell selector"));

/// Main data table of a statistics page.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HtmlTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
    /// Totals row, empty when the page has none
    pub footer: Vec<String>,
}

/// Extract the first `table.tb_dados` of `html`, if any.
pub fn extract_table(html: &str) -> Option<HtmlTable> {
    let document = Html::parse_document(html);
    let table = document.select(&DATA_TABLE).next()?;

    let headers = table.select(&HEAD_CELLS).map(cell_text).collect();
    let rows = table
        .select(&BODY_ROWS)
        .map(|row| row.select(&CELLS).map(cell_text).collect::<Vec<_>>())
        .filter(|row: &Vec<String>| !row.is_empty())
        .collect();
    let footer = table.select(&FOOT_CELLS).map(cell_text).collect();

    Some(HtmlTable { headers, rows, footer })
}

/// Fetch `url` and extract its data table.
#[instrument(skip(fetcher))]
pub async fn fetch_table(fetcher: &dyn RemoteFetcher, url: &str) -> Result<HtmlTable> {
    let page_error = |reason: String| PipelineError::Page {
        url: url.to_string(),
        reason,
    };

    let payload = fetcher.fetch(url).await.map_err(page_error)?;
    if !payload.is_success() {
        return Err(page_error(format!("HTTP status {}", payload.status)));
    }

    let html = String::from_utf8_lossy(&payload.bytes);
    let table = extract_table(&html).ok_or_else(|| page_error("no data table on page".to_string()))?;
    debug!(rows = table.rows.len(), "Extracted page table");
    Ok(table)
}

fn cell_text(cell: ElementRef<'_>) -> String {
    cell.text().collect::<String>().trim().to_string()
}
