//! Pages of the statistics website: URL mapping and extraction of their main
//! data table. The download area feeds the pipeline; these pages are only
//! read on demand.

pub mod table;
pub mod urls;

pub use table::{extract_table, fetch_table, HtmlTable};
pub use urls::{map_urls, page_key, page_url};
