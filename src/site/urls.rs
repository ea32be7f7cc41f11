use crate::error::{PipelineError, Result};
use std::collections::BTreeMap;

pub const FIRST_YEAR: u16 = 1970;
pub const LAST_YEAR: u16 = 2022;

/// Page options of the statistics site with their number of sub-options
/// (zero when the page has none).
pub const PAGE_OPTIONS: [(u8, u8); 5] = [(2, 0), (3, 4), (4, 0), (5, 5), (6, 4)];

fn suboption_count(option: u8) -> Option<u8> {
    PAGE_OPTIONS
        .iter()
        .find(|(number, _)| *number == option)
        .map(|(_, count)| *count)
}

/// URL of one page of the site. Options with sub-options require one in
/// `1..=count`; options without them reject any.
pub fn page_url(base_url: &str, option: u8, year: u16, suboption: Option<u8>) -> Result<String> {
    let count = suboption_count(option)
        .ok_or_else(|| PipelineError::Configuration(format!("Unknown page option {}", option)))?;

    if !(FIRST_YEAR..=LAST_YEAR).contains(&year) {
        return Err(PipelineError::Configuration(format!(
            "Year {} outside {}..={}",
            year, FIRST_YEAR, LAST_YEAR
        )));
    }

    match (count, suboption) {
        (0, None) => Ok(format!("{}?ano={}&opcao=opt_0{}", base_url, year, option)),
        (0, Some(s)) => Err(PipelineError::Configuration(format!(
            "Page option {} has no sub-options (got {})",
            option, s
        ))),
        (_, Some(s)) if (1..=count).contains(&s) => Ok(format!(
            "{}?ano={}&subopt={}&opcao=opt_0{}",
            base_url, year, s, option
        )),
        (_, other) => Err(PipelineError::Configuration(format!(
            "Page option {} needs a sub-option in 1..={} (got {:?})",
            option, count, other
        ))),
    }
}

/// Key under which `map_urls` stores a page, e.g. `opt_03_subopt_02_2008`.
pub fn page_key(option: u8, year: u16, suboption: Option<u8>) -> String {
    match suboption {
        Some(s) => format!("opt_0{}_subopt_0{}_{}", option, s, year),
        None => format!("opt_0{}_{}", option, year),
    }
}

/// Every page URL of the site, keyed by `page_key`.
pub fn map_urls(base_url: &str) -> BTreeMap<String, String> {
    let mut urls = BTreeMap::new();
    for (option, count) in PAGE_OPTIONS {
        let suboptions: Vec<Option<u8>> = if count == 0 {
            vec![None]
        } else {
            (1..=count).map(Some).collect()
        };
        for suboption in suboptions {
            for year in FIRST_YEAR..=LAST_YEAR {
                if let Ok(url) = page_url(base_url, option, year, suboption) {
                    urls.insert(page_key(option, year, suboption), url);
                }
            }
        }
    }
    urls
}
