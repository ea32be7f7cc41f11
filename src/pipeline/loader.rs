use super::join::measure_families;
use super::table::RawTable;
use crate::app::ports::RemoteFetcher;
use crate::config::SourcesConfig;
use crate::constants::SNAPSHOT_AS_OF;
use crate::error::{PipelineError, Result};
use crate::observability::metrics;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Where a loaded table came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceOrigin {
    Remote,
    Snapshot { as_of: &'static str },
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoadedTable {
    pub table: RawTable,
    pub origin: SourceOrigin,
}

/// Columns a remote table must carry before it is preferred over the
/// snapshot.
#[derive(Debug, Clone, PartialEq)]
pub enum RequiredColumns {
    /// Any table with a header row.
    Any,
    Named(Vec<&'static str>),
    /// The key column plus at least one year with both a quantity (`YYYY`)
    /// and a value (`YYYY.1`) column.
    KeyWithYearPairs(&'static str),
}

impl RequiredColumns {
    pub fn check(&self, table: &RawTable) -> std::result::Result<(), String> {
        match self {
            RequiredColumns::Any => Ok(()),
            RequiredColumns::Named(columns) => {
                match columns.iter().copied().find(|c| table.column_index(c).is_none()) {
                    Some(missing) => Err(format!("missing column '{}'", missing)),
                    None => Ok(()),
                }
            }
            RequiredColumns::KeyWithYearPairs(key) => {
                if table.column_index(key).is_none() {
                    return Err(format!("missing column '{}'", key));
                }
                let (quantities, values) = measure_families(table);
                if quantities.iter().any(|q| values.iter().any(|v| v.year == q.year)) {
                    Ok(())
                } else {
                    Err("no year with both quantity and value columns".to_string())
                }
            }
        }
    }
}

/// Loads one source table: remote first, local snapshot on any failure.
pub struct SourceLoader {
    fetcher: Arc<dyn RemoteFetcher>,
    base_url: String,
    data_root: PathBuf,
    use_local_data: bool,
}

impl SourceLoader {
    pub fn new(fetcher: Arc<dyn RemoteFetcher>, base_url: impl Into<String>, data_root: impl Into<PathBuf>) -> Self {
        Self {
            fetcher,
            base_url: base_url.into(),
            data_root: data_root.into(),
            use_local_data: false,
        }
    }

    pub fn from_config(fetcher: Arc<dyn RemoteFetcher>, config: &SourcesConfig) -> Self {
        Self::new(fetcher, config.base_url.clone(), config.data_root.clone())
            .with_local_data(config.use_local_data)
    }

    /// Skip the remote fetch and read snapshots directly.
    pub fn with_local_data(mut self, use_local_data: bool) -> Self {
        self.use_local_data = use_local_data;
        self
    }

    /// Full remote URL for a file in the download area.
    pub fn remote_url(&self, file_name: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), file_name)
    }

    /// Absolute (or working-directory relative) path of a snapshot.
    pub fn local_path(&self, relative: &str) -> PathBuf {
        self.data_root.join(relative)
    }

    /// Load `remote`, falling back to `local` (relative to the data root) with
    /// the same separator. A remote table lacking `required` counts as a failed
    /// fetch. Fails only when both fail.
    #[instrument(skip(self, required))]
    pub async fn load(
        &self,
        source_key: &str,
        remote: &str,
        local: &str,
        separator: u8,
        required: &RequiredColumns,
    ) -> Result<LoadedTable> {
        let local_path = self.local_path(local);

        let remote_error = if self.use_local_data {
            debug!("Remote fetch disabled, reading snapshot");
            "remote fetch disabled".to_string()
        } else {
            match self.fetch_remote(remote, separator, required).await {
                Ok((table, bytes)) => {
                    metrics::sources::remote_success(source_key, bytes);
                    info!(rows = table.len(), "Loaded remote source");
                    return Ok(LoadedTable {
                        table,
                        origin: SourceOrigin::Remote,
                    });
                }
                Err(e) => {
                    warn!(
                        error = %e,
                        snapshot = %local_path.display(),
                        "Remote fetch failed; falling back to local snapshot as of {}",
                        SNAPSHOT_AS_OF
                    );
                    metrics::sources::snapshot_fallback(source_key);
                    e
                }
            }
        };

        match read_local(&local_path, separator).await {
            Ok(table) => {
                info!(rows = table.len(), "Loaded local snapshot");
                Ok(LoadedTable {
                    table,
                    origin: SourceOrigin::Snapshot {
                        as_of: SNAPSHOT_AS_OF,
                    },
                })
            }
            Err(local_error) => {
                metrics::sources::unavailable(source_key);
                Err(PipelineError::SourceUnavailable {
                    remote: remote.to_string(),
                    local: local_path.display().to_string(),
                    reason: format!("remote: {}; local: {}", remote_error, local_error),
                })
            }
        }
    }

    async fn fetch_remote(
        &self,
        url: &str,
        separator: u8,
        required: &RequiredColumns,
    ) -> std::result::Result<(RawTable, usize), String> {
        let payload = self.fetcher.fetch(url).await?;
        if !payload.is_success() {
            return Err(format!("HTTP status {}", payload.status));
        }
        let table = parse_non_empty(&payload.bytes, separator)?;
        required
            .check(&table)
            .map_err(|e| format!("unexpected {} payload: {}", payload.content_type, e))?;
        Ok((table, payload.bytes.len()))
    }
}

async fn read_local(path: &Path, separator: u8) -> std::result::Result<RawTable, String> {
    let bytes = tokio::fs::read(path).await.map_err(|e| e.to_string())?;
    parse_non_empty(&bytes, separator)
}

fn parse_non_empty(bytes: &[u8], separator: u8) -> std::result::Result<RawTable, String> {
    let table = RawTable::parse(bytes, separator).map_err(|e| e.to_string())?;
    if table.headers.iter().all(|h| h.is_empty()) {
        return Err("payload has no header row".to_string());
    }
    Ok(table)
}
