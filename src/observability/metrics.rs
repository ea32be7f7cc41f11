//! Metrics for the preprocessing pipeline and the HTTP layer.
//!
//! Counters are recorded through the `metrics` facade; `init` installs a
//! Prometheus recorder whose handle renders the `/metrics` endpoint. Without
//! an installed recorder every call below is a no-op, which is what tests see.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;
use tracing::info;

/// All metric names used in the system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricName {
    // Sources
    SourcesRemoteSuccess,
    SourcesSnapshotFallback,
    SourcesUnavailable,
    SourcesPayloadBytes,

    // Pipeline
    PipelineRunsSuccess,
    PipelineRunsError,
    PipelineRowsUnmapped,
    PipelineRowsOutput,
    PipelineDuration,

    // Cache
    CacheHits,
    CacheMisses,
}

impl MetricName {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricName::SourcesRemoteSuccess => "vitibrasil_sources_remote_success_total",
            MetricName::SourcesSnapshotFallback => "vitibrasil_sources_snapshot_fallback_total",
            MetricName::SourcesUnavailable => "vitibrasil_sources_unavailable_total",
            MetricName::SourcesPayloadBytes => "vitibrasil_sources_payload_bytes",
            MetricName::PipelineRunsSuccess => "vitibrasil_pipeline_runs_success_total",
            MetricName::PipelineRunsError => "vitibrasil_pipeline_runs_error_total",
            MetricName::PipelineRowsUnmapped => "vitibrasil_pipeline_rows_unmapped_total",
            MetricName::PipelineRowsOutput => "vitibrasil_pipeline_rows_output",
            MetricName::PipelineDuration => "vitibrasil_pipeline_duration_seconds",
            MetricName::CacheHits => "vitibrasil_cache_hits_total",
            MetricName::CacheMisses => "vitibrasil_cache_misses_total",
        }
    }
}

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the Prometheus recorder. Calling it twice returns the first handle.
pub fn init() -> Result<PrometheusHandle, String> {
    if let Some(handle) = METRICS_HANDLE.get() {
        return Ok(handle.clone());
    }
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus recorder: {}", e))?;
    let _ = METRICS_HANDLE.set(handle.clone());
    info!("Metrics recorder installed");
    Ok(handle)
}

/// Render the current metrics in Prometheus text format, if a recorder is installed
pub fn render() -> Option<String> {
    METRICS_HANDLE.get().map(|handle| handle.render())
}

// ============================================================================
// Sources Metrics
// ============================================================================

pub mod sources {
    use super::MetricName;

    pub fn remote_success(source_key: &str, bytes: usize) {
        ::metrics::counter!(MetricName::SourcesRemoteSuccess.as_str(), "source" => source_key.to_string())
            .increment(1);
        ::metrics::histogram!(MetricName::SourcesPayloadBytes.as_str()).record(bytes as f64);
    }

    pub fn snapshot_fallback(source_key: &str) {
        ::metrics::counter!(MetricName::SourcesSnapshotFallback.as_str(), "source" => source_key.to_string())
            .increment(1);
    }

    pub fn unavailable(source_key: &str) {
        ::metrics::counter!(MetricName::SourcesUnavailable.as_str(), "source" => source_key.to_string())
            .increment(1);
    }
}

// ============================================================================
// Pipeline Metrics
// ============================================================================

pub mod pipeline {
    use super::MetricName;

    pub fn run_success(dataset: &str, rows: usize, secs: f64) {
        ::metrics::counter!(MetricName::PipelineRunsSuccess.as_str(), "dataset" => dataset.to_string())
            .increment(1);
        ::metrics::gauge!(MetricName::PipelineRowsOutput.as_str(), "dataset" => dataset.to_string())
            .set(rows as f64);
        ::metrics::histogram!(MetricName::PipelineDuration.as_str(), "dataset" => dataset.to_string())
            .record(secs);
    }

    pub fn run_error(dataset: &str) {
        ::metrics::counter!(MetricName::PipelineRunsError.as_str(), "dataset" => dataset.to_string())
            .increment(1);
    }

    pub fn rows_unmapped(source_key: &str, count: usize) {
        if count == 0 {
            return;
        }
        ::metrics::counter!(MetricName::PipelineRowsUnmapped.as_str(), "source" => source_key.to_string())
            .increment(count as u64);
    }
}

// ============================================================================
// Cache Metrics
// ============================================================================

pub mod cache {
    use super::MetricName;

    pub fn hit(dataset: &str) {
        ::metrics::counter!(MetricName::CacheHits.as_str(), "dataset" => dataset.to_string()).increment(1);
    }

    pub fn miss(dataset: &str) {
        ::metrics::counter!(MetricName::CacheMisses.as_str(), "dataset" => dataset.to_string()).increment(1);
    }
}
