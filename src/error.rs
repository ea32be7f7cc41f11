use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Data unavailable: remote '{remote}' and local snapshot '{local}' both failed: {reason}")]
    SourceUnavailable {
        remote: String,
        local: String,
        reason: String,
    },

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Identity violation: identifier '{id}' maps to several names {names:?}")]
    IdentityViolation { id: String, names: Vec<String> },

    #[error("Provenance collision: identifier '{id}' originates from sources {sources:?}")]
    ProvenanceCollision { id: String, sources: Vec<String> },

    #[error("Source '{source_key}' is missing required column '{column}'")]
    MissingColumn { source_key: String, column: String },

    #[error("Page '{url}' could not be scraped: {reason}")]
    Page { url: String, reason: String },

    #[error("CSV parsing failed: {0}")]
    Csv(#[from] csv::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    /// Fatal data-integrity failures, as opposed to availability or setup problems.
    pub fn is_integrity_violation(&self) -> bool {
        matches!(
            self,
            PipelineError::IdentityViolation { .. } | PipelineError::ProvenanceCollision { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
