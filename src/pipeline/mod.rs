// Preprocessing pipeline: load, reshape, label, join and aggregate

pub mod aggregate;
pub mod category;
pub mod dataset;
pub mod join;
pub mod loader;
pub mod record;
pub mod reshape;
pub mod table;

// Re-export the types the HTTP layer and binaries work with
pub use aggregate::Pipeline;
pub use dataset::{Dataset, DatasetSpec};
pub use loader::{LoadedTable, RequiredColumns, SourceLoader, SourceOrigin};
pub use record::{Field, NormalizedTable};
pub use table::RawTable;
