use std::path::PathBuf;
use tablestore::StoreError;
use thiserror::Error;

/// Failures that abort a transform run. Every variant names the table or file
/// involved so the run log points at the failing stage.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("schema error: '{table}' is missing required column '{column}'")]
    Schema { table: String, column: String },

    #[error("failed to read table '{table}'")]
    Read {
        table: String,
        #[source]
        source: StoreError,
    },

    #[error("failed to build table '{table}'")]
    Build {
        table: String,
        #[source]
        source: StoreError,
    },

    #[error("failed to publish table '{table}'")]
    Publish {
        table: String,
        #[source]
        source: StoreError,
    },

    #[error("failed to read reference file {}", path.display())]
    ReferenceIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid reference file {}: {message}", path.display())]
    Reference { path: PathBuf, message: String },

    #[error("cardinality anomaly: {duplicates} duplicate (plant_id, date) keys in '{table}'")]
    CardinalityAnomaly { table: String, duplicates: usize },
}

impl PipelineError {
    pub(crate) fn build(table: &str) -> impl FnOnce(StoreError) -> Self + '_ {
        move |source| PipelineError::Build {
            table: table.to_string(),
            source,
        }
    }
}
