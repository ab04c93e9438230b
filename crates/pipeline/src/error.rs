//! Error types for the tile prediction pipeline
//!
//! Each fatal condition is a distinct kind so the orchestration layer can
//! decide whether to fail the job or only the tile. "No input data" is not
//! an error: the assembler returns `Ok(None)` and the pipeline reports the
//! tile as skipped.

use thiserror::Error;

/// Fatal pipeline errors
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("feature schema mismatch: {0}")]
    FeatureSchemaMismatch(String),

    #[error("model artifact unreachable: {0}")]
    ModelUnreachable(String),

    #[error("corrupt model artifact: {0}")]
    ModelCorrupt(String),

    #[error("unreadable training manifest: {0}")]
    ManifestUnreadable(String),

    #[error("feature stack cannot supply model columns, missing: {missing:?}")]
    ColumnOrderMismatch { missing: Vec<String> },

    #[error("ancillary layer '{layer}' missing for configured correction")]
    AncillaryDataMissing { layer: String },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("failed to persist tile outputs: {0}")]
    Persist(String),

    #[error("core error: {0}")]
    Core(#[from] cropmask_core::Error),
}

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;
