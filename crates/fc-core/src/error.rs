use crate::id::ObjectId;
use thiserror::Error;

/// Errors raised at the document boundary (loading and saving flows,
/// palettes, clipboard contents and configuration).
///
/// Edits inside the object model never fail this way: a missing object is
/// an `Option::None`, an illegal link is simply not created.
#[derive(Error, Debug)]
pub enum FlowError {
    #[error("Failed to parse JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Primary pipeline '{0}' is not among the document's pipelines")]
    UnknownPrimaryPipeline(ObjectId),

    #[error("Pipeline '{0}' appears more than once in the document")]
    DuplicatePipeline(ObjectId),

    #[error("Pipeline '{0}' does not exist")]
    UnknownPipeline(ObjectId),

    #[error("Unsupported pipeline-flow version '{0}', expected 3.x")]
    UnsupportedVersion(String),
}
