//! Typed stage taxonomy for per-entity-kind pipeline failures.
//!
//! Each variant names the pipeline stage whose hard failure aborts a single
//! entity kind (never the whole run). The carried string is a rendered
//! description of the underlying cause.

use thiserror::Error;

/// A hard failure at one stage of processing a single entity kind.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The catalog engine rejected the submitted query (not retried).
    #[error("submission failed: {0}")]
    Submission(String),
    /// Polling the query status failed within the attempt budget.
    #[error("poll failed: {0}")]
    Poll(String),
    /// Retrieving or decoding the query result failed.
    #[error("fetch failed: {0}")]
    Fetch(String),
    /// The record sink connection failed for this entity kind.
    #[error("connection failed: {0}")]
    Connection(String),
}
