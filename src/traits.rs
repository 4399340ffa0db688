//! Seam traits for the pipeline's external collaborators.
//!
//! The orchestrator only ever talks to the catalog engine, the object store,
//! and the relational store through these traits, so the whole
//! submit → wait → fetch → transform → load sequence can be driven against
//! in-memory fakes in tests. Production wires in [`AthenaClient`],
//! [`S3Client`], and [`MySqlLoader`].
//!
//! [`AthenaClient`]: crate::athena::AthenaClient
//! [`S3Client`]: crate::s3::S3Client
//! [`MySqlLoader`]: crate::loader::MySqlLoader

use anyhow::Result;
use async_trait::async_trait;

use crate::athena::{QueryHandle, QueryStatus};
use crate::models::LoadRow;

/// A query engine that executes SQL over catalog tables and persists
/// results as a retrievable object.
#[async_trait]
pub trait Catalog: Send + Sync {
    /// Submit a query for asynchronous execution.
    ///
    /// # Errors
    ///
    /// Fails if the engine rejects the query (malformed SQL, missing table,
    /// auth failure). Rejections are not retried.
    async fn submit(
        &self,
        query: &str,
        database: &str,
        output_location: &str,
    ) -> Result<QueryHandle>;

    /// Check the current execution status of a submitted query.
    ///
    /// Never returns [`QueryStatus::TimedOut`]; timing out is a local
    /// decision made by the poll loop, not an engine state.
    async fn status(&self, handle: &QueryHandle) -> Result<QueryStatus>;
}

/// Write-once object storage, used to fetch query results and to upload
/// staged pages.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>>;

    async fn put_object(&self, bucket: &str, key: &str, body: Vec<u8>) -> Result<()>;
}

/// Counts reported by one [`RecordSink::load`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadStats {
    pub attempted: usize,
    pub inserted: usize,
    pub failed: usize,
}

/// A relational target that persists load-ready rows.
#[async_trait]
pub trait RecordSink: Send + Sync {
    /// Persist `rows` into `table` with per-record isolation: an individual
    /// rejected row is logged and skipped, and whatever subset succeeded is
    /// committed once.
    ///
    /// # Errors
    ///
    /// Fails only when the call as a whole cannot proceed (connection,
    /// transaction open, commit) — never for a single bad row.
    async fn load(&self, rows: Vec<LoadRow>, table: &str) -> Result<LoadStats>;
}
