//! Error types for row merging and batch partitioning.

use thiserror::Error;

/// Result type alias for rowbatch operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type for rowbatch-core.
///
/// Nothing here is retried internally; every variant is a programming or
/// data error the caller must fix upstream (for example, assigning an id to
/// every row before it is queued).
#[derive(Debug, Error)]
pub enum Error {
    /// A row has no `id` (or an explicit `null` one). Fatal for the whole
    /// batch; no partial merge result is produced.
    #[error("row at input position {index} has no id")]
    MissingId { index: usize },

    /// A deep merge was attempted where one side is not a JSON object.
    #[error("cannot deep-merge {incoming} into {existing}: both sides must be objects")]
    MergeTypeMismatch {
        existing: &'static str,
        incoming: &'static str,
    },

    /// `max_batch_items` was set to zero.
    #[error("max_batch_items must be at least 1")]
    InvalidBatchConfig,

    /// The dependency graph handed to the traversal engine was malformed.
    #[error("malformed dependency graph: {0}")]
    Graph(#[from] rowbatch_graph::GraphError),
}
