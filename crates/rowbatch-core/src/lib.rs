//! Row conflict resolution and batching for a telemetry upload pipeline.
//!
//! This crate sits between an in-process event buffer and the network
//! transport. A raw batch of rows goes through [`RowMerger`]: rows sharing a
//! logical identity are collapsed into one authoritative version (merge or
//! replace, per the `_is_merge` flag), in-batch parent references become a
//! dependency graph, and each connected group comes back as an ordered
//! bucket with parents first. [`batch_items`] then repartitions the buckets
//! into batch sets sized for transport: sets dispatch in sequence, batches
//! within a set may dispatch in parallel.
//!
//! Everything here is pure, synchronous computation; sending, retrying, and
//! encoding are the transport's job.

pub mod batch;
pub mod error;
pub mod merge;
pub mod merger;
pub mod row;

pub use batch::{batch_items, serialized_len, BatchLimits};
pub use error::{Error, Result};
pub use merge::merge_values;
pub use merger::RowMerger;
pub use row::{
    Row, RowKey, DEFAULT_MERGE_SKIP_FIELDS, ID_FIELD, IS_MERGE_FIELD, PARENT_ID_FIELD,
    SCOPE_FIELDS,
};
