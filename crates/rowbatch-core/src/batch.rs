//! Greedy repartitioning of ordered buckets into transport-sized batches.
//!
//! Output is three levels deep: a list of batch sets to dispatch in
//! sequence, each holding batches that may be dispatched in parallel, each
//! holding items in order. A bucket contributes to at most one batch per
//! batch set, so intra-bucket order survives parallel dispatch; a bucket's
//! unconsumed tail is retried in the next pass as a pseudo-bucket.

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::error::{Error, Result};
use crate::row::Row;

/// Optional per-batch bounds. `None` means unbounded.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct BatchLimits {
    /// Maximum number of items per batch. Must be at least 1 when set.
    pub max_batch_items: Option<usize>,

    /// Maximum total item bytes per batch. A single item larger than this
    /// still ships, alone in its own batch.
    pub max_batch_bytes: Option<usize>,
}

impl BatchLimits {
    /// Bounds on both item count and byte size.
    pub fn new(max_batch_items: Option<usize>, max_batch_bytes: Option<usize>) -> Self {
        BatchLimits {
            max_batch_items,
            max_batch_bytes,
        }
    }
}

/// Repartition ordered buckets into batch sets.
///
/// Greedy single pass, repeated until all input is consumed: walk the
/// buckets in order, filling the current batch. When an item does not fit
/// into a non-empty batch, either the batch is flushed and a fresh one
/// started for it (if it is the first item considered from its bucket this
/// pass — this is what gives an oversized item a dedicated batch instead of
/// stalling), or the bucket's remainder is deferred to the next pass. Each
/// pass emits one batch set.
///
/// Items from different buckets may share a batch; they are mutually
/// independent by construction. The pass count is bounded by the longest
/// bucket divided by the item budget.
pub fn batch_items<T, F>(
    buckets: Vec<Vec<T>>,
    limits: &BatchLimits,
    mut size_of: F,
) -> Result<Vec<Vec<Vec<T>>>>
where
    F: FnMut(&T) -> usize,
{
    if limits.max_batch_items == Some(0) {
        return Err(Error::InvalidBatchConfig);
    }

    let mut output: Vec<Vec<Vec<T>>> = Vec::new();
    let mut current: Vec<Vec<T>> = buckets.into_iter().filter(|b| !b.is_empty()).collect();

    while !current.is_empty() {
        let mut next: Vec<Vec<T>> = Vec::new();
        let mut batch_set: Vec<Vec<T>> = Vec::new();
        let mut batch: Vec<T> = Vec::new();
        let mut batch_bytes = 0usize;

        for bucket in current {
            let mut items = bucket.into_iter();
            let mut taken = 0usize;
            while let Some(item) = items.next() {
                let item_bytes = size_of(&item);
                let over_items = limits.max_batch_items.is_some_and(|max| batch.len() >= max);
                let over_bytes = limits
                    .max_batch_bytes
                    .is_some_and(|max| batch_bytes + item_bytes > max);
                if !batch.is_empty() && (over_items || over_bytes) {
                    if taken == 0 {
                        batch_set.push(std::mem::take(&mut batch));
                        batch_bytes = 0;
                    } else {
                        // The bucket already contributed to this batch set;
                        // splitting it across parallel batches would break
                        // its internal order. Retry the tail next pass.
                        let mut remainder = Vec::with_capacity(items.len() + 1);
                        remainder.push(item);
                        remainder.extend(items);
                        next.push(remainder);
                        break;
                    }
                }
                batch_bytes += item_bytes;
                batch.push(item);
                taken += 1;
            }
        }

        if !batch.is_empty() {
            batch_set.push(batch);
        }
        if !batch_set.is_empty() {
            trace!(
                batches = batch_set.len(),
                deferred_buckets = next.len(),
                "flushed batch set"
            );
            output.push(batch_set);
        }
        current = next;
    }

    Ok(output)
}

/// Default byte measure for rows: the length of the compact JSON encoding.
pub fn serialized_len(row: &Row) -> usize {
    serde_json::to_string(row).map_or(0, |s| s.len())
}
