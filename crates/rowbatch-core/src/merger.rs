//! Row batch merging: dedupe, merge/replace policy, dependency ordering.
//!
//! `merge_row_batch` collapses a raw event batch down to one authoritative
//! row per logical identity, then groups the survivors into independent
//! buckets ordered so that a parent row always precedes its children. Each
//! bucket can be transmitted independently of the others but must stay in
//! order internally.

use std::collections::BTreeSet;

use indexmap::map::Entry;
use indexmap::IndexMap;
use serde_json::Value;
use tracing::{debug, warn};

use crate::batch::{batch_items, serialized_len, BatchLimits};
use crate::error::{Error, Result};
use crate::merge::merge_objects;
use crate::row::{is_merge_row, Row, RowKey, DEFAULT_MERGE_SKIP_FIELDS, IS_MERGE_FIELD};

/// Deduplicates, merges, and orders row batches.
///
/// Stateless between calls; the only configuration is the merge-skip field
/// set and whether parent links are analyzed at all.
#[derive(Debug, Clone)]
pub struct RowMerger {
    skip_fields: BTreeSet<String>,
    link_parents: bool,
}

impl Default for RowMerger {
    fn default() -> Self {
        RowMerger {
            skip_fields: DEFAULT_MERGE_SKIP_FIELDS
                .iter()
                .map(|f| (*f).to_string())
                .collect(),
            link_parents: true,
        }
    }
}

impl RowMerger {
    /// Merger with the default merge-skip fields and full dependency
    /// analysis.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the merge-skip field set. These fields keep their existing
    /// values through every merge.
    pub fn with_skip_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.skip_fields = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Disable parent/child analysis: the batch is only deduplicated and
    /// comes back as a single bucket in insertion order.
    pub fn dedupe_only(mut self) -> Self {
        self.link_parents = false;
        self
    }

    /// Merge a raw row batch into ordered, independent buckets.
    ///
    /// Rows are processed in input order. Later rows either replace the row
    /// on file for their identity (when `_is_merge` is unset or false) or
    /// deep-merge into it (when true). Survivors are grouped by in-batch
    /// parent links into buckets; within a bucket parents precede children.
    /// Bucket-to-bucket order carries no meaning.
    ///
    /// Fails on any row without a non-null `id`, producing no partial
    /// result. A `_parent_id` that resolves to nothing in this batch is not
    /// an error; the parent may already be persisted upstream.
    pub fn merge_row_batch(&self, rows: Vec<Row>) -> Result<Vec<Vec<Row>>> {
        let input_len = rows.len();
        let merged = self.dedupe(rows)?;
        debug!(
            rows = input_len,
            deduped = merged.len(),
            "merged row batch"
        );

        if !self.link_parents {
            let bucket: Vec<Row> = merged.into_values().collect();
            return Ok(if bucket.is_empty() {
                Vec::new()
            } else {
                vec![bucket]
            });
        }

        let (graph, edges) = dependency_graph(&merged);
        if rowbatch_graph::contains_cycle(&graph) {
            warn!("parent links form a cycle; bucket ordering is best-effort");
        }

        let components = rowbatch_graph::undirected_connected_components(graph.len(), &edges)
            .map_err(Error::Graph)?;

        let mut slots: Vec<Option<Row>> = merged.into_values().map(Some).collect();
        let mut buckets = Vec::with_capacity(components.len());
        for component in &components {
            let order = rowbatch_graph::topological_sort(&graph, Some(component.as_slice()))?;
            buckets.push(
                order
                    .into_iter()
                    .filter_map(|index| slots[index].take())
                    .collect::<Vec<Row>>(),
            );
        }
        debug!(buckets = buckets.len(), "grouped rows into buckets");
        Ok(buckets)
    }

    /// Full pipeline: merge a raw batch, then repartition the resulting
    /// buckets into transport-sized batch sets using the rows' serialized
    /// length as the byte measure.
    pub fn merge_and_batch(
        &self,
        rows: Vec<Row>,
        limits: &BatchLimits,
    ) -> Result<Vec<Vec<Vec<Row>>>> {
        let buckets = self.merge_row_batch(rows)?;
        let batch_sets = batch_items(buckets, limits, serialized_len)?;
        debug!(batch_sets = batch_sets.len(), "planned batch sets");
        Ok(batch_sets)
    }

    /// Identity-keyed dedupe with the merge/replace policy, in input order.
    fn dedupe(&self, rows: Vec<Row>) -> Result<IndexMap<RowKey, Row>> {
        for (index, row) in rows.iter().enumerate() {
            if RowKey::of(row).is_none() {
                return Err(Error::MissingId { index });
            }
        }

        let mut merged: IndexMap<RowKey, Row> = IndexMap::with_capacity(rows.len());
        for row in rows {
            let Some(key) = RowKey::of(&row) else {
                // Checked above; rows are not touched in between.
                continue;
            };
            match merged.entry(key) {
                Entry::Vacant(slot) => {
                    slot.insert(row);
                }
                Entry::Occupied(mut slot) => {
                    if is_merge_row(&row) {
                        self.merge_into(slot.get_mut(), row);
                    } else {
                        // Full replace: last writer wins, slot keeps its
                        // position.
                        *slot.get_mut() = row;
                    }
                }
            }
        }
        Ok(merged)
    }

    fn merge_into(&self, existing: &mut Row, incoming: Row) {
        // A merge into a full-replace row yields a row that is still a full
        // replace: its content is complete, so the merge flag is dropped.
        let preserve_full_replace = !is_merge_row(existing);

        let saved: Vec<(&str, Option<Value>)> = self
            .skip_fields
            .iter()
            .map(|field| (field.as_str(), existing.get(field).cloned()))
            .collect();

        merge_objects(existing, incoming);

        for (field, original) in saved {
            match original {
                Some(value) => {
                    existing.insert(field.to_string(), value);
                }
                None => {
                    existing.shift_remove(field);
                }
            }
        }

        if preserve_full_replace {
            existing.shift_remove(IS_MERGE_FIELD);
        }
    }
}

/// Build the dense parent->child graph over deduplicated rows.
///
/// Returns both the adjacency list (for topological sorting) and the flat
/// edge list (for component discovery).
fn dependency_graph(merged: &IndexMap<RowKey, Row>) -> (Vec<BTreeSet<usize>>, Vec<(usize, usize)>) {
    let mut graph: Vec<BTreeSet<usize>> = vec![BTreeSet::new(); merged.len()];
    let mut edges: Vec<(usize, usize)> = Vec::new();
    for (child, row) in merged.values().enumerate() {
        let Some(parent_key) = RowKey::parent_of(row) else {
            continue;
        };
        if let Some(parent) = merged.get_index_of(&parent_key) {
            if graph[parent].insert(child) {
                edges.push((parent, child));
            }
        }
    }
    (graph, edges)
}
