//! Property-based tests for row merging and batch partitioning.
//!
//! Uses proptest to verify the merge policy and partitioning invariants
//! across randomly generated row batches.

use proptest::prelude::*;
use rowbatch_core::{batch_items, BatchLimits, Row, RowMerger, IS_MERGE_FIELD, PARENT_ID_FIELD};
use serde_json::{json, Value};

fn obj(value: Value) -> Row {
    match value {
        Value::Object(map) => map,
        other => panic!("expected object, got {other}"),
    }
}

/// Rows drawn from a small id pool so identity collisions are common.
/// Parent references only point at lower-numbered ids, so parent chains are
/// acyclic by construction.
fn arb_row() -> impl Strategy<Value = Row> {
    (
        0..6u32,
        prop::option::of(0..6u32),
        prop::bool::ANY,
        prop::collection::btree_map("[a-d]", 0..100i64, 0..3),
    )
        .prop_map(|(id, parent, is_merge, payload)| {
            let mut row = Row::new();
            row.insert("id".to_string(), json!(format!("r{id}")));
            if let Some(p) = parent.filter(|&p| p < id) {
                row.insert(PARENT_ID_FIELD.to_string(), json!(format!("r{p}")));
            }
            if is_merge {
                row.insert(IS_MERGE_FIELD.to_string(), json!(true));
            }
            for (k, v) in payload {
                row.insert(k, json!(v));
            }
            row
        })
}

fn arb_batch() -> impl Strategy<Value = Vec<Row>> {
    prop::collection::vec(arb_row(), 0..24)
}

/// Canonical form for comparing row sets regardless of bucket structure.
fn sorted_rows(buckets: &[Vec<Row>]) -> Vec<String> {
    let mut flat: Vec<String> = buckets
        .iter()
        .flatten()
        .map(|row| serde_json::to_string(row).unwrap())
        .collect();
    flat.sort();
    flat
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(400))]

    /// Re-merging an already merged batch changes nothing: every surviving
    /// row is unique, so the second run is a no-op on row content.
    #[test]
    fn merge_is_idempotent(batch in arb_batch()) {
        let merger = RowMerger::new();
        let once = merger.merge_row_batch(batch).unwrap();
        let flat: Vec<Row> = once.iter().flatten().cloned().collect();
        let twice = merger.merge_row_batch(flat).unwrap();
        prop_assert_eq!(sorted_rows(&once), sorted_rows(&twice));
    }

    /// Merging keeps every field of the existing row that the update does
    /// not mention, and takes the update's value everywhere else.
    #[test]
    fn merge_is_monotonic(
        base in prop::collection::btree_map("[a-f]", 0..100i64, 0..5),
        update in prop::collection::btree_map("[a-f]", 0..100i64, 0..5),
    ) {
        let mut first = obj(json!({"id": "x"}));
        for (k, v) in &base {
            first.insert(k.clone(), json!(v));
        }
        let mut second = obj(json!({"id": "x", "_is_merge": true}));
        for (k, v) in &update {
            second.insert(k.clone(), json!(v));
        }

        let buckets = RowMerger::new().merge_row_batch(vec![first, second]).unwrap();
        let merged = &buckets[0][0];
        for (k, v) in &base {
            let expected = update.get(k).unwrap_or(v);
            prop_assert_eq!(&merged[k], &json!(expected));
        }
        for (k, v) in &update {
            prop_assert_eq!(&merged[k], &json!(v));
        }
        prop_assert!(!merged.contains_key(IS_MERGE_FIELD));
    }

    /// A replace wipes the row on file: the result is exactly the new row.
    #[test]
    fn replace_dominates(
        base in prop::collection::btree_map("[a-f]", 0..100i64, 0..5),
        replacement in prop::collection::btree_map("[a-f]", 0..100i64, 0..5),
    ) {
        let mut first = obj(json!({"id": "x"}));
        for (k, v) in base {
            first.insert(k, json!(v));
        }
        let mut second = obj(json!({"id": "x"}));
        for (k, v) in &replacement {
            second.insert(k.clone(), json!(v));
        }

        let expected = second.clone();
        let buckets = RowMerger::new().merge_row_batch(vec![first, second]).unwrap();
        prop_assert_eq!(&buckets[0][0], &expected);
    }

    /// Once a full-replace row is on file for a key, no sequence of merges
    /// brings the merge flag back.
    #[test]
    fn full_replace_is_preserved_through_merges(updates in prop::collection::vec(
        prop::collection::btree_map("[a-f]", 0..100i64, 0..3), 1..5,
    )) {
        let mut batch = vec![obj(json!({"id": "x", "seed": 1}))];
        for update in updates {
            let mut row = obj(json!({"id": "x", "_is_merge": true}));
            for (k, v) in update {
                row.insert(k, json!(v));
            }
            batch.push(row);
        }
        let buckets = RowMerger::new().merge_row_batch(batch).unwrap();
        prop_assert!(!buckets[0][0].contains_key(IS_MERGE_FIELD));
    }

    /// Every resolved parent lands in the same bucket as its child, before
    /// the child.
    #[test]
    fn parents_precede_children(batch in arb_batch()) {
        let buckets = RowMerger::new().merge_row_batch(batch).unwrap();

        for bucket in &buckets {
            for (child_pos, row) in bucket.iter().enumerate() {
                let Some(parent_id) = row.get(PARENT_ID_FIELD) else {
                    continue;
                };
                // The parent, if it survived dedupe at all, must be in this
                // bucket and earlier. Search every bucket to prove both.
                for other in &buckets {
                    for (parent_pos, candidate) in other.iter().enumerate() {
                        if candidate.get("id") == Some(parent_id) {
                            prop_assert!(std::ptr::eq(other, bucket), "parent in another bucket");
                            prop_assert!(parent_pos < child_pos, "parent after child");
                        }
                    }
                }
            }
        }
    }

    /// Batches respect both budgets (oversized singletons exempt from the
    /// byte budget), and each bucket's item order survives end to end.
    #[test]
    fn partitioning_respects_bounds_and_order(
        buckets in prop::collection::vec(prop::collection::vec(0..1000u32, 0..12), 0..6),
        max_items in prop::option::of(1..5usize),
        max_bytes in prop::option::of(1..12usize),
    ) {
        let tagged: Vec<Vec<(usize, u32)>> = buckets
            .iter()
            .enumerate()
            .map(|(b, items)| items.iter().map(|&x| (b, x)).collect())
            .collect();
        let size = |item: &(usize, u32)| (item.1 % 5 + 1) as usize;

        let limits = BatchLimits::new(max_items, max_bytes);
        let output = batch_items(tagged, &limits, size).unwrap();

        let mut replayed: Vec<Vec<u32>> = vec![Vec::new(); buckets.len()];
        for batch_set in &output {
            for batch in batch_set {
                prop_assert!(!batch.is_empty());
                if let Some(max) = max_items {
                    prop_assert!(batch.len() <= max);
                }
                if let Some(max) = max_bytes {
                    let total: usize = batch.iter().map(size).sum();
                    prop_assert!(total <= max || batch.len() == 1);
                }
                for &(bucket, item) in batch {
                    replayed[bucket].push(item);
                }
            }
        }
        prop_assert_eq!(replayed, buckets);
    }

    /// A bucket never splits across two batches of the same (parallel-safe)
    /// batch set.
    #[test]
    fn bucket_stays_within_one_batch_per_set(
        buckets in prop::collection::vec(prop::collection::vec(0..1000u32, 1..10), 1..5),
        max_items in 1..4usize,
    ) {
        let tagged: Vec<Vec<(usize, u32)>> = buckets
            .iter()
            .enumerate()
            .map(|(b, items)| items.iter().map(|&x| (b, x)).collect())
            .collect();
        let limits = BatchLimits::new(Some(max_items), None);
        let output = batch_items(tagged, &limits, |_| 1).unwrap();

        for batch_set in &output {
            let mut seen: Vec<usize> = Vec::new();
            for batch in batch_set {
                let mut in_this_batch: Vec<usize> = Vec::new();
                for &(bucket, _) in batch {
                    if !in_this_batch.contains(&bucket) {
                        in_this_batch.push(bucket);
                    }
                }
                for bucket in in_this_batch {
                    prop_assert!(!seen.contains(&bucket), "bucket split within a batch set");
                    seen.push(bucket);
                }
            }
        }
    }
}
