//! Row representation and logical identity keys.
//!
//! A row is an open-ended JSON object. A handful of keys are reserved: `id`
//! names the record, the scope fields name the container it belongs to,
//! `_parent_id` references another row's `id` within the same scope, and
//! `_is_merge` marks the row as an incremental update rather than a full
//! replacement.

use serde_json::{Map, Value};

/// One telemetry row: an ordered JSON object.
pub type Row = Map<String, Value>;

/// Required identifier field.
pub const ID_FIELD: &str = "id";

/// Optional reference to a parent row's id within the same scope.
pub const PARENT_ID_FIELD: &str = "_parent_id";

/// Optional flag: `true` marks an incremental update, `false`/absent a full
/// replacement.
pub const IS_MERGE_FIELD: &str = "_is_merge";

/// Scope fields that, together with `id`, name a logical record.
pub const SCOPE_FIELDS: [&str; 6] = [
    "org_id",
    "project_id",
    "experiment_id",
    "dataset_id",
    "prompt_session_id",
    "log_id",
];

/// Fields excluded from deep merges by default. They describe identity and
/// lineage rather than payload and must never be overwritten by a later
/// partial update.
pub const DEFAULT_MERGE_SKIP_FIELDS: [&str; 5] = [
    "created",
    "span_id",
    "root_span_id",
    "span_parents",
    PARENT_ID_FIELD,
];

/// Logical identity of a row: its scope fields plus one identifying value.
///
/// Components are canonicalized to their compact JSON serialization, so a
/// string id `"1"` and a numeric id `1` name different records. Absent and
/// `null` fields are both `None`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RowKey {
    scope: [Option<String>; 6],
    id: String,
}

impl RowKey {
    /// Identity key of a row, or `None` when `id` is absent or null.
    pub fn of(row: &Row) -> Option<Self> {
        Some(RowKey {
            scope: scope_components(row),
            id: key_component(row.get(ID_FIELD))?,
        })
    }

    /// Identity key the row's parent would have: the same scope fields with
    /// `_parent_id` standing in for `id`. `None` when `_parent_id` is absent
    /// or null.
    pub fn parent_of(row: &Row) -> Option<Self> {
        Some(RowKey {
            scope: scope_components(row),
            id: key_component(row.get(PARENT_ID_FIELD))?,
        })
    }
}

/// Whether a row is flagged as an incremental update.
pub(crate) fn is_merge_row(row: &Row) -> bool {
    matches!(row.get(IS_MERGE_FIELD), Some(Value::Bool(true)))
}

fn scope_components(row: &Row) -> [Option<String>; 6] {
    SCOPE_FIELDS.map(|field| key_component(row.get(field)))
}

fn key_component(value: Option<&Value>) -> Option<String> {
    match value {
        None | Some(Value::Null) => None,
        Some(v) => Some(v.to_string()),
    }
}
