//! Typed access into schema-less records.
//!
//! Missing keys, `null` intermediates and out-of-range indices all resolve
//! to `Value::Null`; lookups never panic.

use crate::models::{ColumnSpec, Record};
use serde_json::Value;

static NULL: Value = Value::Null;

/// Resolve a dotted path (`outlet.name`, `items.0.sku`) inside a record.
pub fn get<'a>(record: &'a Record, path: &str) -> &'a Value {
    let mut segments = path.split('.');
    let first = match segments.next() {
        Some(segment) => segment,
        None => return &NULL,
    };
    let mut current = match record.get(first) {
        Some(value) => value,
        None => return &NULL,
    };
    for segment in segments {
        current = step(current, segment);
        if current.is_null() {
            return &NULL;
        }
    }
    current
}

fn step<'a>(value: &'a Value, segment: &str) -> &'a Value {
    match value {
        Value::Object(obj) => obj.get(segment).unwrap_or(&NULL),
        Value::Array(items) => segment
            .parse::<usize>()
            .ok()
            .and_then(|i| items.get(i))
            .unwrap_or(&NULL),
        _ => &NULL,
    }
}

/// Value displayed in `column` for `record`.
///
/// Columns sourced through a relation read `record[through[0]][data]`; a
/// to-many relation contributes its first element.
pub fn cell_value<'a>(record: &'a Record, column: &ColumnSpec) -> &'a Value {
    match column.through.first() {
        None => record.get(&column.data).unwrap_or(&NULL),
        Some(relation) => {
            let related = match record.get(relation) {
                Some(Value::Array(items)) => items.first().unwrap_or(&NULL),
                Some(value) => value,
                None => &NULL,
            };
            step(related, &column.data)
        },
    }
}

/// Render a value as display text; `null` renders empty.
pub fn display_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Record identifier as a string, if present.
pub fn record_id(record: &Record) -> Option<String> {
    match record.get("id")? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
