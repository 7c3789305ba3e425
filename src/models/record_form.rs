use crate::models::Record;
use serde_json::Value;

/// Text fields submitted by a record form (create or update).
///
/// Field order is preserved; it becomes the multipart part order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordForm {
    fields: Vec<(String, String)>,
}

impl RecordForm {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a field.
    pub fn field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(k, _)| *k == name) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((name, value)),
        }
        self
    }

    /// Build a form from a record's scalar fields; nested values are skipped.
    pub fn from_record(record: &Record) -> Self {
        record.iter().fold(Self::new(), |form, (key, value)| match value {
            Value::String(s) => form.field(key.as_str(), s.as_str()),
            Value::Number(n) => form.field(key.as_str(), n.to_string()),
            Value::Bool(b) => form.field(key.as_str(), b.to_string()),
            _ => form,
        })
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// `true` when the form describes a record not yet persisted (`id` absent or `0`).
    pub fn is_new(&self) -> bool {
        matches!(self.get("id"), None | Some("") | Some("0"))
    }

    pub fn fields(&self) -> &[(String, String)] {
        &self.fields
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}
